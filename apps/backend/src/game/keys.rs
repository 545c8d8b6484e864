/// Store keys and channel name for one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomKeys {
    pub channel: String,
    pub roster: String,
    pub turns: String,
    pub seq: String,
    pub word: String,
    pub skips: String,
    pub deadline: String,
}

impl RoomKeys {
    pub fn new(room: &str) -> Self {
        let channel = format!("room:{room}");
        Self {
            roster: format!("{channel}:roster"),
            turns: format!("{channel}:turns"),
            seq: format!("{channel}:seq"),
            word: format!("{channel}:word"),
            skips: format!("{channel}:skips"),
            deadline: format!("{channel}:deadline"),
            channel,
        }
    }

    /// Per-turn keys dropped once nobody is left in turn order. The roster
    /// hash empties itself as players leave.
    pub fn round_state(&self) -> [&str; 4] {
        [&self.word, &self.deadline, &self.skips, &self.seq]
    }
}
