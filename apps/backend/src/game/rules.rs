use std::time::Duration;

/// Timing and scoring knobs shared by every room in a process.
#[derive(Debug, Clone)]
pub struct GameRules {
    pub turn_duration: Duration,
    pub keepalive_interval: Duration,
    pub client_timeout: Duration,
    pub win_score: i64,
    /// Round timer recheck interval while no deadline is set.
    pub timer_poll_interval: Duration,
    /// Shortest sleep the round timer takes while approaching a deadline.
    pub timer_min_step: Duration,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            turn_duration: Duration::from_secs(120),
            keepalive_interval: Duration::from_secs(30),
            client_timeout: Duration::from_secs(90),
            win_score: 10,
            timer_poll_interval: Duration::from_secs(1),
            timer_min_step: Duration::from_millis(50),
        }
    }
}

/// Whether `votes` skip votes remove the artist from a room of
/// `roster` players. The artist cannot vote, so only the others count.
pub fn skip_majority(votes: u64, roster: u64) -> bool {
    let eligible = roster.saturating_sub(1);
    eligible > 0 && votes * 2 > eligible
}
