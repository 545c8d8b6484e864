use actix::prelude::*;
use uuid::Uuid;

use crate::ws::protocol::Envelope;

/// Event pushed from a room to one connection.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct Outbound(pub Envelope);

/// A locally connected player as seen by its room.
#[derive(Clone)]
pub struct Member {
    pub conn_id: Uuid,
    pub name: String,
    recipient: Recipient<Outbound>,
}

impl Member {
    pub fn new(conn_id: Uuid, name: impl Into<String>, recipient: Recipient<Outbound>) -> Self {
        Self {
            conn_id,
            name: name.into(),
            recipient,
        }
    }

    /// Non-blocking hand-off to the connection's mailbox.
    ///
    /// A full mailbox still queues the message; only a closed one reports
    /// failure.
    pub fn deliver(&self, envelope: Envelope) -> bool {
        match self.recipient.try_send(Outbound(envelope)) {
            Ok(()) => true,
            Err(SendError::Full(msg)) => {
                self.recipient.do_send(msg);
                true
            }
            Err(SendError::Closed(_)) => false,
        }
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("conn_id", &self.conn_id)
            .field("name", &self.name)
            .finish()
    }
}
