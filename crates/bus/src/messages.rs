//! Messages carried on the named channels.

use aircom_core::NodeId;

/// GPS lock field of a [`UiUpdate`].
///
/// `Unchanged` is the reserved sentinel: the UI keeps its current indicator,
/// which differs from an explicit `Unlocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockUpdate {
    /// Keep the current indicator
    #[default]
    Unchanged,
    /// Position fix acquired
    Locked,
    /// Position fix lost
    Unlocked,
}

impl LockUpdate {
    /// Raw value for the display protocol, where `0xFF` means unchanged.
    pub const UNCHANGED_RAW: u8 = 0xFF;

    /// Encode for the display protocol.
    pub fn to_raw(self) -> u8 {
        match self {
            LockUpdate::Unchanged => Self::UNCHANGED_RAW,
            LockUpdate::Locked => 1,
            LockUpdate::Unlocked => 0,
        }
    }

    /// Decode a display protocol value; anything else than 0 or 1 is unchanged.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => LockUpdate::Unlocked,
            1 => LockUpdate::Locked,
            _ => LockUpdate::Unchanged,
        }
    }

    /// Apply to the current indicator.
    pub fn apply(self, current: bool) -> bool {
        match self {
            LockUpdate::Unchanged => current,
            LockUpdate::Locked => true,
            LockUpdate::Unlocked => false,
        }
    }
}

/// Status summary for the display task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiUpdate {
    /// GPS lock change, if any
    pub gps_lock: LockUpdate,
    /// Known contacts
    pub contact_count: usize,
    /// Node is in a persistent error state
    pub degraded: bool,
}

/// Body of a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Free text, delivered to the text port
    Text(String),
    /// Cursor-on-Target XML, delivered to the CoT port
    Cot(String),
}

/// Message queued by the UI for delivery to a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Destination contact
    pub to_node: NodeId,
    /// Content
    pub body: MessageBody,
}

/// Message received from a contact, for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Sending node
    pub from_node: NodeId,
    /// Sender callsign, or the node id if the sender is not a known contact
    pub callsign: String,
    /// Content
    pub body: MessageBody,
}

/// Push-to-talk command for the audio task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCommand {
    /// Start transmitting
    StartTx,
    /// Stop transmitting
    StopTx,
}
