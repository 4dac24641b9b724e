//! The node's named channels.

use crate::channel::{OverflowPolicy, QueueChannel};
use crate::error::BusResult;
use crate::messages::{AudioCommand, IncomingMessage, OutgoingMessage, UiUpdate};
use aircom_core::ChannelsConfig;
use std::time::Duration;

/// Name of the router to UI status channel.
pub const UI_UPDATE: &str = "ui-update";
/// Name of the UI to router message channel.
pub const OUTGOING_MESSAGE: &str = "outgoing-message";
/// Name of the push-to-talk channel.
pub const AUDIO_COMMAND: &str = "audio-command";
/// Name of the router to UI message channel.
pub const INCOMING_MESSAGE: &str = "incoming-message";

/// Status updates are superseded by the next one, so overflow drops.
pub const UI_UPDATE_POLICY: OverflowPolicy = OverflowPolicy::DropNewest;
/// Produced by the UI task, which may not stall past 10 ms.
pub const OUTGOING_MESSAGE_POLICY: OverflowPolicy =
    OverflowPolicy::Block(Duration::from_millis(10));
/// Produced on the audio path.
pub const AUDIO_COMMAND_POLICY: OverflowPolicy =
    OverflowPolicy::RetryOnce(Duration::from_millis(5));
/// Produced by the network task, which is off the real-time path.
pub const INCOMING_MESSAGE_POLICY: OverflowPolicy =
    OverflowPolicy::Block(Duration::from_millis(50));

/// All named channels, created once at startup and cloned into each task.
#[derive(Debug, Clone)]
pub struct MessageBus {
    /// Router to UI status summaries
    pub ui_update: QueueChannel<UiUpdate>,
    /// UI to router user messages
    pub outgoing_message: QueueChannel<OutgoingMessage>,
    /// UI to audio push-to-talk commands
    pub audio_command: QueueChannel<AudioCommand>,
    /// Router to UI received messages
    pub incoming_message: QueueChannel<IncomingMessage>,
}

impl MessageBus {
    /// Build every channel with its configured capacity.
    pub fn new(config: &ChannelsConfig) -> BusResult<Self> {
        Ok(Self {
            ui_update: QueueChannel::new(UI_UPDATE, config.ui_update_capacity, UI_UPDATE_POLICY)?,
            outgoing_message: QueueChannel::new(
                OUTGOING_MESSAGE,
                config.outgoing_message_capacity,
                OUTGOING_MESSAGE_POLICY,
            )?,
            audio_command: QueueChannel::new(
                AUDIO_COMMAND,
                config.audio_command_capacity,
                AUDIO_COMMAND_POLICY,
            )?,
            incoming_message: QueueChannel::new(
                INCOMING_MESSAGE,
                config.incoming_message_capacity,
                INCOMING_MESSAGE_POLICY,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BusError;

    #[test]
    fn test_bus_from_default_config() {
        let bus = MessageBus::new(&ChannelsConfig::default()).unwrap();
        assert_eq!(bus.ui_update.name(), "ui-update");
        assert_eq!(bus.audio_command.capacity(), 5);
        assert_eq!(bus.ui_update.policy(), OverflowPolicy::DropNewest);
        assert!(matches!(bus.audio_command.policy(), OverflowPolicy::RetryOnce(_)));
    }

    #[test]
    fn test_zero_capacity_names_channel() {
        let config = ChannelsConfig {
            incoming_message_capacity: 0,
            ..ChannelsConfig::default()
        };
        assert_eq!(
            MessageBus::new(&config).unwrap_err(),
            BusError::ZeroCapacity {
                name: INCOMING_MESSAGE
            }
        );
    }
}
