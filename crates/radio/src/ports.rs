//! Well-known ports. Must match on every node of a mesh.

/// Presence and health broadcasts
pub const DISCOVERY_PORT: u16 = 4299;
/// Push-to-talk audio
pub const VOICE_PORT: u16 = 5000;
/// Encrypted text messages
pub const TEXT_PORT: u16 = 5001;
/// Encrypted Cursor-on-Target events
pub const COT_PORT: u16 = 6969;

#[cfg(test)]
mod tests {
    use super::*;
    use aircom_core::NetworkConfig;

    #[test]
    fn test_defaults_match_config() {
        let config = NetworkConfig::default();
        assert_eq!(config.discovery_port, DISCOVERY_PORT);
        assert_eq!(config.voice_port, VOICE_PORT);
        assert_eq!(config.text_port, TEXT_PORT);
        assert_eq!(config.cot_port, COT_PORT);
    }
}
