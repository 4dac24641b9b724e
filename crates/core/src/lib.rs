//! Core functionality for the AirCom tactical mesh node.
//!
//! This crate provides the types shared by every other AirCom crate:
//! configuration, logging initialization, the categorized error taxonomy,
//! and the error recovery framework with its retry policies.

pub mod config;
pub mod error;
pub mod logging;
pub mod recovery;
pub mod retry;
pub mod types;

pub use config::{
    CacheConfig, ChannelsConfig, Config, HealthConfig, LogFormat, LoggingConfig, NetworkConfig,
    NodeConfig,
};
pub use error::{ConfigError, CoreError, Result};
pub use recovery::{
    ErrorCategory, ErrorCode, ErrorContext, ErrorRecovery, ErrorStats, RecoveryStrategy,
};
pub use retry::RetryPolicy;
pub use types::{current_timestamp_ms, NodeId, MAX_NODE_ID_LEN};
