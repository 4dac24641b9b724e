//! AirCom Mesh - contact discovery, routing and offline delivery
//!
//! Ties the packet protocol, the radio transport, the security gateway and
//! the message bus together.
//!
//! # Core Components
//!
//! - **MessageRouter**: presence broadcast, inbound dispatch, encrypted
//!   outbound delivery and the UI status summary
//! - **HealthMonitor**: periodic health checks and stale-entry pruning
//! - **ConnectivityCache**: store-and-forward while the link is down
//! - **ContactDirectory** / **LinkStatsTable**: lock-guarded shared tables
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use aircom_bus::MessageBus;
//! use aircom_core::{Config, ErrorRecovery};
//! use aircom_crypto::GroupKeyGateway;
//! use aircom_mesh::MessageRouter;
//! use aircom_radio::LoopbackHub;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default_config();
//! let hub = LoopbackHub::new();
//! let router = MessageRouter::new(
//!     &config,
//!     hub.attach("10.0.0.1"),
//!     Arc::new(GroupKeyGateway::generate()),
//!     MessageBus::new(&config.channels)?,
//!     Arc::new(ErrorRecovery::new()),
//! );
//!
//! let report = router.tick().await;
//! println!("presence sent: {}", report.presence_sent);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod contacts;
pub mod error;
pub mod health;
pub mod link_stats;
pub mod router;

pub use cache::{CachedMessage, ConnectivityCache, Destination, FlushReport};
pub use contacts::{ContactDirectory, ContactRecord, ServiceType, LOCK_TIMEOUT};
pub use error::{MeshError, MeshResult};
pub use health::{HealthMonitor, HealthRound};
pub use link_stats::{LinkStatsTable, PeerLinkStats};
pub use router::{MessageRouter, TickReport};
