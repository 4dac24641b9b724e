//! Error Recovery Framework
//!
//! Categorized error reporting with process-wide statistics, recovery
//! strategy selection, and retry with exponential backoff.
//!
//! # Error Codes
//!
//! Every [`ErrorCode`] carries a stable numeric value inside its category's
//! range so that logs from different nodes can be correlated:
//!
//! | Category | Range     |
//! |----------|-----------|
//! | System   | 1000-1999 |
//! | Network  | 2000-2999 |
//! | Audio    | 3000-3999 |
//! | Crypto   | 4000-4999 |
//! | Storage  | 5000-5999 |
//! | Sensor   | 6000-6999 |
//! | UI       | 7000-7999 |
//! | Config   | 8000-8999 |
//! | Hardware | 9000-9999 |
//!
//! # Usage
//!
//! The framework is an explicitly constructed [`ErrorRecovery`] shared by
//! the tasks that report into it; there is no global instance.
//!
//! ```
//! use aircom_core::recovery::{ErrorCategory, ErrorCode, ErrorRecovery};
//!
//! let recovery = ErrorRecovery::new();
//! let ctx = recovery.report(
//!     ErrorCategory::Network,
//!     ErrorCode::SocketSend,
//!     "discovery broadcast rejected",
//!     "router::broadcast_presence",
//! );
//! assert!(recovery.recover(&ctx));
//! assert_eq!(recovery.stats().total_errors, 1);
//! ```

use crate::retry::RetryPolicy;
use crate::types::current_timestamp_ms;
use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Errors counted before the node is considered to be in an error state.
const ERROR_STATE_THRESHOLD: u64 = 10;

/// Window after the last error during which the error state holds.
const ERROR_STATE_WINDOW: Duration = Duration::from_secs(5);

/// Subsystem an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Memory, OS and task-level failures
    System,
    /// Radio transport and socket failures
    Network,
    /// Audio capture, codec and playback failures
    Audio,
    /// Key handling and AEAD failures
    Crypto,
    /// Flash and persistent storage failures
    Storage,
    /// GPS and other sensor failures
    Sensor,
    /// Display and input failures
    Ui,
    /// Invalid or missing configuration
    Config,
    /// Peripheral and bus failures
    Hardware,
}

impl ErrorCategory {
    /// All categories, in code-range order.
    pub const ALL: [ErrorCategory; 9] = [
        ErrorCategory::System,
        ErrorCategory::Network,
        ErrorCategory::Audio,
        ErrorCategory::Crypto,
        ErrorCategory::Storage,
        ErrorCategory::Sensor,
        ErrorCategory::Ui,
        ErrorCategory::Config,
        ErrorCategory::Hardware,
    ];

    fn index(self) -> usize {
        match self {
            ErrorCategory::System => 0,
            ErrorCategory::Network => 1,
            ErrorCategory::Audio => 2,
            ErrorCategory::Crypto => 3,
            ErrorCategory::Storage => 4,
            ErrorCategory::Sensor => 5,
            ErrorCategory::Ui => 6,
            ErrorCategory::Config => 7,
            ErrorCategory::Hardware => 8,
        }
    }

    /// Lowest numeric code belonging to this category.
    pub fn code_base(self) -> u16 {
        (self.index() as u16 + 1) * 1000
    }

    /// Lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::System => "system",
            ErrorCategory::Network => "network",
            ErrorCategory::Audio => "audio",
            ErrorCategory::Crypto => "crypto",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Sensor => "sensor",
            ErrorCategory::Ui => "ui",
            ErrorCategory::Config => "config",
            ErrorCategory::Hardware => "hardware",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Specific error codes with stable numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    MemoryAllocation = 1001,
    NullPointer = 1002,
    InvalidParameter = 1003,
    Timeout = 1004,
    ResourceUnavailable = 1005,
    SystemOverload = 1006,
    TaskCreation = 1007,

    SocketCreate = 2001,
    SocketBind = 2002,
    SocketConnect = 2003,
    SocketSend = 2004,
    SocketReceive = 2005,
    NetworkTimeout = 2006,
    InvalidAddress = 2007,
    ConnectionLost = 2008,
    /// Encoded packet exceeds the datagram limit
    PacketTooLarge = 2009,

    AudioInit = 3001,
    AudioConfig = 3002,
    AudioEncode = 3003,
    AudioDecode = 3004,
    AudioBufferOverflow = 3005,
    AudioBufferUnderflow = 3006,
    AudioDevice = 3007,

    CryptoInit = 4001,
    CryptoKey = 4002,
    CryptoEncrypt = 4003,
    CryptoDecrypt = 4004,
    CryptoAuth = 4005,

    StorageInit = 5001,
    StorageRead = 5002,
    StorageWrite = 5003,
    StorageErase = 5004,
    StorageFull = 5005,

    SensorInit = 6001,
    SensorRead = 6002,
    SensorCalibration = 6003,
    SensorTimeout = 6004,

    UiInit = 7001,
    UiUpdate = 7002,
    UiInput = 7003,
    UiMemory = 7004,

    ConfigInvalid = 8001,
    ConfigMissing = 8002,
    ConfigCorrupt = 8003,

    HardwareInit = 9001,
    HardwareAccess = 9002,
    HardwareTimeout = 9003,
    HardwareFault = 9004,
}

impl ErrorCode {
    /// Numeric code used in logs.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Category implied by the code's numeric range.
    pub fn category(self) -> ErrorCategory {
        let index = (self.as_u16() / 1000).saturating_sub(1) as usize;
        ErrorCategory::ALL
            .get(index)
            .copied()
            .unwrap_or(ErrorCategory::System)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_u16())
    }
}

/// A reported error. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    category: ErrorCategory,
    code: ErrorCode,
    message: String,
    timestamp_ms: u64,
    origin: &'static str,
}

impl ErrorContext {
    /// Subsystem the error was reported against
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Specific error code
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable description
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Unix epoch milliseconds at which the error was reported
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Component and operation that reported the error
    pub fn origin(&self) -> &'static str {
        self.origin
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} in {}: {}",
            self.category, self.code, self.origin, self.message
        )
    }
}

impl std::error::Error for ErrorContext {}

/// How an error should be recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// No recovery possible
    None,
    /// Immediate retry driven by the caller
    Retry,
    /// Retry with exponential backoff
    Backoff,
    /// Reset and reinitialize the component
    Reset,
    /// Switch to a fallback mechanism
    Fallback,
    /// Restart the component
    Restart,
    /// Hand off to a higher-level handler
    Escalate,
}

impl RecoveryStrategy {
    /// Whether this strategy can be carried out without component-specific logic.
    pub fn recovers(self) -> bool {
        matches!(
            self,
            RecoveryStrategy::Retry | RecoveryStrategy::Backoff | RecoveryStrategy::Fallback
        )
    }
}

/// Snapshot of error statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorStats {
    /// Errors reported since the last reset
    pub total_errors: u64,
    /// Per-category counts, indexed in [`ErrorCategory::ALL`] order
    pub errors_by_category: [u64; 9],
    /// Calls to [`ErrorRecovery::recover`]
    pub recovery_attempts: u64,
    /// Recoveries the generic strategy handled
    pub successful_recoveries: u64,
    /// Recoveries that needed escalation
    pub failed_recoveries: u64,
    /// Code of the most recent error
    pub last_error_code: Option<ErrorCode>,
    /// Unix epoch milliseconds of the most recent error
    pub last_error_timestamp_ms: Option<u64>,
}

impl ErrorStats {
    /// Errors reported in one category.
    pub fn errors_in(&self, category: ErrorCategory) -> u64 {
        self.errors_by_category[category.index()]
    }
}

#[derive(Debug, Default)]
struct RecoveryState {
    stats: ErrorStats,
    last_error_at: Option<Instant>,
}

/// Process-wide error reporting and recovery.
#[derive(Debug, Default)]
pub struct ErrorRecovery {
    state: Mutex<RecoveryState>,
}

impl ErrorRecovery {
    /// Fresh framework with zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error. Always succeeds.
    pub fn report(
        &self,
        category: ErrorCategory,
        code: ErrorCode,
        message: impl Into<String>,
        origin: &'static str,
    ) -> ErrorContext {
        let context = ErrorContext {
            category,
            code,
            message: message.into(),
            timestamp_ms: current_timestamp_ms(),
            origin,
        };

        {
            let mut state = self.state.lock();
            state.stats.total_errors += 1;
            state.stats.errors_by_category[category.index()] += 1;
            state.stats.last_error_code = Some(code);
            state.stats.last_error_timestamp_ms = Some(context.timestamp_ms);
            state.last_error_at = Some(Instant::now());
        }

        error!(
            category = %category,
            code = code.as_u16(),
            origin = origin,
            "{}",
            context.message
        );

        context
    }

    /// Strategy chosen for an error.
    pub fn strategy_for(&self, error: &ErrorContext) -> RecoveryStrategy {
        match error.category {
            ErrorCategory::Network | ErrorCategory::Storage => RecoveryStrategy::Backoff,
            ErrorCategory::Audio => RecoveryStrategy::Retry,
            ErrorCategory::System => match error.code {
                ErrorCode::MemoryAllocation => RecoveryStrategy::Reset,
                ErrorCode::Timeout => RecoveryStrategy::Backoff,
                _ => RecoveryStrategy::Retry,
            },
            ErrorCategory::Hardware => RecoveryStrategy::Reset,
            _ => RecoveryStrategy::Retry,
        }
    }

    /// Attempt generic recovery for an error.
    ///
    /// Returns `false` when the strategy needs component-specific handling
    /// (reset, restart, escalation); the caller must escalate.
    pub fn recover(&self, error: &ErrorContext) -> bool {
        let strategy = self.strategy_for(error);
        let recovered = strategy.recovers();

        {
            let mut state = self.state.lock();
            state.stats.recovery_attempts += 1;
            if recovered {
                state.stats.successful_recoveries += 1;
            } else {
                state.stats.failed_recoveries += 1;
            }
        }

        if recovered {
            info!(code = error.code.as_u16(), strategy = ?strategy, "Recovery successful");
        } else {
            warn!(
                code = error.code.as_u16(),
                strategy = ?strategy,
                "Recovery requires escalation"
            );
        }

        recovered
    }

    /// Run `operation` until it returns `true` or the policy's attempts are
    /// exhausted, sleeping the backoff delay between attempts.
    ///
    /// The operation runs at least once. On success returns the number of
    /// attempts used; on exhaustion reports a System/Timeout error and
    /// returns it.
    pub async fn retry_with_backoff<F>(
        &self,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> Result<u32, ErrorContext>
    where
        F: FnMut() -> bool,
    {
        let attempts = policy.max_attempts.max(1);

        for attempt in 0..attempts {
            if operation() {
                return Ok(attempt + 1);
            }

            if attempt + 1 < attempts {
                let delay = policy.next_delay(attempt);
                debug!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retry attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(self.report(
            ErrorCategory::System,
            ErrorCode::Timeout,
            format!("Operation failed after {} attempts", attempts),
            "retry_with_backoff",
        ))
    }

    /// Snapshot of the current statistics.
    pub fn stats(&self) -> ErrorStats {
        self.state.lock().stats.clone()
    }

    /// Zero every counter and forget the last error.
    pub fn reset_stats(&self) {
        *self.state.lock() = RecoveryState::default();
    }

    /// More than ten errors with the latest one under five seconds old.
    pub fn is_in_error_state(&self) -> bool {
        let state = self.state.lock();
        state.stats.total_errors > ERROR_STATE_THRESHOLD
            && state
                .last_error_at
                .map(|at| at.elapsed() < ERROR_STATE_WINDOW)
                .unwrap_or(false)
    }

    /// Leave the error state. Clears statistics as well.
    pub fn clear_state(&self) {
        self.reset_stats();
        info!("Error state cleared");
    }
}
