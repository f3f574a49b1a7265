//! notary-checker: the uniqueness checker.
//!
//! [`UniquenessChecker`] answers check requests against any
//! [`BackingStore`](notary_storage::BackingStore). Its collaborators are
//! passed in explicitly:
//!
//! - [`Clock`] supplies evaluation timestamps
//! - [`MetricsSink`] observes outcomes
//! - [`ResultSigner`] signs successful results for [`CheckResponse`]s
//!
//! [`CheckResponse`]: notary_core::CheckResponse

mod checker;
pub mod clock;
pub mod config;
mod detector;
mod error;
pub mod metrics;
pub mod signing;

pub use checker::UniquenessChecker;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CheckerConfig, StoreKind};
pub use detector::ConflictDetector;
pub use error::{CheckerError, ConfigError, SigningError};
pub use metrics::{InMemoryMetrics, MetricsSink, MetricsSnapshot, NoopMetrics};
pub use signing::{respond, verify_response, Ed25519ResultSigner, ResultSigner};
