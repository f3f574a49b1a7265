//! notary-storage: transactional persistence for the uniqueness checker.
//!
//! [`BackingStore`] is the seam between the checker and a storage engine.
//! State is partitioned by holding identity; within one identity a
//! transaction gives serializable read-then-write over state records, so
//! at most one transaction ever consumes a given state.
//!
//! Two backends ship here:
//!
//! - [`InMemoryBackingStore`] -- per-tenant single writer, nothing durable
//! - [`JournalBackingStore`] -- the same, plus fsynced per-tenant JSON-lines journal segments
//!   replayed on open
//!
//! Backends are checked with [`conformance::run_conformance_suite`].

pub mod conformance;
mod error;
mod journal;
mod memory;
mod record;
mod session;
mod tenant;
mod traits;

pub use error::StorageError;
pub use journal::JournalBackingStore;
pub use memory::InMemoryBackingStore;
pub use record::{JournalEntry, TransactionDetails};
pub use session::{Session, TransactionOps};
pub use tenant::TenantTransaction;
pub use traits::BackingStore;
