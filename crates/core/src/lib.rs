//! notary-core: data model of the uniqueness checker.
//!
//! A uniqueness checker answers one question for every submitted
//! transaction: have its input and reference states already been consumed?
//! This crate holds the values that travel through that decision:
//!
//! - [`SecureHash`] and [`StateRef`] -- identifiers of transactions and of
//!   the output states they create
//! - [`StateDetails`] -- the durable record of a state, consumed or not
//! - [`CheckRequest`] -- a validated request; [`CheckRequestMessage`] is its
//!   wire form
//! - [`CheckResult`] / [`CheckError`] -- the outcome, cached per transaction
//! - [`CheckResponse`] -- a result with its optional signature
//! - [`validate_time_window`] -- the time-window rule
//!
//! Nothing here performs I/O or reads the wall clock.

pub mod error;
pub mod hash;
pub mod identity;
pub mod request;
pub mod result;
pub mod state;
pub mod time_window;

pub use error::RequestError;
pub use hash::SecureHash;
pub use identity::HoldingIdentity;
pub use request::{CheckRequest, CheckRequestMessage};
pub use result::{CheckError, CheckResponse, CheckResult, ResultSignature};
pub use state::{StateDetails, StateRef};
pub use time_window::validate_time_window;
