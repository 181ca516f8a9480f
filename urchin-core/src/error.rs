//! Failure kinds surfaced by the toolkit.
//!
//! Only two kinds are expected during normal operation: [`EmptyError`] from
//! non-blocking removal on an empty container, and [`TimeoutError`] from
//! timed acquires and waits. [`PreconditionError`] reports an API contract
//! violation by the caller and is not recoverable.
//!
//! CAS failures inside lock-free retry loops are not errors and never
//! surface; they trigger a local retry.

use thiserror::Error;

/// The container held no element at the moment of observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("container is empty")]
pub struct EmptyError;

/// The deadline passed before the operation could complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed out before the operation could complete")]
pub struct TimeoutError;

/// The caller violated the API contract (e.g. unlocking a reentrant mutex
/// it does not hold).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation violates the caller's contract with this primitive")]
pub struct PreconditionError;
