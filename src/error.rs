//! Dispatch error taxonomy
//!
//! Every validation failure is an expected, caller-recoverable outcome that
//! leaves the store untouched. `Internal` is the only kind that signals a
//! storage or transactional fault; the core never retries it.

use thiserror::Error;

use crate::types::{DroneId, DroneState};

/// Errors returned by the dispatch core
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    /// No drone with the given id exists
    #[error("drone {0} not found")]
    DroneNotFound(DroneId),

    /// A drone with this serial number is already registered
    #[error("serial number '{0}' is already registered")]
    DuplicateSerial(String),

    /// A field is outside its allowed domain (capacity, battery, model,
    /// medication name or code)
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Name of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// The drone's lifecycle state does not permit the requested operation
    #[error("drone must be in IDLE or LOADING state to accept cargo (currently {state})")]
    InvalidState {
        /// The drone's current state
        state: DroneState,
    },

    /// Battery level is below the loading admission threshold
    #[error("battery level {level:.2}% is below the {threshold:.0}% loading threshold")]
    InsufficientCharge {
        /// The drone's current battery level
        level: f64,
        /// The admission threshold that was not met
        threshold: f64,
    },

    /// A load request carried no medications
    #[error("no medications specified")]
    EmptyBatch,

    /// The batch would push committed weight past the drone's limit
    #[error("total weight exceeds drone weight limit of {limit}")]
    CapacityExceeded {
        /// The drone's maximum payload capacity
        limit: u32,
    },

    /// Storage or transactional fault; the enclosing operation was rolled
    /// back with no partial writes
    #[error("storage fault: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, DispatchError>;

impl DispatchError {
    /// Whether this error is an expected validation outcome (as opposed to
    /// an internal fault the caller may want to alert on)
    pub fn is_validation(&self) -> bool {
        !matches!(self, DispatchError::Internal(_))
    }
}
