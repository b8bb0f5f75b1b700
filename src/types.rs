//! Core domain types: drones, medications, battery audits
//!
//! Field constraints follow the registration contract: serial numbers are
//! unique and immutable, weight limits sit in [0, 500], battery levels in
//! [0, 100]. Medication names and codes are validated against fixed
//! character classes before anything touches the store.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::config::defaults::MAX_WEIGHT_LIMIT;
use crate::error::{DispatchError, Result};

/// Store-assigned drone identifier
pub type DroneId = u64;
/// Store-assigned medication identifier
pub type MedicationId = u64;
/// Store-assigned battery audit identifier
pub type AuditId = u64;

static NAME_PATTERN: OnceLock<Regex> = OnceLock::new();
static CODE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn name_pattern() -> &'static Regex {
    NAME_PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static pattern is valid"))
}

fn code_pattern() -> &'static Regex {
    CODE_PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9_]+$").expect("static pattern is valid"))
}

// ============================================================================
// Drone
// ============================================================================

/// Declared model class of a drone
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DroneModel {
    Lightweight,
    Middleweight,
    Cruiserweight,
    Heavyweight,
}

impl DroneModel {
    /// Parse a model class from its wire name
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "Lightweight" => Ok(DroneModel::Lightweight),
            "Middleweight" => Ok(DroneModel::Middleweight),
            "Cruiserweight" => Ok(DroneModel::Cruiserweight),
            "Heavyweight" => Ok(DroneModel::Heavyweight),
            other => Err(DispatchError::InvalidField {
                field: "model",
                reason: format!("'{}' is not a recognized model class", other),
            }),
        }
    }
}

impl std::fmt::Display for DroneModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DroneModel::Lightweight => write!(f, "Lightweight"),
            DroneModel::Middleweight => write!(f, "Middleweight"),
            DroneModel::Cruiserweight => write!(f, "Cruiserweight"),
            DroneModel::Heavyweight => write!(f, "Heavyweight"),
        }
    }
}

/// Lifecycle state of a drone
///
/// Only `Idle` and `Loading` accept cargo. A drone that reaches `Loaded`
/// stays there until an external administrative action moves it; the load
/// path never returns it to `Idle`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DroneState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Delivering,
    Delivered,
    Returning,
}

impl DroneState {
    /// Whether the loading engine may admit cargo in this state
    pub fn accepts_cargo(&self) -> bool {
        matches!(self, DroneState::Idle | DroneState::Loading)
    }
}

impl std::fmt::Display for DroneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DroneState::Idle => write!(f, "IDLE"),
            DroneState::Loading => write!(f, "LOADING"),
            DroneState::Loaded => write!(f, "LOADED"),
            DroneState::Delivering => write!(f, "DELIVERING"),
            DroneState::Delivered => write!(f, "DELIVERED"),
            DroneState::Returning => write!(f, "RETURNING"),
        }
    }
}

/// A registered drone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drone {
    /// Store-assigned identifier
    pub id: DroneId,
    /// Unique serial number, immutable after registration
    pub serial: String,
    /// Declared model class
    pub model: DroneModel,
    /// Maximum payload capacity (weight units)
    pub weight_limit: u32,
    /// Current battery level (percent, 0-100)
    pub battery: f64,
    /// Lifecycle state
    pub state: DroneState,
}

/// Registration request for a new drone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroneSpec {
    /// Unique serial number (non-empty, at most 100 characters)
    pub serial: String,
    /// Declared model class
    pub model: DroneModel,
    /// Maximum payload capacity (weight units, at most 500)
    pub weight_limit: u32,
    /// Initial battery level (percent)
    pub battery: f64,
}

impl DroneSpec {
    /// Validate registration fields against their domains
    pub fn validate(&self) -> Result<()> {
        if self.serial.is_empty() || self.serial.len() > 100 {
            return Err(DispatchError::InvalidField {
                field: "serial",
                reason: "must be 1-100 characters".to_string(),
            });
        }
        if self.weight_limit > MAX_WEIGHT_LIMIT {
            return Err(DispatchError::InvalidField {
                field: "weight_limit",
                reason: format!("must be at most {}", MAX_WEIGHT_LIMIT),
            });
        }
        if !(0.0..=100.0).contains(&self.battery) {
            return Err(DispatchError::InvalidField {
                field: "battery",
                reason: "must be between 0 and 100".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Medication
// ============================================================================

/// A medication attached to a drone
///
/// Created only through a successful load; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    /// Store-assigned identifier
    pub id: MedicationId,
    /// Display name (letters, digits, underscore, hyphen)
    pub name: String,
    /// Weight (strictly positive)
    pub weight: f64,
    /// Globally unique code (uppercase letters, digits, underscore)
    pub code: String,
    /// Opaque reference to an attached image, if any
    pub image_ref: Option<String>,
    /// Owning drone
    pub drone_id: DroneId,
}

/// A medication as submitted in a load request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationSpec {
    /// Display name
    pub name: String,
    /// Weight (strictly positive)
    pub weight: f64,
    /// Code (uppercase letters, digits, underscore)
    pub code: String,
    /// Opaque reference to an attached image, if any
    pub image_ref: Option<String>,
}

impl MedicationSpec {
    /// Validate name, weight, and code against their domains
    pub fn validate(&self) -> Result<()> {
        if !name_pattern().is_match(&self.name) {
            return Err(DispatchError::InvalidField {
                field: "name",
                reason: format!(
                    "'{}' must contain only letters, digits, underscore, hyphen",
                    self.name
                ),
            });
        }
        if self.weight.is_nan() || self.weight <= 0.0 {
            return Err(DispatchError::InvalidField {
                field: "weight",
                reason: format!("{} must be positive", self.weight),
            });
        }
        if !code_pattern().is_match(&self.code) {
            return Err(DispatchError::InvalidField {
                field: "code",
                reason: format!(
                    "'{}' must contain only uppercase letters, digits, underscore",
                    self.code
                ),
            });
        }
        Ok(())
    }
}

/// Result of a successful load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReceipt {
    /// Medications created by this batch, in submission order
    pub medications: Vec<Medication>,
    /// Capacity left on the drone after this batch
    pub remaining_capacity: f64,
    /// Drone state after the transition
    pub drone_state: DroneState,
}

// ============================================================================
// Battery audit
// ============================================================================

/// A timestamped battery-level sample with a retention window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatteryAudit {
    /// Store-assigned identifier
    pub id: AuditId,
    /// Drone the sample belongs to
    pub drone_id: DroneId,
    /// Battery level at capture time (percent)
    pub battery_level: f64,
    /// Originating task or source name
    pub task_name: String,
    /// Capture timestamp, immutable
    pub recorded_at: DateTime<Utc>,
    /// Retention window (minutes)
    pub ttl_minutes: i64,
}

impl BatteryAudit {
    /// Instant after which this sample is expired
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.recorded_at + Duration::minutes(self.ttl_minutes)
    }

    /// Whether this sample is past its retention window at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() <= now
    }
}
