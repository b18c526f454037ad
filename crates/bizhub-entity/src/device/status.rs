//! Device liveness enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

use bizhub_core::AppError;

/// Liveness state of a client device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "device_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Heartbeating and in use.
    Online,
    /// Missed too many heartbeats, or deactivated.
    Offline,
    /// Heartbeating but the user is away.
    Idle,
}

impl DeviceStatus {
    /// Check if live messages can reach the device.
    pub fn is_reachable(&self) -> bool {
        !matches!(self, Self::Offline)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Idle => "idle",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DeviceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "idle" => Ok(Self::Idle),
            _ => Err(AppError::validation(format!("Invalid device status: '{s}'"))),
        }
    }
}
