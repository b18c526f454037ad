//! Business module enumeration.
//!
//! Modules double as roles: an approval addressed to `sales` may be decided
//! by any actor whose role is `sales`.

use serde::{Deserialize, Serialize};
use std::fmt;

use bizhub_core::AppError;

/// The business modules of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "module_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    /// Inventory and warehouse.
    Storage,
    /// Sales.
    Sales,
    /// Project management.
    Projects,
    /// Maintenance.
    Maintenance,
    /// Price lists.
    Pricing,
}

impl ModuleType {
    /// Every module, in declaration order.
    pub const ALL: [ModuleType; 5] = [
        Self::Storage,
        Self::Sales,
        Self::Projects,
        Self::Maintenance,
        Self::Pricing,
    ];

    /// Return the module as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Sales => "sales",
            Self::Projects => "projects",
            Self::Maintenance => "maintenance",
            Self::Pricing => "pricing",
        }
    }

    /// Storage is the cross-cutting module and follows every other module.
    pub fn sees_every_module(&self) -> bool {
        matches!(self, Self::Storage)
    }

    /// Whether a client of this module receives traffic addressed to
    /// `target`.
    pub fn follows(&self, target: ModuleType) -> bool {
        *self == target || self.sees_every_module()
    }

    /// Parse a notification target where `ALL` (or an empty string) means
    /// "every module".
    pub fn parse_target(s: &str) -> Result<Option<Self>, AppError> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(None);
        }
        trimmed.parse().map(Some)
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ModuleType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "storage" => Ok(Self::Storage),
            "sales" => Ok(Self::Sales),
            "projects" => Ok(Self::Projects),
            "maintenance" => Ok(Self::Maintenance),
            "pricing" => Ok(Self::Pricing),
            _ => Err(AppError::validation(format!("Invalid module: '{s}'"))),
        }
    }
}
