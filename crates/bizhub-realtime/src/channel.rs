//! Channel type definitions and parsing.

use serde::{Deserialize, Serialize};

use bizhub_entity::ModuleType;

const BROADCAST_CHANNEL: &str = "broadcast_notifications";
const MODULE_SUFFIX: &str = "_notifications";

/// Typed channel identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "module")]
pub enum ChannelType {
    /// Per-module channel, e.g. `sales_notifications`.
    Module(ModuleType),
    /// Everyone, `broadcast_notifications`.
    Broadcast,
}

impl ChannelType {
    /// Parses a channel string into a typed channel.
    pub fn parse(channel: &str) -> Option<Self> {
        if channel == BROADCAST_CHANNEL {
            return Some(Self::Broadcast);
        }
        channel
            .strip_suffix(MODULE_SUFFIX)
            .and_then(|module| module.parse().ok())
            .map(Self::Module)
    }

    /// Converts back to a channel string.
    pub fn to_channel_string(&self) -> String {
        match self {
            Self::Module(module) => format!("{}{MODULE_SUFFIX}", module.as_str()),
            Self::Broadcast => BROADCAST_CHANNEL.to_string(),
        }
    }

    /// Where a module-scoped or broadcast notification is published.
    pub fn for_target(target: Option<ModuleType>) -> Self {
        target.map(Self::Module).unwrap_or(Self::Broadcast)
    }

    /// Channels a client of `module` listens on. Storage sees every module;
    /// everyone else sees their own module. All clients get broadcasts.
    pub fn subscription_plan(module: ModuleType) -> Vec<Self> {
        let mut plan: Vec<Self> = ModuleType::ALL
            .iter()
            .copied()
            .filter(|target| module.follows(*target))
            .map(Self::Module)
            .collect();
        plan.push(Self::Broadcast);
        plan
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_channel_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(
            ChannelType::Module(ModuleType::Sales).to_channel_string(),
            "sales_notifications"
        );
        assert_eq!(
            ChannelType::parse("maintenance_notifications"),
            Some(ChannelType::Module(ModuleType::Maintenance))
        );
        assert_eq!(
            ChannelType::parse("broadcast_notifications"),
            Some(ChannelType::Broadcast)
        );
        assert_eq!(ChannelType::parse("sales"), None);
    }

    #[test]
    fn test_storage_listens_everywhere() {
        let plan = ChannelType::subscription_plan(ModuleType::Storage);
        assert_eq!(plan.len(), ModuleType::ALL.len() + 1);
        assert!(plan.contains(&ChannelType::Module(ModuleType::Pricing)));

        let plan = ChannelType::subscription_plan(ModuleType::Pricing);
        assert_eq!(
            plan,
            vec![ChannelType::Module(ModuleType::Pricing), ChannelType::Broadcast]
        );
    }
}
