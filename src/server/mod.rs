//! Per-host enable/disable status.
//!
//! Each host has one persistent node `servers/{ip}`. An empty value means the
//! host may take work; [`DISABLED`] means an operator has switched it off.
//! A host is *available* when it is enabled and at least one of its instances
//! is online.

pub mod service;

pub use service::ServerService;

/// Value of a disabled server node.
pub const DISABLED: &str = "DISABLED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Enabled,
    Disabled,
}

impl ServerStatus {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            ServerStatus::Enabled
        } else {
            ServerStatus::Disabled
        }
    }

    /// Value stored in the server node.
    pub fn node_value(self) -> &'static str {
        match self {
            ServerStatus::Enabled => "",
            ServerStatus::Disabled => DISABLED,
        }
    }

    /// Anything but the disabled marker reads as enabled, including a missing
    /// node.
    pub fn from_node_value(value: Option<&str>) -> Self {
        if value == Some(DISABLED) {
            ServerStatus::Disabled
        } else {
            ServerStatus::Enabled
        }
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStatus::Enabled => write!(f, "enabled"),
            ServerStatus::Disabled => write!(f, "disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_values() {
        assert_eq!(ServerStatus::Enabled.node_value(), "");
        assert_eq!(ServerStatus::Disabled.node_value(), "DISABLED");
        assert_eq!(ServerStatus::from_enabled(false), ServerStatus::Disabled);
    }

    #[test]
    fn only_the_marker_disables() {
        assert_eq!(ServerStatus::from_node_value(None), ServerStatus::Enabled);
        assert_eq!(ServerStatus::from_node_value(Some("")), ServerStatus::Enabled);
        assert_eq!(
            ServerStatus::from_node_value(Some("disabled")),
            ServerStatus::Enabled
        );
        assert_eq!(
            ServerStatus::from_node_value(Some(DISABLED)),
            ServerStatus::Disabled
        );
    }
}
