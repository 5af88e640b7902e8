//! Events emitted by the hotkey engine
//!
//! These are the only outputs of the hook: consumers (the overlay
//! controller) react to them on their own thread.

use serde::{Deserialize, Serialize};

/// Edge-triggered hotkey transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HotkeyEvent {
    /// The configured combination became fully held
    Activated,

    /// A required key was released after activation
    Deactivated,
}

impl std::fmt::Display for HotkeyEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HotkeyEvent::Activated => write!(f, "ACTIVATED"),
            HotkeyEvent::Deactivated => write!(f, "DEACTIVATED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&HotkeyEvent::Activated).unwrap();
        assert_eq!(json, r#"{"type":"activated"}"#);
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"deactivated"}"#;
        let event: HotkeyEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, HotkeyEvent::Deactivated);
    }
}
