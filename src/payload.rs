//! Result payloads attached to index rows.
//!
//! A payload tells the search surface what to do when a row is selected:
//! open a deep link ([`IntentPayload`]) or flip a setting in place
//! ([`InlineSwitchPayload`]). Every row carries exactly one payload,
//! stored as a [`PayloadType`] tag plus serialized bytes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Numeric tag persisted next to the payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PayloadType {
    Intent = 0,
    InlineSwitch = 1,
}

impl PayloadType {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Deep link to the screen hosting a setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentPayload {
    pub action: Option<String>,
    pub target_package: Option<String>,
    pub target_class: Option<String>,
}

/// Settings namespace an inline switch writes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingSource {
    #[default]
    System,
    Secure,
    Global,
}

/// A two-state control that can be toggled straight from the results list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineSwitchPayload {
    pub setting_key: String,
    #[serde(default)]
    pub setting_source: SettingSource,
    #[serde(default = "default_on_value")]
    pub on_value: i32,
    #[serde(default)]
    pub off_value: i32,
    /// Fallback deep link used when the switch cannot be shown inline.
    #[serde(default)]
    pub intent: IntentPayload,
    /// Whether the device supports the setting at all.
    #[serde(default = "default_device_supported")]
    pub device_supported: bool,
}

fn default_on_value() -> i32 {
    1
}

fn default_device_supported() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultPayload {
    Intent(IntentPayload),
    InlineSwitch(InlineSwitchPayload),
}

impl ResultPayload {
    /// Builds the generic deep-link payload.
    pub fn intent(
        action: Option<&str>,
        target_package: Option<&str>,
        target_class: Option<&str>,
    ) -> Self {
        ResultPayload::Intent(IntentPayload {
            action: action.map(str::to_string),
            target_package: target_package.map(str::to_string),
            target_class: target_class.map(str::to_string),
        })
    }

    pub fn payload_type(&self) -> PayloadType {
        match self {
            ResultPayload::Intent(_) => PayloadType::Intent,
            ResultPayload::InlineSwitch(_) => PayloadType::InlineSwitch,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("Failed to serialize result payload")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("Failed to deserialize result payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switch() -> ResultPayload {
        ResultPayload::InlineSwitch(InlineSwitchPayload {
            setting_key: "airplane_mode_on".to_string(),
            setting_source: SettingSource::Global,
            on_value: 1,
            off_value: 0,
            intent: IntentPayload {
                action: Some("android.settings.AIRPLANE_MODE_SETTINGS".to_string()),
                target_package: None,
                target_class: None,
            },
            device_supported: false,
        })
    }

    #[test]
    fn test_payload_type_tags() {
        assert_eq!(ResultPayload::intent(None, None, None).payload_type().code(), 0);
        assert_eq!(switch().payload_type().code(), 1);
    }

    #[test]
    fn test_inline_switch_survives_bytes() {
        let payload = switch();
        let bytes = payload.to_bytes().unwrap();
        assert_eq!(ResultPayload::from_bytes(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let a = ResultPayload::intent(Some("action"), Some("pkg"), Some("cls"));
        assert_eq!(a.to_bytes().unwrap(), a.clone().to_bytes().unwrap());
        let json = String::from_utf8(a.to_bytes().unwrap()).unwrap();
        assert!(json.starts_with(r#"{"type":"intent""#), "{}", json);
    }

    #[test]
    fn test_inline_switch_defaults() {
        let payload: InlineSwitchPayload =
            serde_json::from_str(r#"{"setting_key":"bluetooth_on"}"#).unwrap();
        assert_eq!(payload.on_value, 1);
        assert_eq!(payload.off_value, 0);
        assert!(payload.device_supported);
        assert_eq!(payload.setting_source, SettingSource::System);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(ResultPayload::from_bytes(b"not json").is_err());
    }
}
