//! Best-effort device classification from raw fingerprint components
//!
//! Ordered substring checks over the user-agent string, first match wins.
//! Advisory only: classification never blocks recognition, and anything
//! unrecognized defaults to "Unknown".

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Derived device descriptors attached to fingerprints and sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub browser: String,
    pub os: String,
    pub device_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl DeviceInfo {
    /// Classify from a bare user-agent string (session metadata path)
    pub fn from_user_agent(user_agent: &str) -> Self {
        Self {
            browser: classify_browser(user_agent).to_string(),
            os: classify_os(user_agent).to_string(),
            device_type: classify_device_type(user_agent).to_string(),
            screen_resolution: None,
            timezone: None,
            language: None,
        }
    }

    /// Classify from raw fingerprint components (fingerprint path)
    pub fn from_components(raw: &Map<String, Value>) -> Self {
        let user_agent = raw.get("userAgent").and_then(Value::as_str).unwrap_or("");
        let mut info = Self::from_user_agent(user_agent);

        if let Some(res) = raw.get("screenResolution").and_then(Value::as_array) {
            if let (Some(w), Some(h)) = (
                res.first().and_then(Value::as_f64),
                res.get(1).and_then(Value::as_f64),
            ) {
                info.screen_resolution = Some(format!("{}x{}", w as i64, h as i64));
            }
        }
        info.timezone = raw
            .get("timezone")
            .and_then(Value::as_str)
            .map(str::to_string);
        info.language = raw
            .get("language")
            .and_then(Value::as_str)
            .map(str::to_string);

        info
    }
}

fn classify_browser(user_agent: &str) -> &'static str {
    if user_agent.contains("Chrome") {
        "Chrome"
    } else if user_agent.contains("Firefox") {
        "Firefox"
    } else if user_agent.contains("Safari") {
        "Safari"
    } else if user_agent.contains("Edge") {
        "Edge"
    } else {
        "Unknown"
    }
}

fn classify_os(user_agent: &str) -> &'static str {
    if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("Mac OS") || user_agent.contains("macOS") {
        "macOS"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("iOS") {
        "iOS"
    } else {
        "Unknown"
    }
}

fn classify_device_type(user_agent: &str) -> &'static str {
    if user_agent.contains("Mobile") || user_agent.contains("Android") {
        "mobile"
    } else if user_agent.contains("Tablet") || user_agent.contains("iPad") {
        "tablet"
    } else {
        "desktop"
    }
}
