// Host parameter surface
//
// String-keyed get/set used by plug-in hosts. The window length is the only
// writable parameter and the only persisted state.

use serde_json::json;

use crate::config::{
    DetectorState, DEFAULT_WINDOW_SECONDS, MAX_WINDOW_SECONDS, MIN_WINDOW_SECONDS,
    WINDOW_STEP_SECONDS,
};
use crate::detector::KeyDetector;
use crate::error::KeyDetectError;

/// Window length in seconds (read/write)
pub const PARAM_WINDOW: &str = "window";
/// Displayed key name (read-only)
pub const PARAM_DETECTED_KEY: &str = "detected_key";
/// Host-facing title including the key (read-only)
pub const PARAM_DISPLAY_NAME: &str = "display_name";
/// Serialised instance state, JSON `{"window": <seconds>}`
pub const PARAM_STATE: &str = "state";
/// Descriptor of the writable parameters (read-only)
pub const PARAM_CHAIN_PARAMS: &str = "chain_params";
/// Host UI layout (read-only)
pub const PARAM_UI_HIERARCHY: &str = "ui_hierarchy";

const DISPLAY_NAME_PREFIX: &str = "KeyDetect";

impl KeyDetector {
    /// Set a parameter from its string form
    ///
    /// # Errors
    /// `UnknownParam` for keys other than `window` and `state`,
    /// `InvalidParamValue` when the value does not parse.
    pub fn set_param(&mut self, key: &str, value: &str) -> Result<(), KeyDetectError> {
        match key {
            PARAM_WINDOW => {
                let seconds: f32 = value.trim().parse().map_err(|_| invalid(key, value))?;
                self.set_window(seconds);
                Ok(())
            }
            PARAM_STATE => {
                let state: DetectorState =
                    serde_json::from_str(value).map_err(|_| invalid(key, value))?;
                match state.valid_window() {
                    Some(seconds) => {
                        self.set_window(seconds);
                    }
                    None => tracing::warn!(
                        "[KeyDetector] Ignoring restored window {} outside supported range",
                        state.window
                    ),
                }
                Ok(())
            }
            _ => Err(KeyDetectError::UnknownParam {
                key: key.to_string(),
            }),
        }
    }

    /// Read a parameter as a string, `None` for unknown keys
    pub fn get_param(&self, key: &str) -> Option<String> {
        match key {
            PARAM_WINDOW => Some(format!("{:.1}", self.window())),
            PARAM_DETECTED_KEY => Some(self.current_key_display().to_string()),
            PARAM_DISPLAY_NAME => Some(format!(
                "{}: {}",
                DISPLAY_NAME_PREFIX,
                self.current_key_display()
            )),
            PARAM_STATE => serde_json::to_string(&DetectorState {
                window: (self.window() * 10.0).round() / 10.0,
            })
            .ok(),
            PARAM_CHAIN_PARAMS => Some(chain_params().to_string()),
            PARAM_UI_HIERARCHY => Some(ui_hierarchy().to_string()),
            _ => None,
        }
    }
}

fn chain_params() -> serde_json::Value {
    json!([{
        "key": PARAM_WINDOW,
        "name": "Window",
        "type": "float",
        "min": MIN_WINDOW_SECONDS,
        "max": MAX_WINDOW_SECONDS,
        "step": WINDOW_STEP_SECONDS,
        "default": DEFAULT_WINDOW_SECONDS,
        "unit": "s",
    }])
}

fn ui_hierarchy() -> serde_json::Value {
    json!({
        "modes": null,
        "levels": {
            "root": {
                "label": DISPLAY_NAME_PREFIX,
                "children": null,
                "knobs": [PARAM_WINDOW],
                "params": [
                    { "key": PARAM_DETECTED_KEY, "label": "Key" },
                    { "key": PARAM_WINDOW, "label": "Window (s)" },
                ],
            },
        },
    })
}

fn invalid(key: &str, value: &str) -> KeyDetectError {
    KeyDetectError::InvalidParamValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
