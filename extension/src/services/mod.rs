// Browser-side implementations of the core's seams
// Shared by the popup and the three entry binaries; each uses a subset.
#![allow(dead_code)]

pub mod clock;
pub mod runtime;
pub mod storage;
pub mod timer;

use serde_json::Value;
use stellar_wallet_core::WalletConfig;
use wasm_bindgen::JsValue;

const CONFIG_TOML: &str = include_str!("../../wallet.toml");

pub fn config() -> WalletConfig {
    WalletConfig::from_toml_or_default(CONFIG_TOML)
}

/// serde_json value -> plain JS value (via JSON.parse)
pub fn to_js(value: &Value) -> Result<JsValue, JsValue> {
    js_sys::JSON::parse(&value.to_string())
}

/// Plain JS value -> serde_json value. `undefined` and functions become null.
pub fn from_js(value: &JsValue) -> Result<Value, String> {
    if value.is_undefined() || value.is_null() {
        return Ok(Value::Null);
    }

    let text = js_sys::JSON::stringify(value)
        .map_err(|e| format!("Not serializable: {:?}", e))?
        .as_string()
        .unwrap_or_default();
    if text.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| format!("Invalid JSON: {}", e))
}

pub fn js_error(message: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&message.to_string()).into()
}
