// chrome.runtime messaging
// Popup and content script reach the background relay through sendMessage

use async_trait::async_trait;
use stellar_wallet_core::{BridgeError, RelayChannel, RelayResponse, Request};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use super::{from_js, to_js};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "runtime"], js_name = sendMessage, catch)]
    fn send_message(message: JsValue) -> Result<js_sys::Promise, JsValue>;
}

fn channel_error(e: JsValue) -> BridgeError {
    BridgeError::Channel(
        e.as_string()
            .or_else(|| {
                js_sys::Reflect::get(&e, &"message".into())
                    .ok()
                    .and_then(|m| m.as_string())
            })
            .unwrap_or_else(|| format!("{:?}", e)),
    )
}

/// `chrome.runtime.id`, empty outside an extension context
pub fn extension_id() -> String {
    ["chrome", "runtime", "id"]
        .iter()
        .try_fold(js_sys::global().into(), |obj: JsValue, key| {
            js_sys::Reflect::get(&obj, &(*key).into())
                .ok()
                .filter(|v| !v.is_undefined())
        })
        .and_then(|v| v.as_string())
        .unwrap_or_default()
}

#[derive(Clone, Copy, Default)]
pub struct RuntimeChannel;

#[async_trait(?Send)]
impl RelayChannel for RuntimeChannel {
    async fn send(&self, request: Request) -> Result<RelayResponse, BridgeError> {
        log::debug!("📤 {}", request.kind());
        let message = to_js(&request.to_envelope()).map_err(channel_error)?;
        let reply = JsFuture::from(send_message(message).map_err(channel_error)?)
            .await
            .map_err(channel_error)?;

        let value = from_js(&reply).map_err(BridgeError::Channel)?;
        serde_json::from_value(value).map_err(|e| BridgeError::Channel(e.to_string()))
    }
}

impl RuntimeChannel {
    /// Same as `send`, with channel failures folded into the reply
    pub async fn request(&self, request: Request) -> RelayResponse {
        match self.send(request).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("❌ {}", e);
                RelayResponse::failure(e.to_string())
            }
        }
    }
}
