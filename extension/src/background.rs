// Background service worker logic for Stellar Wallet
// No Dioxus; the JavaScript glue only forwards Chrome events to these exports

use serde_json::json;
use std::rc::Rc;
use stellar_wallet_core::api::ReqwestTransport;
use stellar_wallet_core::relay::InstallReason;
use stellar_wallet_core::Relay;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

mod services;

use services::clock::BrowserClock;
use services::storage::ChromeStorage;
use services::{from_js, js_error, to_js};

type BackgroundRelay = Relay<ChromeStorage, ReqwestTransport>;

thread_local! {
    static RELAY: Rc<BackgroundRelay> = Rc::new(Relay::with_clock(
        &services::config(),
        ChromeStorage,
        ReqwestTransport::new(),
        Rc::new(BrowserClock),
    ));
}

fn relay() -> Rc<BackgroundRelay> {
    RELAY.with(Rc::clone)
}

// Dummy main for binary target
fn main() {}

/// Initialize background service worker
/// Called from JavaScript glue via wasm_bindgen
#[wasm_bindgen]
pub fn init_background() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("🚀 Stellar Wallet background service initialized");
}

/// `chrome.runtime.onInstalled`
#[wasm_bindgen]
pub fn handle_install(reason: String) -> js_sys::Promise {
    future_to_promise(async move {
        let Some(reason) = InstallReason::parse(&reason) else {
            log::warn!("Unknown install reason: {}", reason);
            return Ok(JsValue::UNDEFINED);
        };
        relay().on_install(reason).await.map_err(js_error)?;
        Ok(JsValue::UNDEFINED)
    })
}

/// `chrome.runtime.onStartup`; resolves to whether a session survived
#[wasm_bindgen]
pub fn handle_startup() -> js_sys::Promise {
    future_to_promise(async move {
        let user = relay().on_startup().await;
        Ok(JsValue::from_bool(user.is_some()))
    })
}

/// `chrome.runtime.onMessage`: resolves to the `{success, data?, error?}` reply.
/// Never rejects, so the sender always gets exactly one response.
#[wasm_bindgen]
pub fn handle_message(message: JsValue) -> js_sys::Promise {
    future_to_promise(async move {
        let envelope = from_js(&message).unwrap_or_else(|e| {
            log::error!("Unreadable message: {}", e);
            serde_json::Value::Null
        });

        let response = relay().dispatch(&envelope).await;
        to_js(&json!(response))
            .or_else(|_| to_js(&json!({"success": false, "error": "Message handler error"})))
    })
}
