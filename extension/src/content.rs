// Content script for Stellar Wallet
// Bridges window.postMessage traffic from the page to the background relay.
// The JavaScript glue injects the provider script and then calls `announce`.

use serde_json::json;
use std::rc::Rc;
use stellar_wallet_core::bridge::PageInfo;
use stellar_wallet_core::protocol::INSTALLED_EVENT;
use stellar_wallet_core::{ContentBridge, PagePort, WalletResponse};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{CustomEvent, CustomEventInit, MessageEvent};

mod services;

use services::runtime::{extension_id, RuntimeChannel};
use services::{from_js, js_error, to_js};

/// Posts bridge responses back into the page
struct WindowPort;

impl PagePort for WindowPort {
    fn post(&self, response: &WalletResponse) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let posted = to_js(&json!(response)).and_then(|msg| window.post_message(&msg, "*"));
        if let Err(e) = posted {
            log::error!("❌ Failed to post {} response: {:?}", response.method, e);
        }
    }
}

type Bridge = ContentBridge<RuntimeChannel, WindowPort>;

thread_local! {
    static BRIDGE: Rc<Bridge> = Rc::new(ContentBridge::new(
        RuntimeChannel,
        WindowPort,
        &services::config().provider.version,
        &extension_id(),
    ));
}

fn bridge() -> Rc<Bridge> {
    BRIDGE.with(Rc::clone)
}

// Dummy main for binary target
fn main() {}

/// Start listening for page requests
#[wasm_bindgen]
pub fn init_content() -> Result<(), JsValue> {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("🌟 Stellar Wallet content script loaded");

    let window = web_sys::window().ok_or_else(|| js_error("No window"))?;
    let own_window = window.clone();

    let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
        // only messages the page posted to itself
        let from_page = event
            .source()
            .is_some_and(|source| js_sys::Object::is(&source, &own_window));
        if !from_page {
            return;
        }

        let Ok(data) = from_js(&event.data()) else {
            return;
        };
        let bridge = bridge();
        spawn_local(async move {
            bridge.on_page_message(&data).await;
        });
    });
    window.add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())?;
    // lives as long as the page
    on_message.forget();

    spawn_local(async {
        if let Some(user) = bridge().refresh().await {
            log::info!("Wallet session found for {}", user.email);
        }
    });

    Ok(())
}

/// Dispatch the `stellarWalletInstalled` announcement
#[wasm_bindgen]
pub fn announce() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| js_error("No window"))?;
    let detail = to_js(&json!(bridge().announcement()))?;

    let init = CustomEventInit::new();
    init.set_detail(&detail);
    let event = CustomEvent::new_with_event_init_dict(INSTALLED_EVENT, &init)?;
    window.dispatch_event(&event)?;

    log::info!("📣 Announced wallet to page");
    Ok(())
}

/// Messages from the extension to this tab (`PING`, `GET_PAGE_INFO`)
#[wasm_bindgen]
pub fn handle_extension_message(message: JsValue) -> Result<JsValue, JsValue> {
    let message = from_js(&message).map_err(js_error)?;
    let response = bridge().on_extension_message(&message, page_info);
    to_js(&response)
}

fn page_info() -> PageInfo {
    let window = web_sys::window();
    let location = window.as_ref().map(|w| w.location());
    PageInfo {
        url: location
            .as_ref()
            .and_then(|l| l.href().ok())
            .unwrap_or_default(),
        title: window
            .and_then(|w| w.document())
            .map(|d| d.title())
            .unwrap_or_default(),
        domain: location
            .and_then(|l| l.hostname().ok())
            .unwrap_or_default(),
    }
}
