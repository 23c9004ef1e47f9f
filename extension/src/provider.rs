// Page-injected wallet provider
// Runs in the page world; exposes the StellarWallet class to dApps. The
// JavaScript glue constructs one instance and fires `stellarWalletReady`.

use serde_json::json;
use std::rc::Rc;
use stellar_wallet_core::protocol::INSTALLED_EVENT;
use stellar_wallet_core::provider::{WalletEvent, WalletEventKind};
use stellar_wallet_core::{PageChannel, ProviderError, WalletProvider, WalletRequest};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::{Event, MessageEvent, Window};

mod services;

use services::timer::GlooTimer;
use services::{from_js, js_error, to_js};

struct WindowChannel;

impl PageChannel for WindowChannel {
    fn post(&self, request: &WalletRequest) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let posted = to_js(&json!(request)).and_then(|msg| window.post_message(&msg, "*"));
        if let Err(e) = posted {
            log::error!("❌ Failed to post {} request: {:?}", request.method, e);
        }
    }
}

type Provider = WalletProvider<WindowChannel, GlooTimer>;

fn provider_error(e: ProviderError) -> JsValue {
    js_error(e)
}

// Dummy main for binary target
fn main() {}

#[wasm_bindgen]
pub struct StellarWallet {
    inner: Rc<Provider>,
    window: Window,
    on_message: Closure<dyn FnMut(MessageEvent)>,
    on_installed: Closure<dyn FnMut(Event)>,
}

#[wasm_bindgen]
impl StellarWallet {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<StellarWallet, JsValue> {
        wasm_logger::init(wasm_logger::Config::default());

        let window = web_sys::window().ok_or_else(|| js_error("No window"))?;
        let inner = Rc::new(WalletProvider::new(
            services::config().provider,
            WindowChannel,
            GlooTimer,
        ));

        let provider = inner.clone();
        let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if let Ok(data) = from_js(&event.data()) {
                provider.on_message(&data);
            }
        });
        window.add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())?;

        let provider = inner.clone();
        let on_installed = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
            log::info!("🌟 Stellar Wallet extension detected");
            provider.mark_extension_detected();
        });
        window.add_event_listener_with_callback(
            INSTALLED_EVENT,
            on_installed.as_ref().unchecked_ref(),
        )?;

        log::info!("🌟 Stellar Wallet provider loaded (v{})", inner.version());
        Ok(StellarWallet {
            inner,
            window,
            on_message,
            on_installed,
        })
    }

    #[wasm_bindgen(getter)]
    pub fn version(&self) -> String {
        self.inner.version().to_string()
    }

    /// Resolves to `{publicKey, email, name}`
    pub fn connect(&self) -> js_sys::Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            let info = inner.connect().await.map_err(provider_error)?;
            to_js(&json!(info))
        })
    }

    /// Resolves to `{native, assets}`
    #[wasm_bindgen(js_name = getBalance)]
    pub fn get_balance(&self) -> js_sys::Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            let balance = inner.get_balance().await.map_err(provider_error)?;
            to_js(&json!(balance))
        })
    }

    #[wasm_bindgen(js_name = sendPayment)]
    pub fn send_payment(
        &self,
        destination: String,
        amount: String,
        memo: Option<String>,
    ) -> js_sys::Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            let receipt = inner
                .send_payment(&destination, &amount, memo.as_deref())
                .await
                .map_err(provider_error)?;
            to_js(&receipt)
        })
    }

    #[wasm_bindgen(js_name = getPublicKey)]
    pub fn get_public_key(&self) -> Result<String, JsValue> {
        self.inner.get_public_key().map_err(provider_error)
    }

    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    #[wasm_bindgen(js_name = isConnected)]
    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    #[wasm_bindgen(js_name = isExtensionAvailable)]
    pub fn is_extension_available(&self) -> bool {
        self.inner.is_extension_available()
    }

    /// Subscribe to `connect`, `disconnect` or `accountsChanged`.
    /// Returns a listener id for `off`.
    pub fn on(&self, event: String, callback: js_sys::Function) -> Result<f64, JsValue> {
        let kind = WalletEventKind::parse(&event)
            .ok_or_else(|| js_error(format!("Unknown event: {}", event)))?;

        let id = self.inner.on(kind, move |event: &WalletEvent| {
            let payload = to_js(&event.payload()).unwrap_or(JsValue::NULL);
            if let Err(e) = callback.call1(&JsValue::NULL, &payload) {
                log::error!("Wallet event listener failed: {:?}", e);
            }
        });
        Ok(id as f64)
    }

    pub fn off(&self, id: f64) -> bool {
        self.inner.off(id as u64)
    }
}

impl Drop for StellarWallet {
    fn drop(&mut self) {
        let _ = self.window.remove_event_listener_with_callback(
            "message",
            self.on_message.as_ref().unchecked_ref(),
        );
        let _ = self.window.remove_event_listener_with_callback(
            INSTALLED_EVENT,
            self.on_installed.as_ref().unchecked_ref(),
        );
    }
}
