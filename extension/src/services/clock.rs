use stellar_wallet_core::clock::Clock;

/// `Date.now()`; std's SystemTime is unavailable on wasm32-unknown-unknown
#[derive(Clone, Copy, Default)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now_millis(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}
