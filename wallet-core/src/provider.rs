// Page-side wallet provider
// Runs in the page's own context. Talks to the content bridge only through
// window messages; requests are correlated by a per-provider id.

use futures::channel::oneshot;
use futures::future::{select, Either, LocalBoxFuture};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::protocol::{ConnectInfo, WalletMethod, WalletRequest, WalletResponse};
use crate::types::Balance;

/// Outbound side of `window.postMessage` from the page
pub trait PageChannel {
    fn post(&self, request: &WalletRequest);
}

/// Async sleep supplied by the host (gloo on wasm, tokio in tests)
pub trait Timer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletEventKind {
    Connect,
    Disconnect,
    AccountsChanged,
}

impl WalletEventKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "connect" => Some(Self::Connect),
            "disconnect" => Some(Self::Disconnect),
            "accountsChanged" => Some(Self::AccountsChanged),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    Connect(ConnectInfo),
    Disconnect,
    AccountsChanged(Vec<String>),
}

impl WalletEvent {
    pub fn kind(&self) -> WalletEventKind {
        match self {
            WalletEvent::Connect(_) => WalletEventKind::Connect,
            WalletEvent::Disconnect => WalletEventKind::Disconnect,
            WalletEvent::AccountsChanged(_) => WalletEventKind::AccountsChanged,
        }
    }

    /// Payload handed to page listeners
    pub fn payload(&self) -> Value {
        match self {
            WalletEvent::Connect(info) => json!(info),
            WalletEvent::Disconnect => Value::Null,
            WalletEvent::AccountsChanged(accounts) => json!(accounts),
        }
    }
}

pub type ListenerId = u64;
type Listener = Rc<dyn Fn(&WalletEvent)>;

pub struct WalletProvider<P, T> {
    port: P,
    timer: T,
    config: ProviderConfig,
    next_id: Cell<u64>,
    pending: RefCell<HashMap<u64, oneshot::Sender<WalletResponse>>>,
    connected: Cell<bool>,
    account: RefCell<Option<String>>,
    extension_detected: Cell<bool>,
    listeners: RefCell<Vec<(ListenerId, WalletEventKind, Listener)>>,
    next_listener: Cell<ListenerId>,
}

impl<P: PageChannel, T: Timer> WalletProvider<P, T> {
    pub fn new(config: ProviderConfig, port: P, timer: T) -> Self {
        Self {
            port,
            timer,
            config,
            next_id: Cell::new(1),
            pending: RefCell::new(HashMap::new()),
            connected: Cell::new(false),
            account: RefCell::new(None),
            extension_detected: Cell::new(false),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
        }
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    pub fn is_extension_available(&self) -> bool {
        self.extension_detected.get()
    }

    /// Called when the `stellarWalletInstalled` announcement is seen
    pub fn mark_extension_detected(&self) {
        self.extension_detected.set(true);
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Route a page `message` event to the call that is waiting for it.
    /// Returns `true` when a pending call was resolved.
    pub fn on_message(&self, message: &Value) -> bool {
        let Some(response) = WalletResponse::from_page_message(message) else {
            return false;
        };
        let Some(id) = response.id else {
            log::debug!("Ignoring wallet response without id: {}", response.method);
            return false;
        };

        // late responses find no entry and are dropped
        let Some(sender) = self.pending.borrow_mut().remove(&id) else {
            log::debug!("No pending request {} for {}", id, response.method);
            return false;
        };
        sender.send(response).is_ok()
    }

    pub async fn connect(&self) -> Result<ConnectInfo, ProviderError> {
        log::info!("🔗 Connecting to Stellar Wallet...");

        let outcome = self
            .call(
                WalletMethod::Connect,
                None,
                self.config.connect_timeout(),
                "Connection timeout",
            )
            .await
            .and_then(|data| decode::<ConnectInfo>(data.unwrap_or(Value::Null)));

        match outcome {
            Ok(info) => {
                self.connected.set(true);
                *self.account.borrow_mut() = Some(info.public_key.clone());
                self.emit(&WalletEvent::Connect(info.clone()));
                self.emit(&WalletEvent::AccountsChanged(vec![info.public_key.clone()]));
                Ok(info)
            }
            Err(e) => {
                log::warn!("❌ Wallet connection failed: {}", e);
                self.mark_disconnected();
                Err(e)
            }
        }
    }

    pub async fn get_balance(&self) -> Result<Balance, ProviderError> {
        let data = self
            .call(
                WalletMethod::GetBalance,
                None,
                self.config.balance_timeout(),
                "Balance request timeout",
            )
            .await?
            .unwrap_or(Value::Null);

        // the relay wraps the balance as `{balance: {...}}`
        let balance = match data {
            Value::Object(mut map) if map.contains_key("balance") => {
                map.remove("balance").unwrap_or(Value::Null)
            }
            other => other,
        };
        decode(balance)
    }

    pub async fn send_payment(
        &self,
        destination: &str,
        amount: &str,
        memo: Option<&str>,
    ) -> Result<Value, ProviderError> {
        let mut data = json!({ "destination": destination, "amount": amount });
        if let Some(memo) = memo {
            data["memo"] = json!(memo);
        }

        let data = self
            .call(
                WalletMethod::SendPayment,
                Some(data),
                self.config.payment_timeout(),
                "Payment request timeout",
            )
            .await?;
        Ok(data.unwrap_or(Value::Null))
    }

    /// Locally cached key of the connected account
    pub fn get_public_key(&self) -> Result<String, ProviderError> {
        if !self.connected.get() {
            return Err(ProviderError::NotConnected);
        }
        self.account.borrow().clone().ok_or(ProviderError::NotConnected)
    }

    pub fn disconnect(&self) {
        log::info!("🔌 Disconnected from Stellar Wallet");
        self.mark_disconnected();
    }

    pub fn on(&self, kind: WalletEventKind, listener: impl Fn(&WalletEvent) + 'static) -> ListenerId {
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);
        self.listeners.borrow_mut().push((id, kind, Rc::new(listener)));
        id
    }

    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _, _)| *lid != id);
        listeners.len() != before
    }

    fn mark_disconnected(&self) {
        self.connected.set(false);
        *self.account.borrow_mut() = None;
        self.emit(&WalletEvent::Disconnect);
    }

    fn emit(&self, event: &WalletEvent) {
        let kind = event.kind();
        // snapshot so a listener may call on/off
        let matching: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, l)| l.clone())
            .collect();
        for listener in matching {
            listener(event);
        }
    }

    fn allocate_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1));
        id
    }

    /// Post one request and wait for its response or the deadline,
    /// whichever comes first
    async fn call(
        &self,
        method: WalletMethod,
        data: Option<Value>,
        timeout: Duration,
        timeout_message: &str,
    ) -> Result<Option<Value>, ProviderError> {
        let id = self.allocate_id();
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().insert(id, tx);
        self.port.post(&WalletRequest::new(method, data, id));

        match select(rx, self.timer.sleep(timeout)).await {
            Either::Left((Ok(response), _)) => {
                if response.success {
                    Ok(response.data)
                } else {
                    Err(ProviderError::Rejected(
                        response.error.unwrap_or_else(|| "Request failed".to_string()),
                    ))
                }
            }
            Either::Left((Err(_), _)) => Err(ProviderError::Cancelled),
            Either::Right(_) => {
                self.pending.borrow_mut().remove(&id);
                log::warn!("⏰ {} ({} request {})", timeout_message, method.as_str(), id);
                Err(ProviderError::Timeout(timeout_message.to_string()))
            }
        }
    }
}

fn decode<D: serde::de::DeserializeOwned>(value: Value) -> Result<D, ProviderError> {
    serde_json::from_value(value).map_err(|e| ProviderError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WALLET_RESPONSE;
    use futures::future::join;
    use tokio::time::Instant;

    #[derive(Default)]
    struct Outbox(RefCell<Vec<WalletRequest>>);

    impl PageChannel for Outbox {
        fn post(&self, request: &WalletRequest) {
            self.0.borrow_mut().push(request.clone());
        }
    }

    struct TokioTimer;

    impl Timer for TokioTimer {
        fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
            Box::pin(tokio::time::sleep(duration))
        }
    }

    fn provider() -> WalletProvider<Outbox, TokioTimer> {
        WalletProvider::new(ProviderConfig::default(), Outbox::default(), TokioTimer)
    }

    fn reply(request: &WalletRequest, success: bool, data: Value, error: Option<&str>) -> Value {
        json!({
            "type": WALLET_RESPONSE,
            "method": request.method,
            "success": success,
            "data": data,
            "error": error,
            "id": request.id,
        })
    }

    fn last_request(p: &WalletProvider<Outbox, TokioTimer>) -> WalletRequest {
        p.port.0.borrow().last().cloned().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_balance_times_out_after_ten_seconds() {
        let p = provider();
        let start = Instant::now();

        let err = p.get_balance().await.unwrap_err();

        let elapsed = start.elapsed();
        assert_eq!(err, ProviderError::Timeout("Balance request timeout".to_string()));
        assert!(elapsed >= Duration::from_secs(10), "fired early: {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(10_100), "fired late: {:?}", elapsed);
        assert_eq!(p.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_payment_and_connect_timeouts() {
        let p = provider();

        let start = Instant::now();
        let err = p.send_payment("GDEST", "1", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Payment request timeout");
        assert!(start.elapsed() >= Duration::from_secs(30));

        let disconnects = Rc::new(Cell::new(0));
        let counter = disconnects.clone();
        p.on(WalletEventKind::Disconnect, move |_| counter.set(counter.get() + 1));

        let err = p.connect().await.unwrap_err();
        assert_eq!(err.to_string(), "Connection timeout");
        assert!(!p.is_connected());
        assert_eq!(disconnects.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_is_ignored() {
        let p = provider();
        assert!(p.get_balance().await.is_err());

        let request = last_request(&p);
        let late = reply(&request, true, json!({"balance": {"native": "1", "assets": []}}), None);
        assert!(!p.on_message(&late));
    }

    #[tokio::test]
    async fn test_connect_success_emits_events() {
        let p = provider();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        p.on(WalletEventKind::Connect, move |e| sink.borrow_mut().push(e.clone()));
        let sink = events.clone();
        p.on(WalletEventKind::AccountsChanged, move |e| sink.borrow_mut().push(e.clone()));

        let responder = async {
            tokio::task::yield_now().await;
            let request = last_request(&p);
            assert_eq!(request.method, "connect");
            p.on_message(&reply(
                &request,
                true,
                json!({"publicKey": "GPUB", "email": "a@b.c", "name": "Ann"}),
                None,
            ));
        };
        let (info, _) = join(p.connect(), responder).await;

        let info = info.unwrap();
        assert_eq!(info.public_key, "GPUB");
        assert!(p.is_connected());
        assert_eq!(p.get_public_key().unwrap(), "GPUB");
        assert_eq!(events.borrow().len(), 2);
        assert_eq!(
            events.borrow()[1],
            WalletEvent::AccountsChanged(vec!["GPUB".to_string()])
        );
    }

    #[tokio::test]
    async fn test_concurrent_calls_resolve_by_id() {
        let p = provider();

        let responder = async {
            tokio::task::yield_now().await;
            let requests = p.port.0.borrow().clone();
            assert_eq!(requests.len(), 2);
            assert_ne!(requests[0].id, requests[1].id);
            // answer in reverse order
            p.on_message(&reply(
                &requests[1],
                true,
                json!({"balance": {"native": "2", "assets": []}}),
                None,
            ));
            p.on_message(&reply(
                &requests[0],
                true,
                json!({"balance": {"native": "1", "assets": []}}),
                None,
            ));
        };

        let ((first, second), _) = join(join(p.get_balance(), p.get_balance()), responder).await;
        assert_eq!(first.unwrap().native, "1");
        assert_eq!(second.unwrap().native, "2");
        assert_eq!(p.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_rejection_carries_error_text() {
        let p = provider();
        let responder = async {
            tokio::task::yield_now().await;
            let request = last_request(&p);
            p.on_message(&reply(&request, false, Value::Null, Some("Invalid payment amount")));
        };

        let (result, _) = join(p.send_payment("GDESTINATION", "0", None), responder).await;
        assert_eq!(
            result.unwrap_err(),
            ProviderError::Rejected("Invalid payment amount".to_string())
        );
    }

    #[test]
    fn test_public_key_requires_connection() {
        let p = provider();
        assert_eq!(p.get_public_key(), Err(ProviderError::NotConnected));
    }

    #[test]
    fn test_foreign_messages_are_ignored() {
        let p = provider();
        assert!(!p.on_message(&json!({"type": "STELLAR_WALLET_REQUEST", "method": "connect", "id": 1})));
        assert!(!p.on_message(&json!({"type": WALLET_RESPONSE, "method": "connect", "success": true})));
    }

    #[test]
    fn test_listener_removal() {
        let p = provider();
        let id = p.on(WalletEventKind::Disconnect, |_| {});
        assert!(p.off(id));
        assert!(!p.off(id));
    }
}
