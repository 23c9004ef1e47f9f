// Stellar wallet core
// Browser-independent logic shared by the extension's background, content and
// page contexts. Browser facilities come in through the traits in `storage`,
// `api`, `bridge` and `provider`.

pub mod api;
pub mod auth;
pub mod bridge;
pub mod classify;
pub mod clock;
pub mod config;
pub mod error;
pub mod protocol;
pub mod provider;
pub mod relay;
pub mod storage;
pub mod types;

pub use api::{ApiClient, ApiResponse, HttpTransport};
pub use auth::{AuthManager, AuthStatus};
pub use bridge::{ContentBridge, PagePort, RelayChannel};
pub use config::WalletConfig;
pub use error::{ApiError, BridgeError, ProviderError, RelayError, StorageError};
pub use protocol::{RelayResponse, Request, WalletRequest, WalletResponse};
pub use provider::{PageChannel, Timer, WalletProvider};
pub use relay::Relay;
pub use storage::{KeyValueStore, KeyValueStoreExt, MemoryStore};
pub use types::{Balance, Settings, User};
