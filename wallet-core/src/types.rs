// Wallet data model
// Plain serializable records shared by the popup, relay, bridge and provider

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Authenticated identity as returned by `/wallet/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl User {
    /// A stored user only counts when both `id` and `email` are non-empty
    pub fn has_identity(&self) -> bool {
        !self.id.is_empty() && !self.email.is_empty()
    }
}

/// Paired (user, token) record. Constructed whole or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub asset_code: String,
    pub asset_issuer: String,
    pub balance: String,
}

/// Balance view handed to the popup and to web pages.
/// Always rebuilt from a fresh wallet fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub native: String,
    pub assets: Vec<Asset>,
}

/// Balance record as the backend reports it, tagged by asset type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiBalance {
    #[serde(rename = "type")]
    pub kind: String,
    pub balance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletData {
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub balances: Vec<ApiBalance>,
    #[serde(default)]
    pub account: Value,
}

impl Balance {
    /// Pull out the `native` record and map every other record to an asset
    pub fn from_api(balances: &[ApiBalance]) -> Self {
        let native = balances
            .iter()
            .find(|b| b.kind == "native")
            .map(|b| b.balance.clone())
            .unwrap_or_else(|| "0".to_string());

        let assets = balances
            .iter()
            .filter(|b| b.kind != "native")
            .map(|b| Asset {
                asset_code: b.kind.clone(),
                asset_issuer: String::new(),
                balance: b.balance.clone(),
            })
            .collect();

        Self { native, assets }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdStats {
    pub total_ads_viewed: u64,
    pub total_revenue: String,
    pub revenue_this_month: String,
    pub revenue_today: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    #[serde(default)]
    pub total_campaigns: u64,
    #[serde(default)]
    pub total_sites: u64,
    #[serde(default)]
    pub total_clicks: u64,
    #[serde(default)]
    pub total_impressions: u64,
    #[serde(default)]
    pub total_spent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    #[serde(default)]
    pub user: Value,
    #[serde(default)]
    pub campaigns: Vec<Value>,
    #[serde(default)]
    pub sites: Vec<Value>,
    #[serde(default)]
    pub summary: DashboardSummary,
}

impl AdStats {
    /// Only clicks and spend are tracked by the dashboard; the period
    /// figures stay at zero until the backend exposes them.
    pub fn from_summary(summary: &DashboardSummary) -> Self {
        Self {
            total_ads_viewed: summary.total_clicks,
            total_revenue: summary.total_spent.to_string(),
            revenue_this_month: "0".to_string(),
            revenue_today: "0".to_string(),
        }
    }
}

/// Withdrawal destinations offered by the popup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawMethod {
    Pix,
    Wallet,
    Metamask,
}

impl WithdrawMethod {
    pub const ALL: [WithdrawMethod; 3] = [Self::Pix, Self::Wallet, Self::Metamask];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pix => "PIX (Brazil)",
            Self::Wallet => "Wallet Address",
            Self::Metamask => "MetaMask",
        }
    }
}

/// Result of a `/transfer` call, reshaped for callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub transaction_hash: String,
    pub message: String,
    pub status: String,
    pub transaction_result: Value,
}

/// Extension-wide preferences persisted under `settings`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub theme: String,
    pub notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            notifications: true,
        }
    }
}
