use crate::icons;
use crate::services::runtime::RuntimeChannel;
use dioxus::prelude::*;
use serde_json::Value;
use stellar_wallet_core::protocol::Request;
use stellar_wallet_core::types::AdStats;
use stellar_wallet_core::{Balance, User};

fn field<T: serde::de::DeserializeOwned>(data: Option<Value>, key: &str) -> Option<T> {
    data.and_then(|mut d| d.get_mut(key).map(Value::take))
        .and_then(|v| serde_json::from_value(v).ok())
}

#[component]
pub fn WalletView(user: User, on_withdraw: EventHandler<()>, on_logout: EventHandler<()>) -> Element {
    let mut balance = use_signal(|| None::<Balance>);
    let mut stats = use_signal(|| None::<AdStats>);
    let mut error = use_signal(|| None::<String>);

    // Balance and stats are fetched independently; either may fail alone
    let mut loader = use_future(move || async move {
        error.set(None);

        let response = RuntimeChannel.request(Request::GetWalletBalance).await;
        if response.success {
            balance.set(field(response.data, "balance"));
        } else {
            error.set(Some(response.error_or("Failed to fetch wallet balance")));
        }

        let response = RuntimeChannel.request(Request::GetUserData).await;
        if response.success {
            stats.set(field(response.data, "adStats"));
        }
    });

    let native = balance()
        .map(|b| b.native)
        .unwrap_or_else(|| "...".to_string());

    rsx! {
        div { class: "max-w-sm mx-auto p-4 bg-white rounded-lg shadow-lg",
            // Header
            div { class: "flex items-center justify-between mb-4",
                div {
                    h1 { class: "text-xl font-bold text-gray-900", "{user.name}" }
                    p { class: "text-xs text-gray-500", "{user.email}" }
                }
                div { class: "flex space-x-2",
                    button {
                        class: "text-gray-400 hover:text-gray-600",
                        title: "Refresh",
                        onclick: move |_| loader.restart(),
                        icons::RefreshCw { class: Some("w-5 h-5".to_string()) }
                    }
                    button {
                        class: "text-gray-400 hover:text-gray-600",
                        title: "Sign out",
                        onclick: move |_| on_logout.call(()),
                        icons::LogOut { class: Some("w-5 h-5".to_string()) }
                    }
                }
            }

            // Balance card
            div { class: "bg-gradient-to-br from-indigo-500 to-indigo-700 rounded-lg p-5 text-white mb-4",
                p { class: "text-sm opacity-80 mb-1", "Balance" }
                h2 { class: "text-3xl font-bold mb-3", "{native} XLM" }
                if let Some(b) = balance() {
                    for asset in b.assets {
                        p { class: "text-sm opacity-90", "{asset.balance} {asset.asset_code}" }
                    }
                }
                div { class: "text-xs mt-2",
                    span { class: "opacity-80", "Public key: " }
                    span { class: "font-mono break-all", "{user.public_key}" }
                }
            }

            if let Some(message) = error() {
                div { class: "flex items-start bg-red-50 border border-red-200 rounded-lg p-3 mb-4",
                    icons::AlertCircle { class: Some("w-4 h-4 text-red-600 mr-2 mt-0.5".to_string()) }
                    p { class: "text-xs text-red-800", "{message}" }
                }
            }

            // Ad revenue
            div { class: "border border-gray-200 rounded-lg p-4 mb-4",
                h3 { class: "text-sm font-medium text-gray-500 uppercase mb-3", "Ad Stats" }
                match stats() {
                    Some(s) => rsx! {
                        div { class: "grid grid-cols-2 gap-3 text-sm",
                            StatItem { label: "Ads viewed", value: s.total_ads_viewed.to_string() }
                            StatItem { label: "Total revenue", value: s.total_revenue }
                            StatItem { label: "This month", value: s.revenue_this_month }
                            StatItem { label: "Today", value: s.revenue_today }
                        }
                    },
                    None => rsx! {
                        p { class: "text-center text-sm text-gray-400 py-2", "Stats unavailable" }
                    },
                }
            }

            button {
                class: "w-full flex items-center justify-center bg-indigo-600 text-white py-3 px-4 rounded-lg hover:bg-indigo-700 transition",
                onclick: move |_| on_withdraw.call(()),
                icons::ArrowUpRight { class: Some("w-4 h-4 mr-2".to_string()) }
                "Withdraw"
            }
        }
    }
}

#[component]
fn StatItem(label: &'static str, value: String) -> Element {
    rsx! {
        div {
            p { class: "text-xs text-gray-500", "{label}" }
            p { class: "font-medium text-gray-900", "{value}" }
        }
    }
}
