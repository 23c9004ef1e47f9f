use crate::icons;
use crate::services::runtime::RuntimeChannel;
use dioxus::prelude::*;
use serde_json::json;
use stellar_wallet_core::protocol::{Request, WithdrawalRequest};
use stellar_wallet_core::types::{TransferReceipt, WithdrawMethod};
use stellar_wallet_core::User;

fn method_value(method: WithdrawMethod) -> &'static str {
    match method {
        WithdrawMethod::Pix => "pix",
        WithdrawMethod::Wallet => "wallet",
        WithdrawMethod::Metamask => "metamask",
    }
}

fn destination_hint(method: WithdrawMethod) -> &'static str {
    match method {
        WithdrawMethod::Pix => "PIX key",
        WithdrawMethod::Wallet => "G... Stellar address",
        WithdrawMethod::Metamask => "MetaMask address",
    }
}

#[component]
pub fn Withdraw(user: User, on_done: EventHandler<()>) -> Element {
    let mut amount = use_signal(String::new);
    let mut method = use_signal(|| WithdrawMethod::Wallet);
    let mut destination = use_signal(String::new);
    let mut error = use_signal(|| None::<String>);
    let mut receipt = use_signal(|| None::<TransferReceipt>);
    let mut submitting = use_signal(|| false);

    let user_id = user.id.clone();
    let handle_submit = move |_| {
        if submitting() {
            return;
        }
        error.set(None);
        submitting.set(true);

        let request = Request::SubmitWithdrawal(WithdrawalRequest {
            user_id: Some(user_id.clone()),
            amount: Some(json!(amount().trim())),
            method: Some(method()),
            destination: Some(destination().trim().to_string()),
        });

        spawn(async move {
            let response = RuntimeChannel.request(request).await;
            submitting.set(false);

            let parsed = response
                .data
                .clone()
                .and_then(|d| serde_json::from_value::<TransferReceipt>(d).ok());
            match (response.success, parsed) {
                (true, Some(r)) => {
                    log::info!("✅ Withdrawal submitted: {}", r.transaction_hash);
                    receipt.set(Some(r));
                }
                _ => error.set(Some(response.error_or("Transaction failed"))),
            }
        });
    };

    if let Some(r) = receipt() {
        return rsx! {
            div { class: "max-w-sm mx-auto p-6 bg-white rounded-lg shadow-lg text-center space-y-4",
                icons::CheckCircle { class: Some("w-12 h-12 text-green-600 mx-auto".to_string()) }
                h2 { class: "text-xl font-bold text-gray-900", "{r.message}" }
                div { class: "bg-gray-50 border border-gray-200 rounded-lg p-3 text-left",
                    p { class: "text-xs text-gray-500", "Transaction" }
                    p { class: "text-xs font-mono text-gray-900 break-all", "{r.transaction_hash}" }
                    p { class: "text-xs text-gray-500 mt-2", "Status: {r.status}" }
                }
                button {
                    class: "w-full bg-indigo-600 text-white py-3 px-4 rounded-lg hover:bg-indigo-700 transition",
                    onclick: move |_| on_done.call(()),
                    "Back to Wallet"
                }
            }
        };
    }

    rsx! {
        div { class: "max-w-sm mx-auto p-6 bg-white rounded-lg shadow-lg",
            h2 { class: "text-2xl font-bold text-gray-900 mb-6", "Withdraw" }

            if let Some(message) = error() {
                div { class: "flex items-start bg-red-50 border border-red-200 rounded-lg p-3 mb-4",
                    icons::AlertCircle { class: Some("w-4 h-4 text-red-600 mr-2 mt-0.5".to_string()) }
                    p { class: "text-xs text-red-800", "{message}" }
                }
            }

            div { class: "space-y-4",
                div {
                    label { class: "block text-sm font-medium text-gray-700 mb-2", "Amount (XLM)" }
                    input {
                        class: "w-full px-4 py-2 border border-gray-300 rounded-lg focus:ring-2 focus:ring-indigo-500 focus:border-transparent",
                        r#type: "text",
                        placeholder: "0.0",
                        value: "{amount}",
                        oninput: move |e| amount.set(e.value())
                    }
                }

                div {
                    label { class: "block text-sm font-medium text-gray-700 mb-2", "Method" }
                    select {
                        class: "w-full px-4 py-2 border border-gray-300 rounded-lg",
                        value: method_value(method()),
                        onchange: move |e| {
                            let picked = WithdrawMethod::ALL
                                .into_iter()
                                .find(|m| method_value(*m) == e.value());
                            if let Some(m) = picked {
                                method.set(m);
                            }
                        },
                        for m in WithdrawMethod::ALL {
                            option { value: method_value(m), selected: m == method(), "{m.label()}" }
                        }
                    }
                }

                div {
                    label { class: "block text-sm font-medium text-gray-700 mb-2", "Destination" }
                    input {
                        class: "w-full px-4 py-2 border border-gray-300 rounded-lg font-mono text-sm focus:ring-2 focus:ring-indigo-500 focus:border-transparent",
                        r#type: "text",
                        placeholder: destination_hint(method()),
                        value: "{destination}",
                        oninput: move |e| destination.set(e.value())
                    }
                }

                div { class: "flex space-x-4 pt-4",
                    button {
                        class: "flex-1 bg-gray-200 text-gray-700 py-3 px-4 rounded-lg hover:bg-gray-300 transition",
                        onclick: move |_| on_done.call(()),
                        "Cancel"
                    }
                    button {
                        class: "flex-1 bg-indigo-600 text-white py-3 px-4 rounded-lg hover:bg-indigo-700 transition disabled:opacity-50",
                        disabled: submitting(),
                        onclick: handle_submit,
                        if submitting() { "Sending..." } else { "Withdraw" }
                    }
                }
            }
        }
    }
}
