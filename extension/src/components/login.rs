use crate::icons;
use crate::services::runtime::RuntimeChannel;
use dioxus::prelude::*;
use stellar_wallet_core::protocol::{LoginRequest, Request};
use stellar_wallet_core::User;

#[component]
pub fn Login(on_login: EventHandler<User>) -> Element {
    let mut email = use_signal(String::new);
    let mut password = use_signal(String::new);
    let mut error = use_signal(|| None::<String>);
    let mut submitting = use_signal(|| false);

    let handle_submit = move |_| {
        if submitting() {
            return;
        }
        error.set(None);
        submitting.set(true);

        spawn(async move {
            let request = Request::Login(LoginRequest {
                email: email().trim().to_string(),
                password: password(),
            });
            let response = RuntimeChannel.request(request).await;
            submitting.set(false);

            let user = response
                .data
                .as_ref()
                .and_then(|d| d.get("user").cloned())
                .and_then(|u| serde_json::from_value::<User>(u).ok());

            match (response.success, user) {
                (true, Some(user)) => {
                    log::info!("✅ Logged in as {}", user.email);
                    password.set(String::new());
                    on_login.call(user);
                }
                _ => error.set(Some(response.error_or("Login failed"))),
            }
        });
    };

    rsx! {
        div { class: "max-w-sm mx-auto mt-8 p-6 bg-white rounded-lg shadow-lg",
            div { class: "text-center mb-6",
                icons::Wallet { class: Some("w-10 h-10 text-indigo-600 mx-auto mb-2".to_string()) }
                h1 { class: "text-2xl font-bold text-gray-900", "Stellar Wallet" }
                p { class: "text-sm text-gray-500", "Sign in to your wallet" }
            }

            if let Some(message) = error() {
                div { class: "flex items-start bg-red-50 border border-red-200 rounded-lg p-3 mb-4",
                    icons::AlertCircle { class: Some("w-4 h-4 text-red-600 mr-2 mt-0.5".to_string()) }
                    p { class: "text-xs text-red-800", "{message}" }
                }
            }

            div { class: "space-y-4",
                div {
                    label { class: "block text-sm font-medium text-gray-700 mb-2", "Email" }
                    input {
                        class: "w-full px-4 py-2 border border-gray-300 rounded-lg focus:ring-2 focus:ring-indigo-500 focus:border-transparent",
                        r#type: "email",
                        placeholder: "you@example.com",
                        value: "{email}",
                        oninput: move |e| email.set(e.value())
                    }
                }
                div {
                    label { class: "block text-sm font-medium text-gray-700 mb-2", "Password" }
                    input {
                        class: "w-full px-4 py-2 border border-gray-300 rounded-lg focus:ring-2 focus:ring-indigo-500 focus:border-transparent",
                        r#type: "password",
                        value: "{password}",
                        oninput: move |e| password.set(e.value())
                    }
                }
                button {
                    class: "w-full bg-indigo-600 text-white py-3 px-4 rounded-lg hover:bg-indigo-700 transition disabled:opacity-50 disabled:cursor-not-allowed",
                    disabled: submitting() || email().trim().is_empty() || password().is_empty(),
                    onclick: handle_submit,
                    if submitting() { "Signing in..." } else { "Sign In" }
                }
            }
        }
    }
}
