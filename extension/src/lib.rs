use dioxus::prelude::*;
use stellar_wallet_core::protocol::Request;
use stellar_wallet_core::{AuthStatus, User};

mod components;
pub mod icons;
mod services;

use components::{Login, WalletView, Withdraw};
use services::runtime::RuntimeChannel;

#[derive(Clone, PartialEq)]
enum AppState {
    Loading,
    Login,
    Wallet,
    Withdraw,
}

#[component]
fn App() -> Element {
    let mut state = use_signal(|| AppState::Loading);
    let mut user = use_signal(|| None::<User>);

    // Restore an existing session
    use_future(move || async move {
        let response = RuntimeChannel.request(Request::CheckAuth).await;
        let restored = response
            .data
            .and_then(|d| serde_json::from_value::<AuthStatus>(d).ok())
            .filter(|status| status.is_authenticated)
            .and_then(|status| status.user);

        match restored {
            Some(u) => {
                log::info!("Session restored for {}", u.email);
                user.set(Some(u));
                state.set(AppState::Wallet);
            }
            None => state.set(AppState::Login),
        }
    });

    let on_logout = move |_: ()| {
        spawn(async move {
            let response = RuntimeChannel.request(Request::Logout).await;
            if !response.success {
                log::error!("Logout failed: {}", response.error_or("unknown error"));
            }
            user.set(None);
            state.set(AppState::Login);
        });
    };

    rsx! {
        div { class: "w-96 min-h-[32rem] bg-gray-50 p-4",
            match (state(), user()) {
                (AppState::Loading, _) => rsx! { Loading {} },
                (AppState::Wallet, Some(u)) => rsx! { WalletView {
                    user: u,
                    on_withdraw: move |_| state.set(AppState::Withdraw),
                    on_logout,
                } },
                (AppState::Withdraw, Some(u)) => rsx! { Withdraw {
                    user: u,
                    on_done: move |_| state.set(AppState::Wallet),
                } },
                _ => rsx! { Login {
                    on_login: move |u: User| {
                        user.set(Some(u));
                        state.set(AppState::Wallet);
                    }
                } },
            }
        }
    }
}

#[component]
fn Loading() -> Element {
    rsx! {
        div { class: "flex flex-col items-center justify-center h-96",
            div { class: "animate-spin w-10 h-10 border-4 border-indigo-600 border-t-transparent rounded-full mb-4" }
            p { class: "text-sm text-gray-500", "Loading wallet..." }
        }
    }
}

#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn run() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Stellar Wallet popup starting...");
    dioxus::launch(App);
}
