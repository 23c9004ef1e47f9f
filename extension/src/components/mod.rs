mod login;
mod wallet_view;
mod withdraw;

pub use login::Login;
pub use wallet_view::WalletView;
pub use withdraw::Withdraw;
