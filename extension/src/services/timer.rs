use futures::future::LocalBoxFuture;
use gloo_timers::future::TimeoutFuture;
use std::time::Duration;
use stellar_wallet_core::Timer;

#[derive(Clone, Copy, Default)]
pub struct GlooTimer;

impl Timer for GlooTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        Box::pin(TimeoutFuture::new(millis))
    }
}
