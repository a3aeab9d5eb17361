//! How accepted connections get a unit of execution.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Runs one connection's work.
///
/// The acceptors only talk to this trait, so a bounded or queued policy can
/// replace [`Unbounded`] without touching protocol code.
pub trait Dispatcher: Send + Sync + fmt::Debug {
    /// Start `task`. Must not block the caller.
    fn dispatch(&self, task: BoxFuture<'static, ()>);
}

/// One tokio task per connection with no limit.
///
/// Under a connection flood this grows without bound; that is the known
/// resource-exhaustion risk of this policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unbounded;

impl Dispatcher for Unbounded {
    fn dispatch(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(async move {
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                error!(panic = %panic_message(panic.as_ref()), "Connection task panicked");
            }
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
