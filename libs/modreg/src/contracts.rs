use async_trait::async_trait;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;

/// Opaque handle to a subsystem's implementation.
///
/// The registry only keeps a reference; the subsystem owns its internal resources.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Start-up logic of a registered module.
///
/// Runs at most once per module unless it fails, in which case the module stays
/// `Registered` and the caller may try again.
#[async_trait]
pub trait StartHook: Send + Sync + 'static {
    async fn start(&self) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a [`StartHook`].
pub struct FnHook<F>(F);

#[async_trait]
impl<F, Fut> StartHook for FnHook<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn start(&self) -> anyhow::Result<()> {
        (self.0)().await
    }
}

/// Wrap a closure returning a future as a shareable start hook.
pub fn hook_fn<F, Fut>(f: F) -> Arc<dyn StartHook>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnHook(f))
}
