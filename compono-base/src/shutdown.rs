use async_trait::async_trait;
use compono::{Component, Context, Environment, StdError};

/// Component cancelling the run context on SIGINT or SIGTERM.
///
/// On init it derives a child of the current context, installs it into the
/// environment and cancels it when a shutdown signal arrives. Components
/// initialized later and the application action observe the cancellation
/// through [`Environment::context`].
pub struct GracefulShutdown;

pub const GRACEFUL_SHUTDOWN_COMPONENT: &str = "compono-base.graceful-shutdown";

#[async_trait]
impl Component for GracefulShutdown {
    fn identifier(&self) -> &str {
        GRACEFUL_SHUTDOWN_COMPONENT
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn init(&self, env: &Environment) -> Result<(), StdError> {
        let ctx = env.context().child();
        env.set_context(ctx.clone())?;
        tokio::spawn(cancel_on_signal(ctx));
        Ok(())
    }
}

/// Cancels `ctx` on the first shutdown signal.
///
/// Returns without cancelling when `ctx` is cancelled by someone else.
pub async fn cancel_on_signal(ctx: Context) {
    tokio::select! {
        result = shutdown_signal() => match result {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                ctx.cancel();
            }
            Err(err) => {
                tracing::error!("Cannot listen for shutdown signal: {err}");
                ctx.cancelled().await;
            }
        },
        _ = ctx.cancelled() => {}
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<(), StdError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<(), StdError> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
