use std::any::type_name;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use compono::{
    Component, ConfigSection, Environment, Error, ErrorKind, StdError, defer, join, join_all,
};
use duration_str::deserialize_option_duration;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::task::JoinSet;

pub use tokio_util::sync::CancellationToken;

/// Grace period used when the `"daemons"` config section does not set one.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Long-running background task of an application.
///
/// The default implementation waits for the shutdown token and returns.
pub trait Daemon: Send + Sync + 'static {
    fn run(
        &self,
        env: &Environment,
        shutdown: CancellationToken,
    ) -> impl Future<Output = Result<(), StdError>> + Send {
        let _ = env;
        async move {
            shutdown.cancelled_owned().await;
            Ok(())
        }
    }
}

#[async_trait]
trait DynDaemon: Send + Sync {
    async fn run(&self, env: &Environment, shutdown: CancellationToken) -> Result<(), StdError>;
}

#[async_trait]
impl<T> DynDaemon for T
where
    T: Daemon,
{
    async fn run(&self, env: &Environment, shutdown: CancellationToken) -> Result<(), StdError> {
        T::run(self, env, shutdown).await
    }
}

#[derive(Default, Deserialize)]
pub struct DaemonsConfig {
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub grace_period: Option<Duration>,
}

impl ConfigSection for DaemonsConfig {
    fn key() -> &'static str {
        "daemons"
    }
}

struct RunningDaemons {
    shutdown: CancellationToken,
    tasks: JoinSet<Result<(), StdError>>,
}

/// Component running daemons for the lifetime of an application run.
///
/// Daemons start when the component is initialized and receive a token
/// that fires when the environment context is cancelled, when the set is
/// stopped or when any daemon fails. On stop the set waits for the daemons
/// for the configured grace period, then aborts the rest and reports
/// [`ErrorKind::ForcedShutdown`].
///
/// # Examples
///
/// ```rust
/// use compono::{Environment, StdError};
/// use compono_base::{CancellationToken, Daemon, DaemonSet};
///
/// struct Heartbeat;
///
/// impl Daemon for Heartbeat {
///     async fn run(&self, _env: &Environment, shutdown: CancellationToken) -> Result<(), StdError> {
///         shutdown.cancelled().await;
///         Ok(())
///     }
/// }
///
/// let daemons = DaemonSet::new("daemons").with_daemon(Heartbeat);
/// assert_eq!(daemons.len(), 1);
/// ```
pub struct DaemonSet {
    identifier: String,
    daemons: Vec<(&'static str, Arc<dyn DynDaemon>)>,
    grace_period: Option<Duration>,
    running: Mutex<Option<RunningDaemons>>,
}

impl DaemonSet {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            daemons: Vec::new(),
            grace_period: None,
            running: Mutex::new(None),
        }
    }

    pub fn with_daemon<T>(mut self, daemon: T) -> Self
    where
        T: Daemon,
    {
        self.daemons.push((type_name::<T>(), Arc::new(daemon)));
        self
    }

    /// Overrides the grace period from config.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = Some(grace_period);
        self
    }

    pub fn len(&self) -> usize {
        self.daemons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.daemons.is_empty()
    }

    fn grace_period(&self, env: &Environment) -> Result<Duration, StdError> {
        if let Some(v) = self.grace_period {
            return Ok(v);
        }
        let config = env.config::<Option<DaemonsConfig>>(DaemonsConfig::key())?;
        Ok(config
            .and_then(|v| v.grace_period)
            .unwrap_or(DEFAULT_GRACE_PERIOD))
    }

    async fn shutdown(&self, env: &Environment) -> Result<(), StdError> {
        let Some(running) = self.running.lock().take() else {
            return Ok(());
        };
        let RunningDaemons {
            shutdown,
            mut tasks,
        } = running;
        let span = tracing::info_span!("daemons", set = %self.identifier);
        tracing::info!(parent: &span, "Daemons stopping");
        shutdown.cancel();
        let grace_period = self.grace_period(env)?;
        let mut errors = Vec::new();
        let joined = tokio::time::timeout(grace_period, async {
            while let Some(result) = tasks.join_next().await {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => errors.push(err),
                    Err(err) => errors.push(Box::new(err) as StdError),
                }
            }
        })
        .await;
        if joined.is_err() {
            tracing::warn!(
                parent: &span,
                remaining = tasks.len(),
                "Daemons did not stop in time, aborting"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
            errors.push(
                Error::new(ErrorKind::ForcedShutdown, "daemons did not stop in time")
                    .with_option("set", self.identifier.as_str())
                    .with_option("grace_period", format!("{grace_period:?}"))
                    .into(),
            );
        }
        tracing::info!(parent: &span, "Daemons stopped");
        match join_all(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Component for DaemonSet {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn init(&self, env: &Environment) -> Result<(), StdError> {
        let span = tracing::info_span!("daemons", set = %self.identifier);
        let shutdown = env.context().token().child_token();
        let mut tasks = JoinSet::new();
        tracing::info!(parent: &span, daemons = self.daemons.len(), "Daemons starting");
        for (name, daemon) in &self.daemons {
            let name = *name;
            let daemon = daemon.clone();
            let env = env.clone();
            let shutdown = shutdown.clone();
            tasks.spawn(async move {
                // Any finished daemon stops the others.
                defer! {
                    shutdown.cancel();
                };
                let result = daemon.run(&env, shutdown.child_token()).await;
                if let Err(err) = &result {
                    tracing::error!(daemon = name, "Daemon failed: {err}");
                }
                result
            });
        }
        *self.running.lock() = Some(RunningDaemons { shutdown, tasks });
        tracing::info!(parent: &span, "Daemons running");
        Ok(())
    }

    async fn stop(&self, env: &Environment, error: &mut Option<StdError>) {
        if let Err(err) = self.shutdown(env).await {
            *error = Some(join(error.take(), err));
        }
    }
}
