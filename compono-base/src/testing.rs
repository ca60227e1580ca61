use std::sync::Arc;

use compono::{
    Application, ApplicationIo, ApplicationMode, CloseFn, Component, Context, Driver,
    DriverOptions, Environment, StdError, catch, catch_future, join,
};

/// Builds the environment of `app` in test mode and initializes its
/// components.
///
/// The application streams are discarded. Use
/// [`create_test_environment_with`] to pass other driver options.
///
/// # Examples
///
/// ```rust
/// use compono::{ApplicationMode, QuickApplication, QuickComponent};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let app = QuickApplication::new("example")
///     .with_component(Arc::new(QuickComponent::new("component", "0.0.1")));
/// let (env, guard) = compono_base::create_test_environment(app).await.unwrap();
/// assert_eq!(env.application_mode(), ApplicationMode::Test);
/// guard.stop().await.unwrap();
/// # }
/// ```
pub async fn create_test_environment<A>(
    app: A,
) -> Result<(Environment, TestEnvironmentGuard), StdError>
where
    A: Application,
{
    create_test_environment_with(app, DriverOptions::default()).await
}

/// Same as [`create_test_environment`] with explicit driver options.
///
/// # Errors
///
/// Fails when the environment cannot be built or a component fails to
/// initialize. Components initialized before the failure are stopped.
pub async fn create_test_environment_with<A>(
    app: A,
    options: DriverOptions,
) -> Result<(Environment, TestEnvironmentGuard), StdError>
where
    A: Application,
{
    let io = options.io.unwrap_or_else(|| {
        Arc::new(ApplicationIo::new(
            std::io::empty(),
            std::io::sink(),
            std::io::sink(),
        ))
    });
    let driver = Driver::new(DriverOptions {
        io: Some(io),
        args: options.args,
    });
    let ctx = Context::new();
    let (env, close) = driver.create_environment(&ctx, app, ApplicationMode::Test)?;
    let mut guard = TestEnvironmentGuard {
        env: env.clone(),
        ctx,
        started: Vec::new(),
        close: Some(close),
    };
    for component in env.components() {
        match catch_future(component.init(&env)).await {
            Ok(Ok(())) => guard.started.push(component),
            Ok(Err(err)) | Err(err) => {
                tracing::warn!(
                    component = component.identifier(),
                    "Cannot initialize component: {err}"
                );
                return Err(match guard.stop().await {
                    Ok(()) => err,
                    Err(stop_err) => join(Some(err), stop_err),
                });
            }
        }
    }
    Ok((env, guard))
}

/// Started components of a test environment.
///
/// [`TestEnvironmentGuard::stop`] stops them. Dropping the guard without
/// stopping skips the components but still cancels the context and closes
/// the dependency container.
pub struct TestEnvironmentGuard {
    env: Environment,
    ctx: Context,
    started: Vec<Arc<dyn Component>>,
    close: Option<CloseFn>,
}

impl TestEnvironmentGuard {
    /// Stops the started components in reverse order, cancels the context
    /// and closes the dependency container.
    ///
    /// Stop errors, panics and close errors are joined into one error.
    pub async fn stop(mut self) -> Result<(), StdError> {
        let mut error = None;
        while let Some(component) = self.started.pop() {
            if let Err(err) = catch_future(component.stop(&self.env, &mut error)).await {
                error = Some(join(error.take(), err));
            }
        }
        self.ctx.cancel();
        tokio::task::yield_now().await;
        if let Some(close) = self.close.take() {
            match catch(close) {
                Ok(Ok(())) => {}
                Ok(Err(err)) | Err(err) => error = Some(join(error, err)),
            }
        }
        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for TestEnvironmentGuard {
    fn drop(&mut self) {
        if !self.started.is_empty() {
            tracing::warn!(
                components = self.started.len(),
                "Test environment dropped without stopping components"
            );
        }
        self.ctx.cancel();
    }
}
