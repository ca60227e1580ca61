use std::sync::Arc;

use tracing::Instrument as _;

use crate::application::{DynApplication, exit_code_of};
use crate::environment::EnvironmentParts;
use crate::{
    Application, ApplicationIo, ApplicationMode, ComponentProvider, Container, Context,
    DependencyInvoker, ERROR_EXIT_CODE, Environment, Error, ErrorKind, Provider,
    SUCCESS_EXIT_CODE, StdError, catch, catch_future, join, resolve_components,
};

/// Releases everything acquired while creating an environment.
///
/// Dropping it without a call releases the environment as well.
pub type CloseFn = Box<dyn FnOnce() -> Result<(), StdError> + Send + Sync>;

/// Options of a [`Driver`].
#[derive(Default)]
pub struct DriverOptions {
    /// Streams of the application, the process streams if unset.
    pub io: Option<Arc<ApplicationIo>>,
    /// Arguments passed to the application action.
    pub args: Vec<String>,
}

/// Runs applications through their whole lifecycle.
///
/// A run goes through the following stages:
///
/// 1. Build the configuration with [`Application::config_init`].
/// 2. Resolve the component trees of [`Application::components`].
/// 3. Register the providers of all components, then of the application,
///    then the runtime handles and the application itself, and construct
///    every dependency.
/// 4. Initialize components in order, stopping at the first failure.
/// 5. Run [`Application::action`] if all components started.
/// 6. Stop the started components in reverse order.
/// 7. Close the dependency container.
///
/// Errors and panics of every stage are caught and reported through
/// [`Application::handle_error`]; the run never panics.
pub struct Driver {
    io: Arc<ApplicationIo>,
    args: Vec<String>,
}

impl Default for Driver {
    fn default() -> Self {
        Self::new(DriverOptions::default())
    }
}

impl Driver {
    pub fn new(options: DriverOptions) -> Self {
        Self {
            io: options.io.unwrap_or_default(),
            args: options.args,
        }
    }

    /// Runs `app` and returns its exit code with the reported error.
    ///
    /// The run gets a child of `ctx` that is cancelled when the run is over.
    /// A failed run never exits with [`SUCCESS_EXIT_CODE`], even when the
    /// error handler suppresses the error.
    pub async fn run_application<A>(
        &self,
        ctx: &Context,
        app: A,
        mode: ApplicationMode,
    ) -> (i32, Option<StdError>)
    where
        A: Application,
    {
        let app = Arc::new(app);
        let handle = Provider::value(app.clone());
        let app: Arc<dyn DynApplication> = app;
        let span = tracing::info_span!("application", name = app.name(), %mode);
        self.run(ctx, app, handle, mode).instrument(span).await
    }

    async fn run(
        &self,
        ctx: &Context,
        app: Arc<dyn DynApplication>,
        handle: Provider,
        mode: ApplicationMode,
    ) -> (i32, Option<StdError>) {
        let ctx = ctx.child();
        tracing::info!("Running application");
        let (mut exit_code, error) =
            match catch_future(self.run_stages(&ctx, app.clone(), handle, mode)).await {
                Ok(v) => v,
                Err(err) => (ERROR_EXIT_CODE, Some(err)),
            };
        ctx.cancel();
        tokio::task::yield_now().await;
        let Some(error) = error else {
            tracing::info!(exit_code, "Application finished");
            return (exit_code, None);
        };
        tracing::warn!(exit_code, "Application finished with error: {error}");
        let error = match catch(|| app.handle_error(error, &self.io, mode)) {
            Ok(v) => v,
            Err(err) => Some(err),
        };
        if exit_code == SUCCESS_EXIT_CODE {
            exit_code = ERROR_EXIT_CODE;
        }
        (exit_code, error)
    }

    async fn run_stages(
        &self,
        ctx: &Context,
        app: Arc<dyn DynApplication>,
        handle: Provider,
        mode: ApplicationMode,
    ) -> (i32, Option<StdError>) {
        let (env, close) = match self.create_dyn_environment(ctx, app, handle, mode) {
            Ok(v) => v,
            Err(err) => return (ERROR_EXIT_CODE, Some(err)),
        };
        let (exit_code, mut error) = run_inside_environment(&env, &self.args).await;
        match catch(close) {
            Ok(Ok(())) => {}
            Ok(Err(err)) | Err(err) => error = Some(join(error, err)),
        }
        (exit_code, error)
    }

    /// Builds the environment of `app` without running its lifecycle.
    ///
    /// Every dependency is constructed before this returns. Calling or
    /// dropping the returned [`CloseFn`] closes the dependency container.
    pub fn create_environment<A>(
        &self,
        ctx: &Context,
        app: A,
        mode: ApplicationMode,
    ) -> Result<(Environment, CloseFn), StdError>
    where
        A: Application,
    {
        let app = Arc::new(app);
        let handle = Provider::value(app.clone());
        self.create_dyn_environment(ctx, app, handle, mode)
    }

    fn create_dyn_environment(
        &self,
        ctx: &Context,
        app: Arc<dyn DynApplication>,
        handle: Provider,
        mode: ApplicationMode,
    ) -> Result<(Environment, CloseFn), StdError> {
        tracing::debug!("Initializing config");
        let config = match catch(|| app.config_init(mode))? {
            Ok(v) => v,
            Err(err) => {
                return Err(Error::new(
                    ErrorKind::ConfigInitFailed,
                    "cannot initialize application config",
                )
                .with_source(err)
                .into());
            }
        };
        tracing::debug!("Resolving components");
        let components = catch(|| -> Result<_, StdError> {
            let roots = app.components().map_err(|err| {
                Error::new(
                    ErrorKind::ComponentChildEnumerationFailed,
                    "cannot get application components",
                )
                .with_option("application", app.name())
                .with_source(err)
            })?;
            Ok(resolve_components(roots)?)
        })??;
        for component in &components {
            tracing::debug!(
                component = component.identifier(),
                version = component.version(),
                "Component resolved"
            );
        }
        let invoker = DependencyInvoker::new();
        let env = Environment::new(EnvironmentParts {
            context: ctx.clone(),
            application: app.clone(),
            io: self.io.clone(),
            mode,
            config: Arc::new(config),
            components: ComponentProvider::new(components),
            invoker: invoker.clone(),
        });
        tracing::debug!("Constructing dependencies");
        let container = catch(|| -> Result<_, StdError> {
            let providers = extract_dependencies(&env, app.as_ref(), handle)?;
            let container = Arc::new(Container::new(providers)?);
            invoker.bind(container.clone());
            container.initialize()?;
            Ok(container)
        })??;
        let guard = ContainerGuard(container);
        let close: CloseFn = Box::new(move || guard.close());
        Ok((env, close))
    }
}

/// Closes the container when dropped.
///
/// The container holds the environment, which holds the container through
/// the invoker, so the container is never dropped on its own.
struct ContainerGuard(Arc<Container>);

impl ContainerGuard {
    fn close(self) -> Result<(), StdError> {
        self.0.close_all()
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if let Err(err) = self.0.close_all() {
            tracing::error!("Cannot close dependency container: {err}");
        }
    }
}

fn extract_dependencies(
    env: &Environment,
    app: &dyn DynApplication,
    handle: Provider,
) -> Result<Vec<Provider>, Error> {
    let mut providers = Vec::new();
    for component in env.components() {
        let dependencies = component.dependencies().map_err(|err| {
            Error::new(
                ErrorKind::DependenciesExtractionFailed,
                "cannot get component dependencies",
            )
            .with_option("component", component.identifier())
            .with_source(err)
        })?;
        providers.extend(dependencies);
    }
    let dependencies = app.dependencies().map_err(|err| {
        Error::new(
            ErrorKind::DependenciesExtractionFailed,
            "cannot get application dependencies",
        )
        .with_option("application", app.name())
        .with_source(err)
    })?;
    providers.extend(dependencies);
    providers.push(Provider::value(env.clone()));
    providers.push(Provider::value(env.dependency_invoker().clone()));
    providers.push(Provider::value(env.io().clone()));
    providers.push(Provider::value(env.config_provider().clone()));
    providers.push(handle);
    Ok(providers)
}

async fn run_inside_environment(env: &Environment, args: &[String]) -> (i32, Option<StdError>) {
    let mut started = Vec::new();
    let mut error = None;
    let mut exit_code = ERROR_EXIT_CODE;
    for component in env.components() {
        tracing::debug!(
            component = component.identifier(),
            version = component.version(),
            "Initializing component"
        );
        match catch_future(component.init(env)).await {
            Ok(Ok(())) => started.push(component),
            Ok(Err(err)) | Err(err) => {
                tracing::warn!(
                    component = component.identifier(),
                    "Cannot initialize component: {err}"
                );
                error = Some(err);
                break;
            }
        }
    }
    if error.is_none() {
        tracing::debug!("Running application action");
        match catch_future(env.application().action(env, args)).await {
            Ok(Ok(code)) => exit_code = code,
            Ok(Err(err)) | Err(err) => {
                exit_code = exit_code_of(&err);
                error = Some(err);
            }
        }
    }
    for component in started.iter().rev() {
        tracing::debug!(
            component = component.identifier(),
            version = component.version(),
            "Stopping component"
        );
        if let Err(err) = catch_future(component.stop(env, &mut error)).await {
            tracing::warn!(
                component = component.identifier(),
                "Component panicked while stopping: {err}"
            );
            error = Some(join(error.take(), err));
        }
    }
    (exit_code, error)
}
