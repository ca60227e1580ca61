use std::fmt;
use std::future::Future;
use std::io::{Read, Write};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};

use crate::{Component, Config, Environment, Provider, StdError};

/// Exit code of a successful run.
pub const SUCCESS_EXIT_CODE: i32 = 0;

/// Exit code of a failed run without an explicit code.
pub const ERROR_EXIT_CODE: i32 = 1;

/// Mode an application is started in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ApplicationMode {
    #[default]
    Production,
    Developer,
    Test,
    Custom(i32),
}

impl ApplicationMode {
    pub fn code(&self) -> i32 {
        match self {
            Self::Production => 0,
            Self::Developer => 1,
            Self::Test => 2,
            Self::Custom(v) => *v,
        }
    }
}

impl From<i32> for ApplicationMode {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::Production,
            1 => Self::Developer,
            2 => Self::Test,
            v => Self::Custom(v),
        }
    }
}

impl fmt::Display for ApplicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Developer => f.write_str("developer"),
            Self::Test => f.write_str("test"),
            Self::Custom(v) => write!(f, "custom({v})"),
        }
    }
}

/// Error returned from an application action to exit with a specific code.
///
/// # Examples
///
/// ```rust
/// use compono::{ExitError, StdError};
///
/// fn action() -> Result<i32, StdError> {
///     Err(ExitError::new(3, "bad input").into())
/// }
///
/// let err = action().unwrap_err();
/// assert_eq!(err.downcast_ref::<ExitError>().map(|v| v.code()), Some(3));
/// ```
#[derive(Debug, thiserror::Error)]
#[error("application exited with code {code}: {source}")]
pub struct ExitError {
    code: i32,
    source: StdError,
}

impl ExitError {
    pub fn new(code: i32, source: impl Into<StdError>) -> Self {
        Self {
            code,
            source: source.into(),
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }
}

pub(crate) fn exit_code_of(err: &StdError) -> i32 {
    err.downcast_ref::<ExitError>()
        .map(|v| v.code)
        .unwrap_or(ERROR_EXIT_CODE)
}

/// Input and output streams of an application.
pub struct ApplicationIo {
    input: Mutex<Box<dyn Read + Send>>,
    output: Mutex<Box<dyn Write + Send>>,
    error_output: Mutex<Box<dyn Write + Send>>,
}

impl ApplicationIo {
    pub fn new(
        input: impl Read + Send + 'static,
        output: impl Write + Send + 'static,
        error_output: impl Write + Send + 'static,
    ) -> Self {
        Self {
            input: Mutex::new(Box::new(input)),
            output: Mutex::new(Box::new(output)),
            error_output: Mutex::new(Box::new(error_output)),
        }
    }

    /// Streams bound to the process stdin, stdout and stderr.
    pub fn std() -> Self {
        Self::new(std::io::stdin(), std::io::stdout(), std::io::stderr())
    }

    pub fn input(&self) -> MutexGuard<'_, Box<dyn Read + Send>> {
        self.input.lock()
    }

    pub fn output(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.output.lock()
    }

    pub fn error_output(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.error_output.lock()
    }
}

impl Default for ApplicationIo {
    fn default() -> Self {
        Self::std()
    }
}

impl fmt::Debug for ApplicationIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationIo").finish_non_exhaustive()
    }
}

/// Application run by the [`crate::Driver`].
///
/// Only [`Application::name`] and [`Application::action`] are required. The
/// other hooks contribute components, providers and configuration, or
/// decide how a failed run is reported.
///
/// # Examples
///
/// ```rust
/// use compono::{Application, Environment, StdError};
/// use std::io::Write as _;
///
/// struct Hello;
///
/// impl Application for Hello {
///     fn name(&self) -> &str {
///         "hello"
///     }
///
///     async fn action(&self, env: &Environment, _args: &[String]) -> Result<i32, StdError> {
///         writeln!(env.io().output(), "Hello from {}", env.application_name())?;
///         Ok(0)
///     }
/// }
/// ```
pub trait Application: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Runs the application and returns its exit code.
    ///
    /// Returning an error exits with [`ERROR_EXIT_CODE`] unless the error is
    /// an [`ExitError`] carrying its own code.
    fn action(
        &self,
        env: &Environment,
        args: &[String],
    ) -> impl Future<Output = Result<i32, StdError>> + Send;

    /// Root components of the application.
    fn components(&self) -> Result<Vec<Arc<dyn Component>>, StdError> {
        Ok(Vec::new())
    }

    /// Providers registered after the providers of all components.
    fn dependencies(&self) -> Result<Vec<Provider>, StdError> {
        Ok(Vec::new())
    }

    /// Builds the configuration of a run.
    fn config_init(&self, _mode: ApplicationMode) -> Result<Config, StdError> {
        Ok(Config::new())
    }

    /// Receives the error of a failed run.
    ///
    /// The returned error is what the driver reports. Returning `None`
    /// suppresses it; the exit code still signals failure.
    fn handle_error(
        &self,
        error: StdError,
        _io: &ApplicationIo,
        _mode: ApplicationMode,
    ) -> Option<StdError> {
        Some(error)
    }
}

#[async_trait]
pub(crate) trait DynApplication: Send + Sync {
    fn name(&self) -> &str;

    async fn action(&self, env: &Environment, args: &[String]) -> Result<i32, StdError>;

    fn components(&self) -> Result<Vec<Arc<dyn Component>>, StdError>;

    fn dependencies(&self) -> Result<Vec<Provider>, StdError>;

    fn config_init(&self, mode: ApplicationMode) -> Result<Config, StdError>;

    fn handle_error(
        &self,
        error: StdError,
        io: &ApplicationIo,
        mode: ApplicationMode,
    ) -> Option<StdError>;
}

#[async_trait]
impl<T> DynApplication for T
where
    T: Application,
{
    fn name(&self) -> &str {
        T::name(self)
    }

    async fn action(&self, env: &Environment, args: &[String]) -> Result<i32, StdError> {
        T::action(self, env, args).await
    }

    fn components(&self) -> Result<Vec<Arc<dyn Component>>, StdError> {
        T::components(self)
    }

    fn dependencies(&self) -> Result<Vec<Provider>, StdError> {
        T::dependencies(self)
    }

    fn config_init(&self, mode: ApplicationMode) -> Result<Config, StdError> {
        T::config_init(self, mode)
    }

    fn handle_error(
        &self,
        error: StdError,
        io: &ApplicationIo,
        mode: ApplicationMode,
    ) -> Option<StdError> {
        T::handle_error(self, error, io, mode)
    }
}

type ActionFn = Box<dyn Fn(&Environment, &[String]) -> Result<i32, StdError> + Send + Sync>;
type DependenciesFn = Box<dyn Fn() -> Vec<Provider> + Send + Sync>;
type ConfigFn = Box<dyn Fn(ApplicationMode) -> Result<Config, StdError> + Send + Sync>;
type HandleErrorFn =
    Box<dyn Fn(StdError, &ApplicationIo, ApplicationMode) -> Option<StdError> + Send + Sync>;

/// Application assembled from closures.
///
/// Without an action the application fails with "no action" when run.
///
/// # Examples
///
/// ```rust
/// use compono::{ApplicationMode, Context, Driver, DriverOptions, QuickApplication};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let app = QuickApplication::new("example").with_action(|_env, args| Ok(args.len() as i32));
/// let driver = Driver::new(DriverOptions {
///     args: vec!["a".into(), "b".into()],
///     ..Default::default()
/// });
/// let (code, error) = driver
///     .run_application(&Context::new(), app, ApplicationMode::Test)
///     .await;
/// assert_eq!(code, 2);
/// assert!(error.is_none());
/// # }
/// ```
pub struct QuickApplication {
    name: String,
    components: Vec<Arc<dyn Component>>,
    dependencies: Vec<DependenciesFn>,
    config: Option<ConfigFn>,
    action: Option<ActionFn>,
    handle_error: Option<HandleErrorFn>,
}

impl QuickApplication {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
            dependencies: Vec::new(),
            config: None,
            action: None,
            handle_error: None,
        }
    }

    pub fn with_component(mut self, component: Arc<dyn Component>) -> Self {
        self.components.push(component);
        self
    }

    /// Adds providers built by `f` on every run.
    pub fn with_dependencies<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Vec<Provider> + Send + Sync + 'static,
    {
        self.dependencies.push(Box::new(f));
        self
    }

    pub fn with_config<F>(mut self, f: F) -> Self
    where
        F: Fn(ApplicationMode) -> Result<Config, StdError> + Send + Sync + 'static,
    {
        self.config = Some(Box::new(f));
        self
    }

    pub fn with_action<F>(mut self, f: F) -> Self
    where
        F: Fn(&Environment, &[String]) -> Result<i32, StdError> + Send + Sync + 'static,
    {
        self.action = Some(Box::new(f));
        self
    }

    pub fn with_error_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(StdError, &ApplicationIo, ApplicationMode) -> Option<StdError>
            + Send
            + Sync
            + 'static,
    {
        self.handle_error = Some(Box::new(f));
        self
    }
}

impl Application for QuickApplication {
    fn name(&self) -> &str {
        &self.name
    }

    async fn action(&self, env: &Environment, args: &[String]) -> Result<i32, StdError> {
        match &self.action {
            Some(f) => f(env, args),
            None => Err("there is no action in application".into()),
        }
    }

    fn components(&self) -> Result<Vec<Arc<dyn Component>>, StdError> {
        Ok(self.components.clone())
    }

    fn dependencies(&self) -> Result<Vec<Provider>, StdError> {
        Ok(self.dependencies.iter().flat_map(|f| f()).collect())
    }

    fn config_init(&self, mode: ApplicationMode) -> Result<Config, StdError> {
        match &self.config {
            Some(f) => f(mode),
            None => Ok(Config::new()),
        }
    }

    fn handle_error(
        &self,
        error: StdError,
        io: &ApplicationIo,
        mode: ApplicationMode,
    ) -> Option<StdError> {
        match &self.handle_error {
            Some(f) => f(error, io, mode),
            None => Some(error),
        }
    }
}
