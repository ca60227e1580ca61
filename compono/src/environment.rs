use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use crate::application::DynApplication;
use crate::{
    ApplicationIo, ApplicationMode, Component, ComponentProvider, ConfigProvider, ConfigSection,
    Context, Dependency, DependencyInvoker, Error, ErrorKind, get_config,
};

/// Runtime handle shared by everything that takes part in an application run.
///
/// The environment gives access to the run context, the application
/// identity, its streams, configuration, resolved components and
/// dependencies. It is cheap to clone and is registered as a dependency
/// itself.
///
/// # Examples
///
/// ```rust
/// use compono::{ApplicationMode, Context, Driver, DriverOptions, QuickApplication};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let app = QuickApplication::new("example")
///     .with_dependencies(|| vec![compono::Provider::value(Arc::new(42u32))])
///     .with_action(|env, _args| {
///         assert_eq!(env.application_name(), "example");
///         assert_eq!(*env.get::<Arc<u32>>()?, 42);
///         Ok(0)
///     });
/// let (code, _) = Driver::new(DriverOptions::default())
///     .run_application(&Context::new(), app, ApplicationMode::Test)
///     .await;
/// assert_eq!(code, 0);
/// # }
/// ```
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvironmentInner>,
}

struct EnvironmentInner {
    context: Mutex<Context>,
    application: Arc<dyn DynApplication>,
    io: Arc<ApplicationIo>,
    mode: ApplicationMode,
    config: Arc<dyn ConfigProvider>,
    components: ComponentProvider,
    invoker: DependencyInvoker,
}

impl Dependency for Environment {}

pub(crate) struct EnvironmentParts {
    pub context: Context,
    pub application: Arc<dyn DynApplication>,
    pub io: Arc<ApplicationIo>,
    pub mode: ApplicationMode,
    pub config: Arc<dyn ConfigProvider>,
    pub components: ComponentProvider,
    pub invoker: DependencyInvoker,
}

impl Environment {
    pub(crate) fn new(parts: EnvironmentParts) -> Self {
        Self {
            inner: Arc::new(EnvironmentInner {
                context: Mutex::new(parts.context),
                application: parts.application,
                io: parts.io,
                mode: parts.mode,
                config: parts.config,
                components: parts.components,
                invoker: parts.invoker,
            }),
        }
    }

    /// Returns the current context of the run.
    pub fn context(&self) -> Context {
        self.inner.context.lock().clone()
    }

    /// Replaces the context of the run.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidParentContext`] unless `context` is the
    /// current context or derives from it.
    pub fn set_context(&self, context: Context) -> Result<(), Error> {
        let mut current = self.inner.context.lock();
        if !context.is_derived_from(&current) {
            return Err(Error::new(
                ErrorKind::InvalidParentContext,
                "context does not derive from the current context",
            ));
        }
        *current = context;
        Ok(())
    }

    pub(crate) fn application(&self) -> &Arc<dyn DynApplication> {
        &self.inner.application
    }

    pub fn application_name(&self) -> &str {
        self.inner.application.name()
    }

    pub fn application_mode(&self) -> ApplicationMode {
        self.inner.mode
    }

    pub fn io(&self) -> &Arc<ApplicationIo> {
        &self.inner.io
    }

    pub fn config_provider(&self) -> &Arc<dyn ConfigProvider> {
        &self.inner.config
    }

    /// Deserializes the configuration value under `key`.
    pub fn config<T>(&self, key: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        get_config(self.inner.config.as_ref(), key)
    }

    /// Deserializes the configuration section `T`.
    pub fn config_section<T>(&self) -> Result<T, Error>
    where
        T: ConfigSection,
    {
        self.config(T::key())
    }

    /// Returns the resolved components in initialization order.
    pub fn components(&self) -> Vec<Arc<dyn Component>> {
        self.inner.components.components()
    }

    pub fn component_provider(&self) -> &ComponentProvider {
        &self.inner.components
    }

    pub fn dependency_invoker(&self) -> &DependencyInvoker {
        &self.inner.invoker
    }

    /// Resolves a dependency of type `T`.
    pub fn get<T>(&self) -> Result<T, Error>
    where
        T: Dependency,
    {
        self.inner.invoker.get()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("application", &self.application_name())
            .field("mode", &self.inner.mode)
            .finish_non_exhaustive()
    }
}
