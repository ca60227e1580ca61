use std::any::type_name;
use std::sync::{Arc, OnceLock};

use crate::{Container, Dependency, Error, ErrorKind, Invocable, StdError};

/// Calls functions and fills values using dependencies from the container.
///
/// The invoker is cheap to clone and is bound to the container of the
/// current run once it is registered. It is itself available as a
/// dependency, so factories and components can resolve values lazily.
///
/// # Examples
///
/// ```rust
/// use compono::{Container, DependencyInvoker, Provider};
/// use std::sync::Arc;
///
/// struct A {
///     x: i32,
/// }
///
/// struct B {
///     y: i32,
/// }
///
/// let container = Container::build(vec![
///     Provider::factory(|| Arc::new(A { x: 1 })),
///     Provider::factory(|a: Arc<A>| Arc::new(B { y: a.x * 10 })),
/// ])
/// .unwrap();
/// let invoker = DependencyInvoker::from_container(container);
///
/// let sum = invoker.invoke(|a: Arc<A>, b: Arc<B>| a.x + b.y).unwrap();
/// assert_eq!(sum, 11);
/// ```
#[derive(Clone, Default)]
pub struct DependencyInvoker {
    container: Arc<OnceLock<Arc<Container>>>,
}

impl Dependency for DependencyInvoker {}

impl DependencyInvoker {
    /// Creates an invoker that is not bound to any container yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an invoker bound to `container`.
    pub fn from_container(container: Arc<Container>) -> Self {
        let invoker = Self::new();
        invoker.bind(container);
        invoker
    }

    pub(crate) fn bind(&self, container: Arc<Container>) {
        if self.container.set(container).is_err() {
            tracing::warn!("Dependency invoker is already bound");
        }
    }

    fn container(&self) -> Result<&Arc<Container>, Error> {
        self.container.get().ok_or_else(|| {
            Error::new(
                ErrorKind::ContainerUnavailable,
                "dependency container is not initialized",
            )
        })
    }

    /// Calls `f` with arguments resolved by type and returns its output.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvokeFailed`] wrapping the resolution error when
    /// an argument cannot be resolved.
    pub fn invoke<Args, F>(&self, f: F) -> Result<F::Output, Error>
    where
        F: Invocable<Args>,
    {
        let container = self.container().map_err(invoke_error::<F>)?;
        let mut args = Vec::new();
        for input in F::inputs() {
            args.push(container.get_value(input).map_err(invoke_error::<F>)?);
        }
        <F as Invocable<Args>>::call(f, &args).map_err(invoke_error::<F>)
    }

    /// Calls a fallible `f` with arguments resolved by type.
    ///
    /// An error returned by `f` is wrapped as [`ErrorKind::InvokeFailed`].
    pub fn try_invoke<Args, F, T, E>(&self, f: F) -> Result<T, Error>
    where
        F: Invocable<Args, Output = Result<T, E>>,
        E: Into<StdError>,
    {
        self.invoke(f)?.map_err(|err| {
            Error::new(ErrorKind::InvokeFailed, "invoked function returned an error")
                .with_option("function", type_name::<F>())
                .with_source(err)
        })
    }

    /// Resolves a dependency of type `T`.
    pub fn get<T>(&self) -> Result<T, Error>
    where
        T: Dependency,
    {
        self.container()?.get::<T>()
    }

    /// Replaces `target` with the dependency of its type.
    pub fn populate<T>(&self, target: &mut T) -> Result<(), Error>
    where
        T: Dependency,
    {
        *target = self.get::<T>()?;
        Ok(())
    }

    /// Fills the injectable fields of `target`.
    ///
    /// Only fields marked with `#[compono(inject)]` are touched when the
    /// manifest is generated with `#[derive(Inject)]`.
    pub fn populate_fields<T>(&self, target: &mut T) -> Result<(), Error>
    where
        T: Inject,
    {
        target.inject(self)
    }

    #[doc(hidden)]
    pub fn inject_field<T>(&self, target: &'static str, field: &'static str) -> Result<T, Error>
    where
        T: Dependency,
    {
        self.get::<T>().map_err(|err| {
            Error::new(ErrorKind::InvokeFailed, "cannot inject field")
                .with_option("target", target)
                .with_option("field", field)
                .with_source(err)
        })
    }
}

fn invoke_error<F>(err: Error) -> Error {
    Error::new(ErrorKind::InvokeFailed, "cannot invoke function")
        .with_option("function", type_name::<F>())
        .with_source(err)
}

/// Injection manifest listing the fields filled by
/// [`DependencyInvoker::populate_fields`].
///
/// Usually generated with `#[derive(Inject)]`:
///
/// ```rust
/// use compono::Inject;
/// use std::sync::Arc;
///
/// struct Database;
///
/// #[derive(Default, Inject)]
/// struct Handler {
///     #[compono(inject)]
///     database: Option<Arc<Database>>,
///     requests: u64,
/// }
/// # let _ = Handler::default().requests;
/// ```
///
/// Fields of `Option<T>` type are filled with `Some(value)`.
pub trait Inject {
    fn inject(&mut self, invoker: &DependencyInvoker) -> Result<(), Error>;
}
