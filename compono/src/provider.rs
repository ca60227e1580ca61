use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use crate::{Error, ErrorKind, StdError};

/// Type-erased value stored in the dependency container.
pub type DependencyValue = Arc<dyn Any + Send + Sync>;

/// Type name and type id of a dependency.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}

impl TypeInfo {
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// Marker for types that can be stored in the dependency container.
///
/// Dependencies are shared handles: every `Arc<T>` qualifies, including
/// trait objects such as `Arc<dyn Repository>` and function objects such as
/// `Arc<dyn Fn() -> u64 + Send + Sync>`. Runtime handles like
/// [`crate::Environment`] and [`crate::DependencyInvoker`] qualify as well.
pub trait Dependency: Clone + Send + Sync + 'static {}

impl<T> Dependency for Arc<T> where T: ?Sized + Send + Sync + 'static {}

/// Resource released when the container is closed.
///
/// Outputs marked with [`Provider::closable`] are closed in reverse
/// construction order by [`crate::Container::close_all`].
pub trait Close: Send + Sync {
    fn close(&self) -> Result<(), StdError>;
}

impl<T> Close for Arc<T>
where
    T: Close + ?Sized,
{
    fn close(&self) -> Result<(), StdError> {
        T::close(self)
    }
}

pub(crate) fn cast<T>(value: Option<&DependencyValue>) -> Result<T, Error>
where
    T: Dependency,
{
    value
        .and_then(|v| v.downcast_ref::<T>())
        .cloned()
        .ok_or_else(|| {
            Error::new(ErrorKind::DependencyNotFound, "dependency has unexpected type")
                .with_option("type", type_name::<T>())
        })
}

/// Values produced by a factory.
///
/// Implemented for a single `Arc<T>`, for tuples of dependencies and for
/// `Result` wrappers of both. A `Result` error is reported as a constructor
/// failure. `()` is accepted by the type system but rejected at registration
/// since it provides nothing.
pub trait FactoryOutput: 'static {
    /// Whether the factory reports construction errors.
    const FALLIBLE: bool = false;

    fn types() -> Vec<TypeInfo>;

    fn into_values(self) -> Result<Vec<DependencyValue>, StdError>;
}

impl FactoryOutput for () {
    fn types() -> Vec<TypeInfo> {
        Vec::new()
    }

    fn into_values(self) -> Result<Vec<DependencyValue>, StdError> {
        Ok(Vec::new())
    }
}

impl<E> FactoryOutput for Result<(), E>
where
    E: Into<StdError> + 'static,
{
    const FALLIBLE: bool = true;

    fn types() -> Vec<TypeInfo> {
        Vec::new()
    }

    fn into_values(self) -> Result<Vec<DependencyValue>, StdError> {
        self.map_err(Into::<StdError>::into)?;
        Ok(Vec::new())
    }
}

impl<T> FactoryOutput for Arc<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn types() -> Vec<TypeInfo> {
        vec![TypeInfo::of::<Self>()]
    }

    fn into_values(self) -> Result<Vec<DependencyValue>, StdError> {
        Ok(vec![Arc::new(self) as DependencyValue])
    }
}

impl<T, E> FactoryOutput for Result<Arc<T>, E>
where
    T: ?Sized + Send + Sync + 'static,
    E: Into<StdError> + 'static,
{
    const FALLIBLE: bool = true;

    fn types() -> Vec<TypeInfo> {
        vec![TypeInfo::of::<Arc<T>>()]
    }

    fn into_values(self) -> Result<Vec<DependencyValue>, StdError> {
        self.map_err(Into::<StdError>::into)?.into_values()
    }
}

macro_rules! impl_tuple_output {
    ($($ty:ident),+) => {
        impl<$($ty,)+> FactoryOutput for ($($ty,)+)
        where
            $($ty: Dependency,)+
        {
            fn types() -> Vec<TypeInfo> {
                vec![$(TypeInfo::of::<$ty>()),+]
            }

            #[allow(non_snake_case)]
            fn into_values(self) -> Result<Vec<DependencyValue>, StdError> {
                let ($($ty,)+) = self;
                Ok(vec![$(Arc::new($ty) as DependencyValue),+])
            }
        }

        impl<$($ty,)+ E> FactoryOutput for Result<($($ty,)+), E>
        where
            $($ty: Dependency,)+
            E: Into<StdError> + 'static,
        {
            const FALLIBLE: bool = true;

            fn types() -> Vec<TypeInfo> {
                <($($ty,)+) as FactoryOutput>::types()
            }

            fn into_values(self) -> Result<Vec<DependencyValue>, StdError> {
                self.map_err(Into::<StdError>::into)?.into_values()
            }
        }
    };
}

impl_tuple_output!(T1, T2);
impl_tuple_output!(T1, T2, T3);
impl_tuple_output!(T1, T2, T3, T4);
impl_tuple_output!(T1, T2, T3, T4, T5);
impl_tuple_output!(T1, T2, T3, T4, T5, T6);

/// Function usable as a dependency factory.
///
/// Implemented for closures and functions taking up to eight
/// [`Dependency`] arguments and returning a [`FactoryOutput`].
pub trait FactoryFn<Args>: Send + Sync + 'static {
    type Output: FactoryOutput;

    fn inputs() -> Vec<TypeInfo>;

    fn call(&self, args: &[DependencyValue]) -> Result<Vec<DependencyValue>, StdError>;
}

/// Function whose arguments can be resolved by the dependency invoker.
pub trait Invocable<Args>: Sized {
    type Output;

    fn inputs() -> Vec<TypeInfo>;

    fn call(self, args: &[DependencyValue]) -> Result<Self::Output, Error>;
}

macro_rules! impl_callables {
    ($($arg:ident),*) => {
        impl<Func, Out, $($arg,)*> FactoryFn<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> Out + Send + Sync + 'static,
            Out: FactoryOutput,
            $($arg: Dependency,)*
        {
            type Output = Out;

            fn inputs() -> Vec<TypeInfo> {
                vec![$(TypeInfo::of::<$arg>()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, args: &[DependencyValue]) -> Result<Vec<DependencyValue>, StdError> {
                let mut args = args.iter();
                $(let $arg = cast::<$arg>(args.next())?;)*
                (self)($($arg),*).into_values()
            }
        }

        impl<Func, Out, $($arg,)*> Invocable<($($arg,)*)> for Func
        where
            Func: FnOnce($($arg),*) -> Out,
            $($arg: Dependency,)*
        {
            type Output = Out;

            fn inputs() -> Vec<TypeInfo> {
                vec![$(TypeInfo::of::<$arg>()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(self, args: &[DependencyValue]) -> Result<Out, Error> {
                let mut args = args.iter();
                $(let $arg = cast::<$arg>(args.next())?;)*
                Ok((self)($($arg),*))
            }
        }
    };
}

impl_callables!();
impl_callables!(A1);
impl_callables!(A1, A2);
impl_callables!(A1, A2, A3);
impl_callables!(A1, A2, A3, A4);
impl_callables!(A1, A2, A3, A4, A5);
impl_callables!(A1, A2, A3, A4, A5, A6);
impl_callables!(A1, A2, A3, A4, A5, A6, A7);
impl_callables!(A1, A2, A3, A4, A5, A6, A7, A8);

pub(crate) type ErasedCall =
    Box<dyn Fn(&[DependencyValue]) -> Result<Vec<DependencyValue>, StdError> + Send + Sync>;

pub(crate) type Closer = fn(&DependencyValue) -> Result<(), StdError>;

fn close_value<T>(value: &DependencyValue) -> Result<(), StdError>
where
    T: Dependency + Close,
{
    match value.downcast_ref::<T>() {
        Some(v) => v.close(),
        None => Ok(()),
    }
}

/// Source of one or more dependencies registered in the container.
///
/// A provider is either a ready value or a factory function whose arguments
/// are resolved from the container. Later providers override earlier ones
/// for the types they produce.
///
/// # Examples
///
/// ```rust
/// use compono::Provider;
/// use std::sync::Arc;
///
/// struct Settings {
///     url: String,
/// }
///
/// struct Client {
///     settings: Arc<Settings>,
/// }
///
/// let providers = vec![
///     Provider::value(Arc::new(Settings { url: "db://local".into() })),
///     Provider::factory(|settings: Arc<Settings>| Arc::new(Client { settings })),
/// ];
/// assert_eq!(providers.len(), 2);
/// ```
pub struct Provider {
    pub(crate) name: &'static str,
    pub(crate) inputs: Vec<TypeInfo>,
    pub(crate) outputs: Vec<TypeInfo>,
    pub(crate) fallible: bool,
    pub(crate) call: ErasedCall,
    pub(crate) closers: Vec<(TypeInfo, Closer)>,
}

impl Provider {
    /// Registers a factory producing the values returned by `f`.
    pub fn factory<Args, F>(f: F) -> Self
    where
        Args: 'static,
        F: FactoryFn<Args>,
    {
        Self {
            name: type_name::<F>(),
            inputs: F::inputs(),
            outputs: <F::Output as FactoryOutput>::types(),
            fallible: <F::Output as FactoryOutput>::FALLIBLE,
            call: Box::new(move |args: &[DependencyValue]| {
                <F as FactoryFn<Args>>::call(&f, args)
            }),
            closers: Vec::new(),
        }
    }

    /// Registers a ready value.
    pub fn value<T>(value: T) -> Self
    where
        T: Dependency,
    {
        Self {
            name: type_name::<T>(),
            inputs: Vec::new(),
            outputs: vec![TypeInfo::of::<T>()],
            fallible: false,
            call: Box::new(move |_: &[DependencyValue]| {
                Ok(vec![Arc::new(value.clone()) as DependencyValue])
            }),
            closers: Vec::new(),
        }
    }

    /// Marks output `T` as a resource closed on container teardown.
    pub fn closable<T>(mut self) -> Self
    where
        T: Dependency + Close,
    {
        self.closers.push((TypeInfo::of::<T>(), close_value::<T>));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn inputs(&self) -> &[TypeInfo] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TypeInfo] {
        &self.outputs
    }

    pub fn is_fallible(&self) -> bool {
        self.fallible
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("fallible", &self.fallible)
            .finish()
    }
}
