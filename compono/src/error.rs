use std::borrow::Cow;
use std::fmt;

use crate::PanicError;

/// Type alias for boxed errors that can be sent across threads.
///
/// This is the error type accepted from user code everywhere in compono:
/// factories, component hooks, application actions and closers.
pub type StdError = Box<dyn std::error::Error + Send + Sync>;

/// Classification of errors produced by compono itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A component declares itself as its own descendant.
    CyclicComponentDependency,
    /// A component failed to enumerate its child components.
    ComponentChildEnumerationFailed,
    /// A factory requires, directly or transitively, its own output.
    CyclicContainerDependency,
    /// A factory input type is not provided by any registration.
    UndeclaredDependency,
    /// A provider has no outputs, duplicated outputs or an unknown closable type.
    InvalidProvidedType,
    /// An override provides fewer types than the registration it replaces.
    IncorrectRewrite,
    /// The requested type is not registered in the container.
    DependencyNotFound,
    /// A factory returned an error or panicked.
    ConstructorFailed,
    /// The container is not bound yet or was already closed.
    ContainerUnavailable,
    /// Components or the application failed to list their providers.
    DependenciesExtractionFailed,
    /// A function called through the invoker failed.
    InvokeFailed,
    /// The application failed to produce its configuration.
    ConfigInitFailed,
    /// The requested configuration key does not exist.
    ConfigValueNotFound,
    /// The configuration value could not be processed or converted.
    ConfigGetFailed,
    /// A context was replaced with one that does not derive from the current one.
    InvalidParentContext,
    /// A panic was caught and converted into an error.
    PanicRecovered,
    /// Background work did not stop within its grace period.
    ForcedShutdown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CyclicComponentDependency => "cyclic component dependency",
            Self::ComponentChildEnumerationFailed => "component child enumeration failed",
            Self::CyclicContainerDependency => "cyclic container dependency",
            Self::UndeclaredDependency => "undeclared dependency",
            Self::InvalidProvidedType => "invalid provided type",
            Self::IncorrectRewrite => "incorrect rewrite",
            Self::DependencyNotFound => "dependency not found",
            Self::ConstructorFailed => "constructor failed",
            Self::ContainerUnavailable => "container unavailable",
            Self::DependenciesExtractionFailed => "dependencies extraction failed",
            Self::InvokeFailed => "invoke failed",
            Self::ConfigInitFailed => "config init failed",
            Self::ConfigValueNotFound => "config value not found",
            Self::ConfigGetFailed => "config get failed",
            Self::InvalidParentContext => "invalid parent context",
            Self::PanicRecovered => "panic recovered",
            Self::ForcedShutdown => "forced shutdown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic value attached to an [`Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => f.write_str(v),
            Self::List(v) => f.write_str(&v.join(" -> ")),
        }
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Option key holding the cycle path of cyclic dependency errors.
pub const CYCLE_OPTION: &str = "cycle";

/// Error produced by the compono runtime.
///
/// Every error carries an [`ErrorKind`] for classification, a message, a list
/// of diagnostic options and an optional cause. Use [`has_kind`] to classify
/// errors that were wrapped or joined on their way up.
///
/// # Examples
///
/// ```rust
/// use compono::{Error, ErrorKind, has_kind};
///
/// let err = Error::new(ErrorKind::DependencyNotFound, "dependency not found")
///     .with_option("type", "alloc::sync::Arc<u32>");
/// assert_eq!(err.kind(), ErrorKind::DependencyNotFound);
/// assert!(has_kind(&err, ErrorKind::DependencyNotFound));
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    options: Vec<(&'static str, OptionValue)>,
    #[source]
    source: Option<StdError>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            options: Vec::new(),
            source: None,
        }
    }

    pub fn with_option(mut self, key: &'static str, value: impl Into<OptionValue>) -> Self {
        self.options.push((key, value.into()));
        self
    }

    pub fn with_source(mut self, source: impl Into<StdError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn options(&self) -> &[(&'static str, OptionValue)] {
        &self.options
    }

    /// Returns the first option with the given key.
    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        self.options
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Returns the reported cycle of a cyclic dependency error.
    pub fn cycle(&self) -> Option<&[String]> {
        match self.option(CYCLE_OPTION) {
            Some(OptionValue::List(v)) => Some(v),
            _ => None,
        }
    }
}

/// Several errors reported together.
///
/// Produced by [`join`] when errors accumulate on the teardown path.
#[derive(Debug, Default)]
pub struct JoinedError {
    errors: Vec<StdError>,
}

impl JoinedError {
    pub fn errors(&self) -> &[StdError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<StdError> {
        self.errors
    }
}

impl fmt::Display for JoinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for JoinedError {}

/// Joins `next` onto a previously accumulated error.
///
/// Nested joins are flattened so the result lists every error in the order
/// it happened.
pub fn join(prev: Option<StdError>, next: StdError) -> StdError {
    let Some(prev) = prev else {
        return next;
    };
    let mut errors = match prev.downcast::<JoinedError>() {
        Ok(joined) => joined.errors,
        Err(prev) => vec![prev],
    };
    match next.downcast::<JoinedError>() {
        Ok(joined) => errors.extend(joined.errors),
        Err(next) => errors.push(next),
    }
    Box::new(JoinedError { errors })
}

/// Joins all errors, returning `None` for an empty sequence.
pub fn join_all(errors: impl IntoIterator<Item = StdError>) -> Option<StdError> {
    errors
        .into_iter()
        .fold(None, |prev, next| Some(join(prev, next)))
}

fn walk<'a>(
    err: &'a (dyn std::error::Error + 'static),
    visit: &mut dyn FnMut(&'a (dyn std::error::Error + 'static)) -> bool,
) -> bool {
    if visit(err) {
        return true;
    }
    if let Some(joined) = err.downcast_ref::<JoinedError>() {
        return joined.errors.iter().any(|e| walk(e.as_ref(), visit));
    }
    match err.source() {
        Some(source) => walk(source, visit),
        None => false,
    }
}

/// Finds the first error of type `E` in the chain of causes and joins.
pub fn find<'a, E>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a E>
where
    E: std::error::Error + 'static,
{
    let mut found = None;
    walk(err, &mut |e| {
        found = e.downcast_ref::<E>();
        found.is_some()
    });
    found
}

/// Checks whether any error in the chain of causes and joins has the given kind.
pub fn has_kind(err: &(dyn std::error::Error + 'static), kind: ErrorKind) -> bool {
    walk(err, &mut |e| {
        if let Some(e) = e.downcast_ref::<Error>() {
            return e.kind() == kind;
        }
        kind == ErrorKind::PanicRecovered && e.is::<PanicError>()
    })
}
