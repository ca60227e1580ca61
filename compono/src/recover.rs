use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt as _;
use parking_lot::Mutex;

use crate::{Error, ErrorKind, StdError};

/// Recovered panic value.
pub enum PanicPayload {
    /// Panic raised with a string message.
    Message(String),
    /// Panic raised with an error value.
    Error(StdError),
    /// Panic raised with a value of any other type.
    Unknown(Mutex<Box<dyn Any + Send>>),
}

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(v) => f.debug_tuple("Message").field(v).finish(),
            Self::Error(v) => f.debug_tuple("Error").field(v).finish(),
            Self::Unknown(_) => f.write_str("Unknown"),
        }
    }
}

/// Error created from a caught panic.
///
/// Carries the recovered payload and the backtrace captured at the point of
/// recovery. Classified as [`ErrorKind::PanicRecovered`] by [`crate::has_kind`].
#[derive(Debug)]
pub struct PanicError {
    payload: PanicPayload,
    backtrace: Backtrace,
}

impl PanicError {
    pub fn new(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<&'static str>() {
            Ok(v) => PanicPayload::Message((*v).to_owned()),
            Err(payload) => match payload.downcast::<String>() {
                Ok(v) => PanicPayload::Message(*v),
                Err(payload) => match payload.downcast::<StdError>() {
                    Ok(v) => PanicPayload::Error(*v),
                    Err(payload) => match payload.downcast::<Error>() {
                        Ok(v) => PanicPayload::Error(v),
                        Err(payload) => PanicPayload::Unknown(Mutex::new(payload)),
                    },
                },
            },
        };
        Self {
            payload,
            backtrace: Backtrace::force_capture(),
        }
    }

    pub fn payload(&self) -> &PanicPayload {
        &self.payload
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::PanicRecovered
    }

    /// Returns the panic message when the payload is a string.
    pub fn message(&self) -> Option<&str> {
        match &self.payload {
            PanicPayload::Message(v) => Some(v),
            _ => None,
        }
    }

    /// Takes the raw payload of a panic with an unknown value type.
    pub fn take_unknown(&self) -> Option<Box<dyn Any + Send>> {
        match &self.payload {
            PanicPayload::Unknown(v) => Some(std::mem::replace(&mut *v.lock(), Box::new(()))),
            _ => None,
        }
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            PanicPayload::Message(v) => write!(f, "panic occurred: {v}"),
            PanicPayload::Error(v) => write!(f, "panic occurred: {v}"),
            PanicPayload::Unknown(_) => f.write_str("panic occurred with unknown value"),
        }
    }
}

impl std::error::Error for PanicError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.payload {
            PanicPayload::Error(v) => Some(v.as_ref()),
            _ => None,
        }
    }
}

/// Converts a recovered panic into an error joined onto `prev`.
pub fn recover(payload: Box<dyn Any + Send>, prev: Option<StdError>) -> StdError {
    crate::join(prev, Box::new(PanicError::new(payload)))
}

/// Runs `f`, converting a panic into a [`PanicError`].
pub fn catch<F, R>(f: F) -> Result<R, StdError>
where
    F: FnOnce() -> R,
{
    std::panic::catch_unwind(AssertUnwindSafe(f)).map_err(|v| recover(v, None))
}

/// Awaits `future`, converting a panic into a [`PanicError`].
pub async fn catch_future<F>(future: F) -> Result<F::Output, StdError>
where
    F: Future,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|v| recover(v, None))
}
