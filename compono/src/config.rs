use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Error, ErrorKind, StdError};

/// Delimiter of nested configuration keys.
pub const CONFIG_KEY_DELIMITER: char = '.';

/// Application configuration as a tree of JSON values.
///
/// Keys can address nested values with dotted paths: `"server.port"`
/// resolves to `{"server": {"port": ...}}` unless a top-level key with the
/// exact name `"server.port"` exists.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub(crate) configs: BTreeMap<String, serde_json::Value>,
}

/// Configuration type bound to a fixed key.
///
/// Use `#[config_section("key")]` to implement it.
pub trait ConfigSection: DeserializeOwned {
    fn key() -> &'static str;
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserializes the value under `key`.
    ///
    /// A missing key deserializes from `null`, so optional values can be
    /// requested as `Option<T>`.
    pub fn get<T>(&self, key: impl AsRef<str>) -> Result<T, StdError>
    where
        T: DeserializeOwned,
    {
        Ok(serde_json::from_value(
            self.value(key.as_ref())
                .cloned()
                .unwrap_or(serde_json::Value::Null),
        )?)
    }

    /// Returns the raw value under `key`, following dotted paths.
    pub fn value(&self, key: &str) -> Option<&serde_json::Value> {
        if let Some(value) = self.configs.get(key) {
            return Some(value);
        }
        let mut parts = key.split(CONFIG_KEY_DELIMITER);
        let mut value = self.configs.get(parts.next()?)?;
        for part in parts {
            value = value.as_object()?.get(part)?;
        }
        Some(value)
    }

    pub fn set<T>(&mut self, key: impl Into<String>, value: T) -> Result<(), StdError>
    where
        T: Serialize,
    {
        self.configs.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Sets `key` to `value`, skipping values that cannot be serialized.
    pub fn with<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Serialize,
    {
        let key = key.into();
        if let Err(err) = self.set(key.as_str(), value) {
            tracing::warn!(key, "Cannot serialize config value: {err}");
        }
        self
    }

    /// Merges `other` into this config.
    ///
    /// Objects are merged recursively, arrays are concatenated and all other
    /// values are replaced.
    pub fn merge_from(&mut self, other: Self) {
        for (key, value) in other.configs {
            let entry = self.configs.entry(key);
            merge_json_from(entry.or_insert(serde_json::Value::Null), value);
        }
    }

    pub fn parse<T>(text: T) -> Result<Self, StdError>
    where
        T: AsRef<str>,
    {
        Ok(serde_json::from_str(text.as_ref())?)
    }

    /// Iterates over top-level entries with mutable access to their values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut serde_json::Value)> {
        self.configs.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }
}

impl FromIterator<(String, serde_json::Value)> for Config {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self {
            configs: iter.into_iter().collect(),
        }
    }
}

fn merge_json_from(lhs: &mut serde_json::Value, rhs: serde_json::Value) {
    match (lhs, rhs) {
        (serde_json::Value::Object(l), serde_json::Value::Object(r)) => {
            for (key, value) in r {
                let entry = l.entry(key);
                merge_json_from(entry.or_insert(serde_json::Value::Null), value);
            }
        }
        (serde_json::Value::Array(l), serde_json::Value::Array(r)) => l.extend(r),
        (lhs, rhs) => *lhs = rhs,
    }
}

/// Post-processing step applied to a configuration value.
///
/// The processor receives `None` when the key is missing and may supply a
/// default or fail.
pub trait Processor: Send + Sync {
    fn process(&self, value: Option<serde_json::Value>) -> Result<serde_json::Value, StdError>;
}

impl<F> Processor for F
where
    F: Fn(Option<serde_json::Value>) -> Result<serde_json::Value, StdError> + Send + Sync,
{
    fn process(&self, value: Option<serde_json::Value>) -> Result<serde_json::Value, StdError> {
        self(value)
    }
}

/// Read access to the configuration of the current run.
pub trait ConfigProvider: Send + Sync {
    /// Returns the value under `key`, passing it through `processor` if given.
    ///
    /// # Errors
    ///
    /// * [`ErrorKind::ConfigValueNotFound`] if the key is missing and no
    ///   processor is given.
    /// * [`ErrorKind::ConfigGetFailed`] if the processor fails.
    fn config_value(
        &self,
        key: &str,
        processor: Option<&dyn Processor>,
    ) -> Result<serde_json::Value, Error>;
}

impl ConfigProvider for Config {
    fn config_value(
        &self,
        key: &str,
        processor: Option<&dyn Processor>,
    ) -> Result<serde_json::Value, Error> {
        let value = self.value(key).cloned();
        let Some(processor) = processor else {
            return value.ok_or_else(|| {
                Error::new(ErrorKind::ConfigValueNotFound, "config value not found")
                    .with_option("key", key)
            });
        };
        processor.process(value).map_err(|err| {
            Error::new(ErrorKind::ConfigGetFailed, "cannot process config value")
                .with_option("key", key)
                .with_source(err)
        })
    }
}

/// Deserializes the value under `key` from `provider`.
///
/// A missing key deserializes from `null` when `T` allows it, so optional
/// values can be requested as `Option<T>`.
pub fn get_config<T>(provider: &dyn ConfigProvider, key: &str) -> Result<T, Error>
where
    T: DeserializeOwned,
{
    let value = match provider.config_value(key, None) {
        Ok(v) => v,
        Err(err) if err.kind() == ErrorKind::ConfigValueNotFound => {
            return serde_json::from_value(serde_json::Value::Null).map_err(|_| err);
        }
        Err(err) => return Err(err),
    };
    serde_json::from_value(value).map_err(|err| {
        Error::new(ErrorKind::ConfigGetFailed, "cannot convert config value")
            .with_option("key", key)
            .with_option("type", std::any::type_name::<T>())
            .with_source(err)
    })
}
