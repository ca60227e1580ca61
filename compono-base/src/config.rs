use std::path::Path;

use compono::{Config, Error, ErrorKind, StdError};
use regex::{Captures, Regex};
use serde_json::Value;

/// Pattern of `${ENV:NAME}` and `${ENV:NAME|default}` references.
const VARIABLE_PATTERN: &str = r"\$\{ENV:([a-zA-Z0-9_]+)(?:\|([a-zA-Z0-9_]+))?\}";

/// Reads a JSON config file and substitutes environment variables in it.
///
/// See [`process_variables`] for the substitution rules.
pub async fn load_config(path: impl AsRef<Path>) -> Result<Config, StdError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "Loading config");
    let text = tokio::fs::read_to_string(path).await?;
    let mut config = Config::parse(text)?;
    process_variables(&mut config)?;
    Ok(config)
}

/// Reads a JSON config file and merges override files on top of it in order.
///
/// # Examples
///
/// ```rust,no_run
/// # async fn example() -> Result<(), compono::StdError> {
/// let config =
///     compono_base::load_config_with_overrides("config.json", ["config.local.json"]).await?;
/// let port: u16 = config.get("server.port")?;
/// # Ok(())
/// # }
/// ```
pub async fn load_config_with_overrides<P, I>(path: P, overrides: I) -> Result<Config, StdError>
where
    P: AsRef<Path>,
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    let mut config = load_config(path).await?;
    for path in overrides {
        config.merge_from(load_config(path).await?);
    }
    Ok(config)
}

/// Replaces environment variable references in string values of `config`.
///
/// `${ENV:NAME}` is replaced with the value of `NAME`, and
/// `${ENV:NAME|default}` falls back to `default` when `NAME` is unset or
/// empty. Nested objects and arrays are processed as well.
///
/// # Errors
///
/// Returns [`ErrorKind::ConfigValueNotFound`] naming the variable and the
/// config key when a variable without a default is not set.
pub fn process_variables(config: &mut Config) -> Result<(), StdError> {
    substitute_variables(config, |name| std::env::var(name).ok())
}

/// Same as [`process_variables`] with variables read through `lookup`.
///
/// ```rust
/// use compono::Config;
///
/// let mut config = Config::new().with("url", "http://${ENV:HOST|localhost}:${ENV:PORT}");
/// compono_base::substitute_variables(&mut config, |name| {
///     (name == "PORT").then(|| "8080".to_owned())
/// })
/// .unwrap();
/// assert_eq!(config.get::<String>("url").unwrap(), "http://localhost:8080");
/// ```
pub fn substitute_variables<F>(config: &mut Config, lookup: F) -> Result<(), StdError>
where
    F: Fn(&str) -> Option<String>,
{
    let pattern = Regex::new(VARIABLE_PATTERN)?;
    for (key, value) in config.iter_mut() {
        substitute_value(&pattern, &lookup, key, value)?;
    }
    Ok(())
}

fn substitute_value<F>(
    pattern: &Regex,
    lookup: &F,
    key: &str,
    value: &mut Value,
) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(text) => {
            let mut missing = None;
            let replaced = pattern
                .replace_all(text, |caps: &Captures| {
                    if let Some(value) = lookup(&caps[1]).filter(|v| !v.is_empty()) {
                        return value;
                    }
                    match caps.get(2) {
                        Some(default) => default.as_str().to_owned(),
                        None => {
                            missing.get_or_insert_with(|| caps[1].to_owned());
                            caps[0].to_owned()
                        }
                    }
                })
                .into_owned();
            if let Some(variable) = missing {
                return Err(Error::new(
                    ErrorKind::ConfigValueNotFound,
                    "environment variable not found",
                )
                .with_option("variable", variable)
                .with_option("key", key));
            }
            *text = replaced;
        }
        Value::Object(values) => {
            for (name, value) in values.iter_mut() {
                substitute_value(pattern, lookup, &format!("{key}.{name}"), value)?;
            }
        }
        Value::Array(values) => {
            for value in values.iter_mut() {
                substitute_value(pattern, lookup, key, value)?;
            }
        }
        _ => {}
    }
    Ok(())
}
