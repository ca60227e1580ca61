use std::str::FromStr as _;
use std::sync::Arc;

use async_trait::async_trait;
use compono::{Component, ConfigSection, Environment, Provider, StdError};
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{Registry, reload};

/// Component installing the global tracing subscriber.
///
/// Reads the `"tracing"` config section and registers a [`TracingHandle`]
/// dependency. Nothing is installed when the section is missing.
pub struct Tracing;

pub const TRACING_COMPONENT: &str = "compono-base.tracing";

#[async_trait]
impl Component for Tracing {
    fn identifier(&self) -> &str {
        TRACING_COMPONENT
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn dependencies(&self) -> Result<Vec<Provider>, StdError> {
        Ok(vec![Provider::factory(|env: Environment| {
            TracingHandle::install(&env)
        })])
    }
}

/// Handle to the filter of the installed tracing subscriber.
pub struct TracingHandle {
    directives: Vec<Directive>,
    level: Mutex<Option<tracing::Level>>,
    reload_handle: Option<reload::Handle<EnvFilter, Registry>>,
}

impl TracingHandle {
    fn install(env: &Environment) -> Result<Arc<Self>, StdError> {
        let Some(config) = env.config::<Option<TracingConfig>>(TracingConfig::key())? else {
            return Ok(Arc::new(Self {
                directives: Vec::new(),
                level: Mutex::new(None),
                reload_handle: None,
            }));
        };
        let mut directives = Vec::new();
        for directive in config.directives {
            directives.push(directive.parse::<Directive>()?);
        }
        let (env_filter, reload_handle) =
            reload::Layer::new(new_env_filter(&directives, config.level));
        if let Err(err) = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::Layer::default())
            .try_init()
        {
            tracing::debug!("Tracing subscriber is already installed: {err}");
        }
        Ok(Arc::new(Self {
            directives,
            level: Mutex::new(Some(config.level)),
            reload_handle: Some(reload_handle),
        }))
    }

    /// Returns the current level, `None` if no subscriber was installed.
    pub fn level(&self) -> Option<tracing::Level> {
        *self.level.lock()
    }

    /// Replaces the default level of the installed filter.
    pub fn set_level(&self, level: tracing::Level) -> Result<(), StdError> {
        let Some(reload_handle) = &self.reload_handle else {
            return Err("tracing subscriber is not installed".into());
        };
        reload_handle.reload(new_env_filter(&self.directives, level))?;
        *self.level.lock() = Some(level);
        tracing::info!(%level, "Tracing level changed");
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
pub struct TracingConfig {
    #[serde(
        serialize_with = "serialize_level",
        deserialize_with = "deserialize_level",
        default = "default_level"
    )]
    pub level: tracing::Level,
    #[serde(default)]
    pub directives: Vec<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directives: Default::default(),
        }
    }
}

impl ConfigSection for TracingConfig {
    fn key() -> &'static str {
        "tracing"
    }
}

fn new_env_filter(directives: &[Directive], level: tracing::Level) -> EnvFilter {
    let mut filter = EnvFilter::default();
    for directive in directives {
        filter = filter.add_directive(directive.clone());
    }
    filter.add_directive(level.into())
}

fn serialize_level<S>(v: &tracing::Level, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(v.as_str())
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<tracing::Level, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    String::deserialize(deserializer)
        .and_then(|v| tracing::Level::from_str(&v).map_err(|v| Error::custom(format!("{v}"))))
}

fn default_level() -> tracing::Level {
    tracing::Level::DEBUG
}
