//! # compono-base
//!
//! Building blocks for running compono applications as real processes.
//!
//! ## Core Components
//!
//! - **Runner**: Entry points running an application with the process
//!   arguments and rendering unhandled errors
//! - **Graceful Shutdown**: Component cancelling the run context on SIGINT
//!   or SIGTERM
//! - **Tracing**: Component installing a reloadable tracing subscriber from
//!   the `"tracing"` config section
//! - **Daemon Set**: Long-running background tasks with a bounded grace
//!   period on shutdown
//! - **Config Loading**: JSON config files with override layers and
//!   environment variable substitution
//! - **Testing**: Test environments with started components
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use compono::{ApplicationMode, Config, QuickApplication};
//! use compono_base::{GracefulShutdown, Tracing};
//! use std::process::ExitCode;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ExitCode {
//!     let app = QuickApplication::new("hello")
//!         .with_config(|_mode| Ok(Config::new().with("tracing", serde_json::json!({"level": "info"}))))
//!         .with_component(Arc::new(Tracing))
//!         .with_component(Arc::new(GracefulShutdown))
//!         .with_action(|env, _args| {
//!             tracing::info!(name = env.application_name(), "Hello");
//!             Ok(0)
//!         });
//!     compono_base::run(app, ApplicationMode::Production).await
//! }
//! ```

mod config;
mod daemon;
mod logging;
mod runner;
mod shutdown;
mod testing;

pub use config::*;
pub use daemon::*;
pub use logging::*;
pub use runner::*;
pub use shutdown::*;
pub use testing::*;
