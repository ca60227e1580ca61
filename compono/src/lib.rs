//! # compono
//!
//! Application bootstrapping runtime: component graphs, a type-indexed
//! dependency container and a lifecycle driver that ties them together.
//!
//! ## Core Concepts
//!
//! - **Component**: Unit of functionality with an identifier, child components,
//!   dependency providers and `init`/`stop` hooks
//! - **Provider**: Ready value or factory function registered in the container
//! - **Container**: Type-indexed object graph with lazy construction,
//!   overrides, cycle detection and resource cleanup
//! - **DependencyInvoker**: Calls functions with arguments resolved by type
//! - **Application**: Entry point with an action, root components and config
//! - **Driver**: Runs an application from configuration to teardown
//!
//! ## Basic Usage
//!
//! ```rust
//! use compono::{
//!     Application, ApplicationMode, Component, Context, Driver, DriverOptions, Environment,
//!     Provider, StdError, async_trait,
//! };
//! use std::sync::Arc;
//!
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! struct GreeterComponent;
//!
//! #[async_trait]
//! impl Component for GreeterComponent {
//!     fn identifier(&self) -> &str {
//!         "greeter"
//!     }
//!
//!     fn dependencies(&self) -> Result<Vec<Provider>, StdError> {
//!         Ok(vec![Provider::factory(|| {
//!             Arc::new(Greeter {
//!                 greeting: "Hello".into(),
//!             })
//!         })])
//!     }
//! }
//!
//! struct HelloApp;
//!
//! impl Application for HelloApp {
//!     fn name(&self) -> &str {
//!         "hello"
//!     }
//!
//!     fn components(&self) -> Result<Vec<Arc<dyn Component>>, StdError> {
//!         Ok(vec![Arc::new(GreeterComponent)])
//!     }
//!
//!     async fn action(&self, env: &Environment, _args: &[String]) -> Result<i32, StdError> {
//!         let greeter = env.get::<Arc<Greeter>>()?;
//!         assert_eq!(greeter.greeting, "Hello");
//!         Ok(0)
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let driver = Driver::new(DriverOptions::default());
//!     let (code, error) = driver
//!         .run_application(&Context::new(), HelloApp, ApplicationMode::Production)
//!         .await;
//!     assert_eq!(code, 0);
//!     assert!(error.is_none());
//! }
//! ```
//!
//! ## Overrides
//!
//! Providers registered later replace earlier ones for the types they
//! produce. The application registers its providers after all components,
//! so it can substitute any component dependency:
//!
//! ```rust
//! use compono::{Container, Provider};
//! use std::sync::Arc;
//!
//! let container = Container::build(vec![
//!     Provider::value(Arc::new(String::from("component"))),
//!     Provider::value(Arc::new(String::from("application"))),
//! ])
//! .unwrap();
//! assert_eq!(*container.get::<Arc<String>>().unwrap(), "application");
//! ```

mod application;
mod component;
mod config;
mod container;
mod context;
mod defer;
mod driver;
mod environment;
mod error;
mod invoker;
mod provider;
mod recover;

pub use application::*;
pub use component::*;
pub use config::*;
pub use container::*;
pub use context::*;
pub use defer::*;
pub use driver::*;
pub use environment::*;
pub use error::*;
pub use invoker::*;
pub use provider::*;
pub use recover::*;

pub use async_trait::async_trait;

#[cfg(feature = "macros")]
pub use compono_macros::*;
