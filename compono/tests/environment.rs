use std::sync::Arc;

use compono::{
    Application, ApplicationIo, ApplicationMode, CloseFn, Config, ConfigProvider, Context,
    DependencyInvoker, Driver, Environment, ErrorKind, QuickApplication, QuickComponent,
    config_section,
};
use serde::Deserialize;

fn environment(app: QuickApplication) -> (Environment, Context, CloseFn) {
    let ctx = Context::new();
    let (env, close) = Driver::default()
        .create_environment(&ctx, app, ApplicationMode::Test)
        .unwrap();
    (env, ctx, close)
}

#[test]
fn test_set_derived_context() {
    let (env, ctx, _close) = environment(QuickApplication::new("app"));
    let child = env.context().child();
    env.set_context(child.clone()).unwrap();
    assert!(env.context().is_derived_from(&child));
    assert!(env.context().is_derived_from(&ctx));

    env.set_context(env.context()).unwrap();
    assert!(env.context().is_derived_from(&child));
}

#[test]
fn test_set_unrelated_context() {
    let (env, _, _close) = environment(QuickApplication::new("app"));
    let err = env.set_context(Context::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParentContext);
}

#[test]
fn test_set_parent_context() {
    let (env, ctx, _close) = environment(QuickApplication::new("app"));
    let child = env.context().child();
    env.set_context(child).unwrap();
    let err = env.set_context(ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParentContext);
}

#[test]
fn test_context_cancellation_propagates() {
    let (env, ctx, _close) = environment(QuickApplication::new("app"));
    env.set_context(env.context().child()).unwrap();
    assert!(!env.context().is_cancelled());
    ctx.cancel();
    assert!(env.context().is_cancelled());
}

#[config_section("server")]
#[derive(Deserialize)]
struct ServerConfig {
    host: String,
    port: u16,
}

fn configured() -> (Environment, CloseFn) {
    let app = QuickApplication::new("app").with_config(|_| {
        Ok(Config::new().with(
            "server",
            serde_json::json!({"host": "localhost", "port": 8080}),
        ))
    });
    let (env, _, close) = environment(app);
    (env, close)
}

#[test]
fn test_config() {
    let (env, _close) = configured();
    assert_eq!(env.config::<u16>("server.port").unwrap(), 8080);
    assert_eq!(env.config::<Option<String>>("missing").unwrap(), None);

    let err = env.config::<u16>("missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigValueNotFound);

    let err = env.config::<u16>("server.host").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigGetFailed);
}

#[test]
fn test_config_section() {
    let (env, _close) = configured();
    let server = env.config_section::<ServerConfig>().unwrap();
    assert_eq!(server.host, "localhost");
    assert_eq!(server.port, 8080);
}

#[test]
fn test_runtime_dependencies() {
    let (env, _close) = configured();
    let registered = env.get::<Environment>().unwrap();
    assert_eq!(registered.application_name(), "app");
    assert!(Arc::ptr_eq(
        &env.get::<Arc<ApplicationIo>>().unwrap(),
        env.io()
    ));
    assert!(Arc::ptr_eq(
        &env.get::<Arc<dyn ConfigProvider>>().unwrap(),
        env.config_provider()
    ));

    let invoker = env.get::<DependencyInvoker>().unwrap();
    let port = invoker
        .invoke(|config: Arc<dyn ConfigProvider>| config.config_value("server.port", None))
        .unwrap()
        .unwrap();
    assert_eq!(port, 8080);

    let app = env.get::<Arc<QuickApplication>>().unwrap();
    assert_eq!(app.name(), "app");
}

#[test]
fn test_components() {
    let child = QuickComponent::new("child", "0.0.1");
    let parent = QuickComponent::new("parent", "0.0.1").with_component(Arc::new(child));
    let app = QuickApplication::new("app").with_component(Arc::new(parent));
    let (env, _, _close) = environment(app);
    let identifiers: Vec<_> = env
        .components()
        .iter()
        .map(|v| v.identifier().to_owned())
        .collect();
    assert_eq!(identifiers, ["child", "parent"]);
    assert_eq!(env.component_provider().len(), 2);
}
