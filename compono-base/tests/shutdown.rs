use std::sync::Arc;
use std::time::Duration;

use compono::{ApplicationMode, Context, Driver, QuickApplication};
use compono_base::{GRACEFUL_SHUTDOWN_COMPONENT, GracefulShutdown, cancel_on_signal};
use parking_lot::Mutex;

#[tokio::test]
async fn test_graceful_shutdown_installs_child_context() {
    let parent = Context::new();
    let captured = Arc::new(Mutex::new(None));
    let app = QuickApplication::new("app")
        .with_component(Arc::new(GracefulShutdown))
        .with_action({
            let captured = captured.clone();
            move |env, _| {
                let identifiers: Vec<_> = env
                    .components()
                    .iter()
                    .map(|v| v.identifier().to_owned())
                    .collect();
                assert_eq!(identifiers, [GRACEFUL_SHUTDOWN_COMPONENT]);
                *captured.lock() = Some(env.context());
                Ok(0)
            }
        });
    let (code, error) = Driver::default()
        .run_application(&parent, app, ApplicationMode::Test)
        .await;
    assert!(error.is_none());
    assert_eq!(code, 0);
    let ctx = captured.lock().take().unwrap();
    assert!(ctx.is_derived_from(&parent));
    assert!(ctx.is_cancelled());
    assert!(!parent.is_cancelled());
}

#[tokio::test]
async fn test_cancel_on_signal_returns_on_cancel() {
    let ctx = Context::new();
    let listener = tokio::spawn(cancel_on_signal(ctx.clone()));
    tokio::time::sleep(Duration::from_millis(10)).await;
    ctx.cancel();
    tokio::time::timeout(Duration::from_secs(1), listener)
        .await
        .unwrap()
        .unwrap();
}
