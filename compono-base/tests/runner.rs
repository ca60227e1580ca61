use compono::{Error, ErrorKind, join};
use compono_base::render_error;

#[test]
fn test_render_plain_error() {
    let err: compono::StdError = "something went wrong".into();
    assert_eq!(
        render_error(err.as_ref()),
        "> An unhandled error has occurred in the application.\n\
         Details:\n\
         something went wrong\n"
    );
}

#[test]
fn test_render_options_and_causes() {
    let cause = Error::new(ErrorKind::DependencyNotFound, "dependency not found")
        .with_option("type", "Arc<Database>");
    let err = Error::new(ErrorKind::InvokeFailed, "cannot invoke function")
        .with_option("function", "handler")
        .with_source(cause);
    assert_eq!(
        render_error(&err),
        "> An unhandled error has occurred in the application.\n\
         Details:\n\
         cannot invoke function\n\
         caused by: dependency not found\n\
         Options:\n\
         1. function => handler\n\
         2. type => Arc<Database>\n"
    );
}

#[test]
fn test_render_joined_errors_with_duplicate_keys() {
    let first = Error::new(ErrorKind::ConstructorFailed, "cannot construct dependency")
        .with_option("type", "Arc<Pool>")
        .with_option("factory", "pool");
    let second = Error::new(ErrorKind::ContainerUnavailable, "dependency container is closed")
        .with_option("type", "Arc<Cache>");
    let err = join(Some(Box::new(first)), Box::new(second));
    assert_eq!(
        render_error(err.as_ref()),
        "> An unhandled error has occurred in the application.\n\
         Details:\n\
         [1]\n  cannot construct dependency\n\
         [2]\n  dependency container is closed\n\
         Options:\n\
         1. type (1) => Arc<Pool>\n\
         2. factory (0) => pool\n\
         3. type (0) => Arc<Cache>\n"
    );
}

#[test]
fn test_render_cycle() {
    let cycle = vec!["a@1".to_string(), "b@1".to_string(), "a@1".to_string()];
    let err = Error::new(
        ErrorKind::CyclicComponentDependency,
        "cyclic component dependency detected",
    )
    .with_option("cycle", cycle);
    assert!(render_error(&err).ends_with("Options:\n1. cycle => a@1 -> b@1 -> a@1\n"));
}
