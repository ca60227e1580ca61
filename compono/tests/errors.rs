use compono::{
    Error, ErrorKind, ExitError, JoinedError, OptionValue, PanicError, PanicPayload, StdError,
    catch, find, has_kind, join, join_all,
};

#[test]
fn test_error_options() {
    let err = Error::new(ErrorKind::DependencyNotFound, "dependency not found")
        .with_option("type", "Arc<Database>")
        .with_option("cycle", vec!["a".to_string(), "b".to_string()]);
    assert_eq!(err.to_string(), "dependency not found");
    assert_eq!(err.message(), "dependency not found");
    assert_eq!(err.options().len(), 2);
    assert_eq!(err.option("type"), Some(&OptionValue::from("Arc<Database>")));
    assert_eq!(err.cycle().unwrap(), ["a", "b"]);
    assert_eq!(err.option("cycle").unwrap().to_string(), "a -> b");
    assert!(err.option("missing").is_none());
}

#[test]
fn test_join_single() {
    let err = join(None, "first".into());
    assert!(err.downcast_ref::<JoinedError>().is_none());
    assert_eq!(err.to_string(), "first");
}

#[test]
fn test_join_flattens() {
    let first = join(Some("first".into()), "second".into());
    let nested = join(Some("third".into()), "fourth".into());
    let err = join(Some(first), nested);
    let joined = err.downcast_ref::<JoinedError>().unwrap();
    let messages: Vec<_> = joined.errors().iter().map(|v| v.to_string()).collect();
    assert_eq!(messages, ["first", "second", "third", "fourth"]);
    assert_eq!(err.to_string(), "first\nsecond\nthird\nfourth");
}

#[test]
fn test_join_all() {
    assert!(join_all(Vec::<StdError>::new()).is_none());
    let err = join_all(vec!["a".into(), "b".into()]).unwrap();
    let joined = err.downcast::<JoinedError>().unwrap();
    assert_eq!(joined.into_errors().len(), 2);
}

#[test]
fn test_has_kind_through_sources_and_joins() {
    let inner = Error::new(ErrorKind::UndeclaredDependency, "dependency is not declared");
    let outer = Error::new(ErrorKind::InvokeFailed, "cannot invoke function").with_source(inner);
    let err = join(Some("unrelated".into()), Box::new(outer));
    assert!(has_kind(err.as_ref(), ErrorKind::InvokeFailed));
    assert!(has_kind(err.as_ref(), ErrorKind::UndeclaredDependency));
    assert!(!has_kind(err.as_ref(), ErrorKind::ConstructorFailed));
}

#[test]
fn test_find() {
    let inner = Error::new(ErrorKind::ConfigValueNotFound, "config value not found");
    let err: StdError = Box::new(ExitError::new(2, inner));
    let found = find::<Error>(err.as_ref()).unwrap();
    assert_eq!(found.kind(), ErrorKind::ConfigValueNotFound);
    assert!(find::<JoinedError>(err.as_ref()).is_none());
}

#[test]
fn test_catch_panic() {
    let err = catch(|| -> i32 { panic!("boom") }).unwrap_err();
    assert!(has_kind(err.as_ref(), ErrorKind::PanicRecovered));
    let panic = err.downcast_ref::<PanicError>().unwrap();
    assert!(matches!(panic.payload(), PanicPayload::Message(v) if v == "boom"));
    assert_eq!(panic.message(), Some("boom"));
    assert_eq!(panic.kind(), ErrorKind::PanicRecovered);
    assert_eq!(err.to_string(), "panic occurred: boom");
}

#[test]
fn test_catch_formatted_panic() {
    let code = 7;
    let err = catch(|| -> i32 { panic!("failed with {code}") }).unwrap_err();
    let panic = err.downcast_ref::<PanicError>().unwrap();
    assert_eq!(panic.message(), Some("failed with 7"));
}

#[test]
fn test_catch_error_panic() {
    let err = catch(|| -> i32 {
        std::panic::panic_any(Error::new(ErrorKind::ForcedShutdown, "stopped"))
    })
    .unwrap_err();
    let panic = err.downcast_ref::<PanicError>().unwrap();
    assert!(matches!(panic.payload(), PanicPayload::Error(_)));
    assert!(has_kind(err.as_ref(), ErrorKind::ForcedShutdown));
    assert!(has_kind(err.as_ref(), ErrorKind::PanicRecovered));
}

#[test]
fn test_catch_unknown_panic() {
    let err = catch(|| -> i32 { std::panic::panic_any(42u8) }).unwrap_err();
    let panic = err.downcast_ref::<PanicError>().unwrap();
    assert!(panic.message().is_none());
    let payload = panic.take_unknown().unwrap();
    assert_eq!(payload.downcast_ref::<u8>(), Some(&42));
}

#[test]
fn test_catch_success() {
    assert_eq!(catch(|| 5).unwrap(), 5);
}

#[tokio::test]
async fn test_catch_future() {
    let value = compono::catch_future(async { 3 }).await.unwrap();
    assert_eq!(value, 3);

    let err = compono::catch_future(async {
        if value > 0 {
            panic!("async boom");
        }
        value
    })
    .await
    .unwrap_err();
    assert!(has_kind(err.as_ref(), ErrorKind::PanicRecovered));
}
