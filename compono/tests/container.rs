use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use compono::{
    Close, Container, ErrorKind, JoinedError, Provider, StdError, TypeInfo, has_kind,
};
use parking_lot::Mutex;

struct A {
    x: i32,
}

struct B {
    y: i32,
}

struct C;

#[test]
fn test_lazy_construction() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = Container::new(vec![
        Provider::factory({
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Arc::new(A { x: 1 })
            }
        }),
        Provider::factory(|a: Arc<A>| Arc::new(B { y: a.x * 10 })),
    ])
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(container.get::<Arc<B>>().unwrap().y, 10);
    assert_eq!(container.get::<Arc<A>>().unwrap().x, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_values_are_memoized() {
    let container = Container::build(vec![Provider::factory(|| Arc::new(A { x: 1 }))]).unwrap();
    let first = container.get::<Arc<A>>().unwrap();
    let second = container.get::<Arc<A>>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_concurrent_construction() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = Container::new(vec![Provider::factory({
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(100));
            Arc::new(A { x: 4 })
        }
    })])
    .unwrap();
    let (first, second) = std::thread::scope(|s| {
        let first = s.spawn(|| container.get::<Arc<A>>());
        let second = s.spawn(|| container.get::<Arc<A>>());
        (first.join().unwrap(), second.join().unwrap())
    });
    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.x, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_multiple_outputs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = Container::build(vec![Provider::factory({
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            (Arc::new(A { x: 2 }), Arc::new(B { y: 3 }))
        }
    })])
    .unwrap();
    assert_eq!(container.get::<Arc<A>>().unwrap().x, 2);
    assert_eq!(container.get::<Arc<B>>().unwrap().y, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_override() {
    let container = Container::build(vec![
        Provider::value(Arc::new(A { x: 1 })),
        Provider::value(Arc::new(A { x: 2 })),
        Provider::factory(|a: Arc<A>| Arc::new(B { y: a.x })),
    ])
    .unwrap();
    assert_eq!(container.get::<Arc<A>>().unwrap().x, 2);
    assert_eq!(container.get::<Arc<B>>().unwrap().y, 2);
}

#[test]
fn test_override_of_all_outputs() {
    let container = Container::build(vec![
        Provider::factory(|| (Arc::new(A { x: 1 }), Arc::new(B { y: 1 }))),
        Provider::value(Arc::new(A { x: 2 })),
        Provider::value(Arc::new(B { y: 2 })),
    ])
    .unwrap();
    assert_eq!(container.get::<Arc<A>>().unwrap().x, 2);
    assert_eq!(container.get::<Arc<B>>().unwrap().y, 2);
}

#[test]
fn test_override_with_superset() {
    let container = Container::build(vec![
        Provider::value(Arc::new(A { x: 1 })),
        Provider::factory(|| (Arc::new(A { x: 2 }), Arc::new(B { y: 2 }))),
    ])
    .unwrap();
    assert_eq!(container.get::<Arc<A>>().unwrap().x, 2);
    assert_eq!(container.get::<Arc<B>>().unwrap().y, 2);
}

#[test]
fn test_incorrect_rewrite() {
    let err = Container::new(vec![
        Provider::factory(|| (Arc::new(A { x: 1 }), Arc::new(B { y: 1 }))),
        Provider::value(Arc::new(A { x: 2 })),
    ])
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::IncorrectRewrite);
    assert!(err.option("type").unwrap().to_string().contains("B"));
}

#[test]
fn test_cyclic_dependency() {
    let container = Container::new(vec![
        Provider::factory(|_: Arc<B>| Arc::new(A { x: 1 })),
        Provider::factory(|_: Arc<A>| Arc::new(B { y: 1 })),
    ])
    .unwrap();
    let err = container.get::<Arc<A>>().err().unwrap();
    assert!(has_kind(&err, ErrorKind::CyclicContainerDependency));
    let cycle = err.cycle().unwrap();
    assert_eq!(cycle.len(), 3);
    assert_eq!(cycle[0], cycle[2]);
    assert!(cycle[0].contains("A"));
    assert!(cycle[1].contains("B"));
}

#[test]
fn test_self_dependency() {
    let err = Container::build(vec![Provider::factory(|a: Arc<A>| Arc::new(A { x: a.x }))])
        .err()
        .unwrap();
    assert!(has_kind(err.as_ref(), ErrorKind::CyclicContainerDependency));
}

#[test]
fn test_undeclared_dependency() {
    let container =
        Container::new(vec![Provider::factory(|_: Arc<C>| Arc::new(A { x: 1 }))]).unwrap();
    let err = container.get::<Arc<A>>().err().unwrap();
    assert_eq!(err.kind(), ErrorKind::UndeclaredDependency);
    assert!(err.option("type").unwrap().to_string().contains("C"));
}

#[test]
fn test_dependency_not_found() {
    let container = Container::new(vec![Provider::value(Arc::new(A { x: 1 }))]).unwrap();
    let err = container.get::<Arc<B>>().err().unwrap();
    assert_eq!(err.kind(), ErrorKind::DependencyNotFound);
    assert!(!container.contains::<Arc<B>>());
    assert!(container.contains::<Arc<A>>());
}

#[test]
fn test_empty_provider() {
    let err = Container::new(vec![Provider::factory(|| ())]).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidProvidedType);
}

#[test]
fn test_duplicated_output() {
    let err = Container::new(vec![Provider::factory(|| {
        (Arc::new(A { x: 1 }), Arc::new(A { x: 2 }))
    })])
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidProvidedType);
}

#[test]
fn test_closable_not_provided() {
    let err = Container::new(vec![
        Provider::value(Arc::new(A { x: 1 })).closable::<Arc<Resource>>(),
    ])
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidProvidedType);
}

#[test]
fn test_factory_error() {
    let container = Container::new(vec![Provider::factory(
        || -> Result<Arc<A>, StdError> { Err("no database".into()) },
    )])
    .unwrap();
    let err = container.get::<Arc<A>>().err().unwrap();
    assert_eq!(err.kind(), ErrorKind::ConstructorFailed);
    let source = std::error::Error::source(&err).unwrap();
    assert_eq!(source.to_string(), "no database");
}

#[test]
fn test_factory_panic() {
    let container = Container::new(vec![Provider::factory(|| -> Arc<A> {
        panic!("factory exploded")
    })])
    .unwrap();
    let err = container.get::<Arc<A>>().err().unwrap();
    assert_eq!(err.kind(), ErrorKind::ConstructorFailed);
    assert!(has_kind(&err, ErrorKind::PanicRecovered));
}

#[test]
fn test_failure_is_not_memoized_as_success() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let container = Container::new(vec![Provider::factory({
        let attempts = attempts.clone();
        move || -> Result<Arc<A>, StdError> {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("first attempt".into());
            }
            Ok(Arc::new(A { x: 5 }))
        }
    })])
    .unwrap();
    assert!(container.get::<Arc<A>>().is_err());
    assert_eq!(container.get::<Arc<A>>().unwrap().x, 5);
}

#[test]
fn test_get_value_by_type_info() {
    let container = Container::build(vec![Provider::value(Arc::new(A { x: 7 }))]).unwrap();
    let value = container.get_value(TypeInfo::of::<Arc<A>>()).unwrap();
    assert_eq!(value.downcast_ref::<Arc<A>>().unwrap().x, 7);
}

#[test]
fn test_trait_object_dependency() {
    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    let container = Container::build(vec![
        Provider::factory(|| Arc::new(English) as Arc<dyn Greeter>),
        Provider::factory(|greeter: Arc<dyn Greeter>| Arc::new(greeter.greet())),
    ])
    .unwrap();
    assert_eq!(*container.get::<Arc<String>>().unwrap(), "hello");
}

struct Resource {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
}

impl Close for Resource {
    fn close(&self) -> Result<(), StdError> {
        self.log.lock().push(self.name);
        if self.fail {
            return Err(format!("cannot close {}", self.name).into());
        }
        Ok(())
    }
}

struct Pool(Arc<Resource>);

struct Cache(Arc<Resource>);

fn resource(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str, fail: bool) -> Arc<Resource> {
    Arc::new(Resource {
        name,
        log: log.clone(),
        fail,
    })
}

#[test]
fn test_close_all() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let container = Container::build(vec![
        Provider::factory({
            let log = log.clone();
            move || Arc::new(Pool(resource(&log, "pool", false)))
        })
        .closable::<Arc<Pool>>(),
        Provider::factory({
            let log = log.clone();
            move |_: Arc<Pool>| Arc::new(Cache(resource(&log, "cache", false)))
        })
        .closable::<Arc<Cache>>(),
    ])
    .unwrap();
    container.close_all().unwrap();
    assert_eq!(*log.lock(), ["cache", "pool"]);

    container.close_all().unwrap();
    assert_eq!(log.lock().len(), 2);

    let err = container.get::<Arc<Pool>>().err().unwrap();
    assert_eq!(err.kind(), ErrorKind::ContainerUnavailable);
}

#[test]
fn test_close_errors_are_joined() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let container = Container::build(vec![
        Provider::factory({
            let log = log.clone();
            move || Arc::new(Pool(resource(&log, "pool", true)))
        })
        .closable::<Arc<Pool>>(),
        Provider::factory({
            let log = log.clone();
            move || Arc::new(Cache(resource(&log, "cache", true)))
        })
        .closable::<Arc<Cache>>(),
    ])
    .unwrap();
    let err = container.close_all().unwrap_err();
    let joined = err.downcast_ref::<JoinedError>().unwrap();
    assert_eq!(joined.errors().len(), 2);
    assert_eq!(joined.errors()[0].to_string(), "cannot close cache");
    assert_eq!(joined.errors()[1].to_string(), "cannot close pool");
}

#[test]
fn test_build_closes_on_failure() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let err = Container::build(vec![
        Provider::factory({
            let log = log.clone();
            move || Arc::new(Pool(resource(&log, "pool", false)))
        })
        .closable::<Arc<Pool>>(),
        Provider::factory(|_: Arc<Pool>| -> Result<Arc<A>, StdError> { Err("broken".into()) }),
    ])
    .err()
    .unwrap();
    assert!(has_kind(err.as_ref(), ErrorKind::ConstructorFailed));
    assert_eq!(*log.lock(), ["pool"]);
}

#[test]
fn test_drop_closes_resources() {
    let log = Arc::new(Mutex::new(Vec::new()));
    {
        let container = Container::build(vec![
            Provider::factory({
                let log = log.clone();
                move || Arc::new(Pool(resource(&log, "pool", false)))
            })
            .closable::<Arc<Pool>>(),
        ])
        .unwrap();
        assert_eq!(container.get::<Arc<Pool>>().unwrap().0.name, "pool");
    }
    assert_eq!(*log.lock(), ["pool"]);
}

impl Close for Pool {
    fn close(&self) -> Result<(), StdError> {
        self.0.close()
    }
}

impl Close for Cache {
    fn close(&self) -> Result<(), StdError> {
        self.0.close()
    }
}
