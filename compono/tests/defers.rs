use compono::{catch, defer};
use std::sync::{Arc, Mutex};

#[test]
fn test_defer_runs_at_scope_end() {
    let executed = Arc::new(Mutex::new(false));
    let executed_clone = executed.clone();

    {
        let _guard = defer(move || {
            *executed_clone.lock().unwrap() = true;
        });
        assert!(!*executed.lock().unwrap());
    }

    assert!(*executed.lock().unwrap());
}

#[test]
fn test_defer_macro_statements() {
    let values = Arc::new(Mutex::new(Vec::new()));
    let values_clone = values.clone();

    {
        defer! {
            let mut guard = values_clone.lock().unwrap();
            guard.push(1);
            guard.push(2);
        };
        assert!(values.lock().unwrap().is_empty());
    }

    assert_eq!(*values.lock().unwrap(), vec![1, 2]);
}

#[test]
fn test_defer_macro_single_expression() {
    let counter = Arc::new(Mutex::new(0));
    let counter_clone = counter.clone();

    {
        defer!(*counter_clone.lock().unwrap() += 1);
        assert_eq!(*counter.lock().unwrap(), 0);
    }

    assert_eq!(*counter.lock().unwrap(), 1);
}

#[test]
fn test_defers_run_in_reverse_order() {
    let order = Arc::new(Mutex::new(Vec::new()));

    {
        let order1 = order.clone();
        let order2 = order.clone();
        let _first = defer(move || order1.lock().unwrap().push("first"));
        let _second = defer(move || order2.lock().unwrap().push("second"));
    }

    assert_eq!(*order.lock().unwrap(), vec!["second", "first"]);
}

#[test]
fn test_defer_runs_on_panic() {
    let executed = Arc::new(Mutex::new(false));
    let executed_clone = executed.clone();

    let result = catch(move || -> i32 {
        let _guard = defer(move || {
            *executed_clone.lock().unwrap() = true;
        });
        panic!("boom")
    });

    assert!(result.is_err());
    assert!(*executed.lock().unwrap());
}

#[test]
fn test_defer_explicit_drop() {
    let executed = Arc::new(Mutex::new(false));
    let executed_clone = executed.clone();

    let guard = defer(move || {
        *executed_clone.lock().unwrap() = true;
    });
    assert!(!*executed.lock().unwrap());

    drop(guard);
    assert!(*executed.lock().unwrap());
}

#[test]
fn test_defer_cancel() {
    let executed = Arc::new(Mutex::new(false));
    let executed_clone = executed.clone();

    let guard = defer(move || {
        *executed_clone.lock().unwrap() = true;
    });
    guard.cancel();

    assert!(!*executed.lock().unwrap());
}
