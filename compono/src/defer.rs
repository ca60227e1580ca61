/// Scope guard running a closure when dropped.
///
/// Created by [`defer`]. The closure runs on every exit path of the scope,
/// including early returns and unwinding, unless the guard is cancelled.
#[must_use = "the closure runs as soon as the guard is dropped"]
pub struct Defer<F>
where
    F: FnOnce(),
{
    f: Option<F>,
}

impl<F> Defer<F>
where
    F: FnOnce(),
{
    /// Disarms the guard without running the closure.
    pub fn cancel(mut self) {
        self.f = None;
    }
}

impl<F> Drop for Defer<F>
where
    F: FnOnce(),
{
    fn drop(&mut self) {
        if let Some(f) = self.f.take() {
            f();
        }
    }
}

/// Returns a guard running `f` when dropped.
///
/// # Examples
///
/// ```rust
/// use compono::defer;
/// use std::cell::Cell;
///
/// let released = Cell::new(false);
/// {
///     let _guard = defer(|| released.set(true));
///     assert!(!released.get());
/// }
/// assert!(released.get());
///
/// let skipped = Cell::new(false);
/// defer(|| skipped.set(true)).cancel();
/// assert!(!skipped.get());
/// ```
pub fn defer<F>(f: F) -> Defer<F>
where
    F: FnOnce(),
{
    Defer { f: Some(f) }
}

/// Runs the given statements at the end of the enclosing scope.
#[macro_export]
macro_rules! defer {
    ($($body:tt)*) => {
        let _guard = $crate::defer(|| { $($body)* });
    };
}
