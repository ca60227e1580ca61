use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Cancellable context of an application run.
///
/// Contexts form a tree: cancelling a context cancels all of its children.
/// Each context remembers its lineage so replacements can be checked
/// structurally with [`Context::is_derived_from`].
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    node: Arc<ContextNode>,
}

#[derive(Debug, Default)]
struct ContextNode {
    parent: Option<Arc<ContextNode>>,
}

impl Context {
    /// Creates a new root context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child context cancelled together with this one.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            node: Arc::new(ContextNode {
                parent: Some(self.node.clone()),
            }),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits until the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Returns the underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Checks whether this context is `other` or one of its descendants.
    pub fn is_derived_from(&self, other: &Context) -> bool {
        let mut node = Some(&self.node);
        while let Some(current) = node {
            if Arc::ptr_eq(current, &other.node) {
                return true;
            }
            node = current.parent.as_ref();
        }
        false
    }
}
