use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{CYCLE_OPTION, Environment, Error, ErrorKind, Provider, StdError};

/// Unit of application functionality with its own lifecycle.
///
/// A component names itself with a unique identifier, lists the child
/// components it requires and the dependency providers it contributes.
/// Components are initialized in dependency order before the application
/// action runs and stopped in reverse order afterwards.
///
/// # Examples
///
/// ```rust
/// use compono::{Component, Environment, Provider, StdError, async_trait};
/// use std::sync::Arc;
///
/// struct Storage;
///
/// struct StorageComponent;
///
/// #[async_trait]
/// impl Component for StorageComponent {
///     fn identifier(&self) -> &str {
///         "storage"
///     }
///
///     fn dependencies(&self) -> Result<Vec<Provider>, StdError> {
///         Ok(vec![Provider::factory(|| Arc::new(Storage))])
///     }
///
///     async fn init(&self, env: &Environment) -> Result<(), StdError> {
///         let _storage = env.get::<Arc<Storage>>()?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Unique identifier of the component.
    ///
    /// Two declarations with the same identifier are the same component.
    fn identifier(&self) -> &str;

    fn version(&self) -> &str {
        ""
    }

    /// Child components this component requires.
    fn components(&self) -> Result<Vec<Arc<dyn Component>>, StdError> {
        Ok(Vec::new())
    }

    /// Dependency providers contributed by this component.
    fn dependencies(&self) -> Result<Vec<Provider>, StdError> {
        Ok(Vec::new())
    }

    /// Called before the application action.
    ///
    /// Children are always initialized before their parents.
    async fn init(&self, _env: &Environment) -> Result<(), StdError> {
        Ok(())
    }

    /// Called after the application action for every initialized component.
    ///
    /// `error` holds the error accumulated so far. A component may inspect,
    /// replace or clear it.
    async fn stop(&self, _env: &Environment, _error: &mut Option<StdError>) {}
}

impl fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("identifier", &self.identifier())
            .field("version", &self.version())
            .finish()
    }
}

struct StackItem {
    component: Arc<dyn Component>,
    parent: Option<usize>,
}

struct Resolved {
    component: Arc<dyn Component>,
    position: usize,
    children: Vec<String>,
}

/// Flattens component trees into initialization order.
///
/// Children come before their parents and every identifier appears once.
/// Trees are walked depth-first starting from the last root, and the first
/// declaration reached for an identifier wins: later roots override
/// earlier ones, and the children of an overridden declaration are dropped.
///
/// # Errors
///
/// * [`ErrorKind::CyclicComponentDependency`] if a component is its own
///   descendant. The reported cycle lists `identifier@version` entries and
///   starts and ends with the repeated identifier.
/// * [`ErrorKind::ComponentChildEnumerationFailed`] if a component cannot
///   list its children.
///
/// # Examples
///
/// ```rust
/// use compono::{QuickComponent, resolve_components};
/// use std::sync::Arc;
///
/// let database = QuickComponent::new("database", "1.0.0");
/// let server = QuickComponent::new("server", "1.0.0").with_component(Arc::new(database));
///
/// let components = resolve_components(vec![Arc::new(server)]).unwrap();
/// let identifiers: Vec<_> = components.iter().map(|v| v.identifier()).collect();
/// assert_eq!(identifiers, ["database", "server"]);
/// ```
pub fn resolve_components(roots: Vec<Arc<dyn Component>>) -> Result<Vec<Arc<dyn Component>>, Error> {
    let mut arena: Vec<StackItem> = roots
        .into_iter()
        .map(|component| StackItem {
            component,
            parent: None,
        })
        .collect();
    let mut stack: Vec<usize> = (0..arena.len()).collect();
    let mut resolved: HashMap<String, Resolved> = HashMap::new();
    let mut position = 0;
    while let Some(index) = stack.pop() {
        let current = position;
        position += 1;
        let component = arena[index].component.clone();
        let identifier = component.identifier().to_owned();
        if resolved.contains_key(&identifier) {
            if let Some(cycle) = find_cycle(&arena, index) {
                return Err(Error::new(
                    ErrorKind::CyclicComponentDependency,
                    "cyclic component dependency detected",
                )
                .with_option("component", identifier)
                .with_option(CYCLE_OPTION, cycle));
            }
            continue;
        }
        let children = component.components().map_err(|err| {
            Error::new(
                ErrorKind::ComponentChildEnumerationFailed,
                "cannot get child components",
            )
            .with_option("component", identifier.as_str())
            .with_source(err)
        })?;
        let mut child_ids = Vec::with_capacity(children.len());
        for child in children {
            child_ids.push(child.identifier().to_owned());
            arena.push(StackItem {
                component: child,
                parent: Some(index),
            });
            stack.push(arena.len() - 1);
        }
        resolved.insert(
            identifier,
            Resolved {
                component,
                position: current,
                children: child_ids,
            },
        );
    }
    Ok(sort_components(&resolved))
}

/// Returns the path from the first ancestor sharing the identifier of the
/// item down to the item, if such an ancestor exists.
fn find_cycle(arena: &[StackItem], index: usize) -> Option<Vec<String>> {
    let identifier = arena[index].component.identifier();
    let mut path = vec![describe(arena[index].component.as_ref())];
    let mut parent = arena[index].parent;
    while let Some(current) = parent {
        let component = &arena[current].component;
        path.push(describe(component.as_ref()));
        if component.identifier() == identifier {
            path.reverse();
            return Some(path);
        }
        parent = arena[current].parent;
    }
    None
}

fn describe(component: &dyn Component) -> String {
    format!("{}@{}", component.identifier(), component.version())
}

fn sort_components(resolved: &HashMap<String, Resolved>) -> Vec<Arc<dyn Component>> {
    let mut stack: Vec<(&str, &Resolved)> = resolved.iter().map(|(k, v)| (k.as_str(), v)).collect();
    stack.sort_by_key(|(_, v)| v.position);
    let mut visited = HashSet::new();
    let mut processed = HashSet::new();
    let mut components = Vec::with_capacity(resolved.len());
    while let Some(&(identifier, item)) = stack.last() {
        let mut pushed = false;
        for child in &item.children {
            if !visited.insert(child.as_str()) {
                continue;
            }
            if let Some(value) = resolved.get(child) {
                stack.push((child.as_str(), value));
                pushed = true;
            }
        }
        if pushed {
            continue;
        }
        stack.pop();
        if processed.insert(identifier) {
            components.push(item.component.clone());
        }
    }
    components
}

/// Read access to the resolved components of the current run.
#[derive(Clone, Default)]
pub struct ComponentProvider {
    components: Vec<Arc<dyn Component>>,
}

impl ComponentProvider {
    pub fn new(components: Vec<Arc<dyn Component>>) -> Self {
        Self { components }
    }

    /// Returns the components in initialization order.
    ///
    /// The returned list is a copy; modifying it does not affect the run.
    pub fn components(&self) -> Vec<Arc<dyn Component>> {
        self.components.clone()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

type DependenciesFn = Box<dyn Fn() -> Vec<Provider> + Send + Sync>;
type InitFn = Box<dyn Fn(&Environment) -> Result<(), StdError> + Send + Sync>;
type StopFn = Box<dyn Fn(&Environment, &mut Option<StdError>) + Send + Sync>;

/// Component assembled from closures.
///
/// Useful for small components and tests that do not need a dedicated type.
pub struct QuickComponent {
    identifier: String,
    version: String,
    components: Vec<Arc<dyn Component>>,
    dependencies: Vec<DependenciesFn>,
    init: Option<InitFn>,
    stop: Option<StopFn>,
}

impl QuickComponent {
    pub fn new(identifier: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            version: version.into(),
            components: Vec::new(),
            dependencies: Vec::new(),
            init: None,
            stop: None,
        }
    }

    /// Adds a child component.
    pub fn with_component(mut self, component: Arc<dyn Component>) -> Self {
        self.components.push(component);
        self
    }

    /// Adds providers built by `f` on every run.
    pub fn with_dependencies<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Vec<Provider> + Send + Sync + 'static,
    {
        self.dependencies.push(Box::new(f));
        self
    }

    pub fn on_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&Environment) -> Result<(), StdError> + Send + Sync + 'static,
    {
        self.init = Some(Box::new(f));
        self
    }

    pub fn on_stop<F>(mut self, f: F) -> Self
    where
        F: Fn(&Environment, &mut Option<StdError>) + Send + Sync + 'static,
    {
        self.stop = Some(Box::new(f));
        self
    }
}

#[async_trait]
impl Component for QuickComponent {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn components(&self) -> Result<Vec<Arc<dyn Component>>, StdError> {
        Ok(self.components.clone())
    }

    fn dependencies(&self) -> Result<Vec<Provider>, StdError> {
        Ok(self.dependencies.iter().flat_map(|f| f()).collect())
    }

    async fn init(&self, env: &Environment) -> Result<(), StdError> {
        match &self.init {
            Some(f) => f(env),
            None => Ok(()),
        }
    }

    async fn stop(&self, env: &Environment, error: &mut Option<StdError>) {
        if let Some(f) = &self.stop {
            f(env, error);
        }
    }
}
