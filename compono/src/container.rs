use std::any::TypeId;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, ReentrantMutex};

use crate::provider::{Closer, ErasedCall, cast};
use crate::{
    CYCLE_OPTION, Dependency, DependencyValue, Error, ErrorKind, Provider, StdError, TypeInfo,
    catch, defer, join_all,
};

/// Type-indexed object graph built from a list of providers.
///
/// Every type maps to exactly one node. Values are constructed on first
/// request and memoized; [`Container::resolve_all`] constructs everything
/// up front in registration order. Resources marked closable are released
/// by [`Container::close_all`] in reverse construction order.
///
/// Construction is serialized: a thread requesting a value while another
/// thread is constructing waits for it to finish. Factories may resolve
/// further values from the same thread.
///
/// # Examples
///
/// ```rust
/// use compono::{Container, Provider};
/// use std::sync::Arc;
///
/// struct A {
///     x: i32,
/// }
///
/// struct B {
///     y: i32,
/// }
///
/// let container = Container::build(vec![
///     Provider::factory(|| Arc::new(A { x: 1 })),
///     Provider::factory(|a: Arc<A>| Arc::new(B { y: a.x * 10 })),
/// ])
/// .unwrap();
///
/// let b = container.get::<Arc<B>>().unwrap();
/// assert_eq!(b.y, 10);
/// container.close_all().unwrap();
/// ```
pub struct Container {
    nodes: HashMap<TypeId, Arc<Node>>,
    order: Vec<Arc<Node>>,
    resolving: ReentrantMutex<()>,
    stack: Mutex<Vec<TypeInfo>>,
    resources: Mutex<Option<Vec<Resource>>>,
}

struct Node {
    info: TypeInfo,
    position: usize,
    slot: usize,
    state: Mutex<NodeState>,
}

enum NodeState {
    Pending(Arc<Factory>),
    Ready(DependencyValue),
    Released,
}

struct Factory {
    name: &'static str,
    inputs: Vec<TypeInfo>,
    outputs: Vec<TypeInfo>,
    call: ErasedCall,
    closers: Vec<(TypeInfo, Closer)>,
    locked: AtomicBool,
}

impl Factory {
    fn closer(&self, info: &TypeInfo) -> Option<Closer> {
        self.closers
            .iter()
            .find(|(v, _)| v == info)
            .map(|(_, v)| *v)
    }
}

struct Resource {
    info: TypeInfo,
    value: DependencyValue,
    close: Closer,
}

impl Node {
    fn value(&self, requested: TypeInfo) -> Result<DependencyValue, Error> {
        match &*self.state.lock() {
            NodeState::Ready(v) => Ok(v.clone()),
            NodeState::Pending(factory) => Err(Error::new(
                ErrorKind::ConstructorFailed,
                "dependency is not constructed",
            )
            .with_option("factory", factory.name)
            .with_option("type", requested.type_name)),
            NodeState::Released => Err(unavailable(requested)),
        }
    }
}

fn unavailable(requested: TypeInfo) -> Error {
    Error::new(
        ErrorKind::ContainerUnavailable,
        "dependency container is closed",
    )
    .with_option("type", requested.type_name)
}

impl Container {
    /// Registers providers and validates overrides without constructing anything.
    ///
    /// # Errors
    ///
    /// * [`ErrorKind::InvalidProvidedType`] if a provider produces no types,
    ///   produces a type twice or marks a type it does not produce as closable.
    /// * [`ErrorKind::IncorrectRewrite`] if an override leaves part of the
    ///   registration it replaces alive.
    pub fn new(providers: Vec<Provider>) -> Result<Self, Error> {
        let mut nodes: HashMap<TypeId, Arc<Node>> = HashMap::new();
        let mut rewrites = BTreeSet::new();
        for (position, provider) in providers.into_iter().enumerate() {
            validate_provider(&provider)?;
            let factory = Arc::new(Factory {
                name: provider.name,
                inputs: provider.inputs,
                outputs: provider.outputs,
                call: provider.call,
                closers: provider.closers,
                locked: AtomicBool::new(false),
            });
            for (slot, info) in factory.outputs.iter().enumerate() {
                let node = Arc::new(Node {
                    info: *info,
                    position,
                    slot,
                    state: Mutex::new(NodeState::Pending(factory.clone())),
                });
                if let Some(prev) = nodes.insert(info.type_id, node) {
                    rewrites.insert(prev.position);
                }
            }
        }
        let mut order: Vec<_> = nodes.values().cloned().collect();
        order.sort_by_key(|v| (v.position, v.slot));
        for node in &order {
            if rewrites.contains(&node.position) {
                let factory = match &*node.state.lock() {
                    NodeState::Pending(v) => v.name,
                    _ => node.info.type_name,
                };
                return Err(Error::new(
                    ErrorKind::IncorrectRewrite,
                    "overriding provider does not replace all types of the overridden one",
                )
                .with_option("type", node.info.type_name)
                .with_option("factory", factory));
            }
        }
        tracing::debug!(dependencies = order.len(), "Dependency container registered");
        Ok(Self {
            nodes,
            order,
            resolving: ReentrantMutex::new(()),
            stack: Mutex::new(Vec::new()),
            resources: Mutex::new(Some(Vec::new())),
        })
    }

    /// Registers providers and constructs every value.
    ///
    /// Resources constructed before a failure are closed before the error is
    /// returned.
    pub fn build(providers: Vec<Provider>) -> Result<Arc<Self>, StdError> {
        let container = Arc::new(Self::new(providers)?);
        container.initialize()?;
        Ok(container)
    }

    /// Constructs every value, closing constructed resources on failure.
    pub fn initialize(&self) -> Result<(), StdError> {
        let Err(err) = self.resolve_all() else {
            return Ok(());
        };
        match self.close_all() {
            Ok(()) => Err(Box::new(err)),
            Err(close_err) => Err(crate::join(Some(Box::new(err)), close_err)),
        }
    }

    /// Constructs every registered value in registration order.
    pub fn resolve_all(&self) -> Result<(), Error> {
        let _resolving = self.resolving.lock();
        for node in &self.order {
            self.init_value(node, node.info)?;
        }
        Ok(())
    }

    /// Returns the value registered for `info`, constructing it on first use.
    pub fn get_value(&self, info: TypeInfo) -> Result<DependencyValue, Error> {
        let node = self.nodes.get(&info.type_id).ok_or_else(|| {
            Error::new(ErrorKind::DependencyNotFound, "dependency not found")
                .with_option("type", info.type_name)
        })?;
        if let NodeState::Ready(value) = &*node.state.lock() {
            return Ok(value.clone());
        }
        let _resolving = self.resolving.lock();
        self.init_value(node, info)?;
        node.value(info)
    }

    /// Returns the value of type `T`, constructing it on first use.
    pub fn get<T>(&self) -> Result<T, Error>
    where
        T: Dependency,
    {
        let value = self.get_value(TypeInfo::of::<T>())?;
        cast(Some(&value))
    }

    /// Checks whether a provider for `T` is registered.
    pub fn contains<T>(&self) -> bool
    where
        T: Dependency,
    {
        self.nodes.contains_key(&TypeId::of::<T>())
    }

    fn init_value(&self, node: &Node, requested: TypeInfo) -> Result<(), Error> {
        let factory = match &*node.state.lock() {
            NodeState::Ready(_) => return Ok(()),
            NodeState::Released => return Err(unavailable(requested)),
            NodeState::Pending(v) => v.clone(),
        };
        if factory.locked.swap(true, Ordering::AcqRel) {
            let mut cycle: Vec<String> = self
                .stack
                .lock()
                .iter()
                .map(|v| v.type_name.to_owned())
                .collect();
            cycle.push(requested.type_name.to_owned());
            return Err(Error::new(
                ErrorKind::CyclicContainerDependency,
                "cyclic dependency detected",
            )
            .with_option(CYCLE_OPTION, cycle)
            .with_option("factory", factory.name)
            .with_option("type", requested.type_name));
        }
        self.stack.lock().push(requested);
        let _guard = defer(|| {
            self.stack.lock().pop();
            factory.locked.store(false, Ordering::Release);
        });
        let mut args = Vec::with_capacity(factory.inputs.len());
        for input in &factory.inputs {
            let Some(dependency) = self.nodes.get(&input.type_id) else {
                return Err(Error::new(
                    ErrorKind::UndeclaredDependency,
                    "dependency is not declared",
                )
                .with_option("type", input.type_name)
                .with_option("factory", factory.name));
            };
            self.init_value(dependency, *input)?;
            args.push(dependency.value(*input)?);
        }
        let values = match catch(|| (factory.call)(&args)) {
            Ok(Ok(v)) => v,
            Ok(Err(err)) | Err(err) => {
                return Err(
                    Error::new(ErrorKind::ConstructorFailed, "cannot construct dependency")
                        .with_option("factory", factory.name)
                        .with_option("type", requested.type_name)
                        .with_source(err),
                );
            }
        };
        tracing::trace!(factory = factory.name, "Dependency constructed");
        let mut resources = self.resources.lock();
        let Some(resources) = resources.as_mut() else {
            return Err(unavailable(requested));
        };
        for (info, value) in factory.outputs.iter().zip(values) {
            if let Some(close) = factory.closer(info) {
                resources.push(Resource {
                    info: *info,
                    value: value.clone(),
                    close,
                });
            }
            let Some(output) = self.nodes.get(&info.type_id) else {
                continue;
            };
            let mut state = output.state.lock();
            if matches!(&*state, NodeState::Pending(v) if Arc::ptr_eq(v, &factory)) {
                *state = NodeState::Ready(value);
            }
        }
        Ok(())
    }

    /// Closes all registered resources in reverse construction order.
    ///
    /// Close errors and panics are joined into one error. Only the first call
    /// has an effect; it also releases every value held by the container.
    pub fn close_all(&self) -> Result<(), StdError> {
        let Some(resources) = self.resources.lock().take() else {
            return Ok(());
        };
        let mut errors = Vec::new();
        for resource in resources.into_iter().rev() {
            tracing::trace!(resource = resource.info.type_name, "Closing resource");
            match catch(|| (resource.close)(&resource.value)) {
                Ok(Ok(())) => {}
                Ok(Err(err)) | Err(err) => {
                    tracing::warn!(resource = resource.info.type_name, "Cannot close resource: {err}");
                    errors.push(err);
                }
            }
        }
        for node in &self.order {
            let released = std::mem::replace(&mut *node.state.lock(), NodeState::Released);
            drop(released);
        }
        tracing::debug!("Dependency container closed");
        match join_all(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn validate_provider(provider: &Provider) -> Result<(), Error> {
    if provider.outputs.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidProvidedType,
            "provider does not return any dependency",
        )
        .with_option("factory", provider.name));
    }
    let mut seen = HashSet::new();
    for output in &provider.outputs {
        if !seen.insert(output.type_id) {
            return Err(Error::new(
                ErrorKind::InvalidProvidedType,
                "provider returns the same type more than once",
            )
            .with_option("type", output.type_name)
            .with_option("factory", provider.name));
        }
    }
    for (closable, _) in &provider.closers {
        if !seen.contains(&closable.type_id) {
            return Err(Error::new(
                ErrorKind::InvalidProvidedType,
                "closable type is not returned by provider",
            )
            .with_option("type", closable.type_name)
            .with_option("factory", provider.name));
        }
    }
    Ok(())
}

impl Drop for Container {
    fn drop(&mut self) {
        if let Err(err) = self.close_all() {
            tracing::error!("Cannot close dependency container: {err}");
        }
    }
}
