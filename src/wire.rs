//! The universal function/method wrapper.
//!
//! - A free function is wrapped by exactly one [`Wire`].
//! - A method is wrapped by a [`WiredProperty`], which creates one [`Wire`]
//!   per instance it is accessed through.
//! - A class or static method is wrapped by a [`WiredProperty`] that creates
//!   one [`Wire`] per class.
//!
//! Do not build wires by hand; go through [`Wire::for_callable`] or
//! [`WireBuilder`](crate::builder::WireBuilder).

use crate::call::{Call, Func, Kwargs};
use crate::callable::Introspect;
use crate::error::{Error, Result};
use crate::observability::{NoOpMetrics, WireMetrics};
use crate::property::WiredProperty;
use crate::receiver::{Receiver, WeakReceiver};
use crate::registry::{Behavior, BehaviorRegistry};
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Stand-in for a callable, bound to at most one receiver.
pub struct Wire {
    cwrapper: Arc<dyn Introspect>,
    registry: Arc<BehaviorRegistry>,
    preargs: Option<WeakReceiver>,
    bound: DashMap<String, Arc<BoundBehavior>>,
    metrics: Arc<dyn WireMetrics>,
}

impl Wire {
    /// Wrap a classified callable with the default configuration.
    ///
    /// Returns a directly callable wire for free functions and a
    /// [`WiredProperty`] for every method kind.
    pub fn for_callable(cwrapper: Arc<dyn Introspect>) -> Wired {
        let registry = Arc::new(BehaviorRegistry::new());
        let metrics: Arc<dyn WireMetrics> = Arc::new(NoOpMetrics);

        if cwrapper.is_barefunction() {
            Wired::Function(Arc::new(Wire::new(cwrapper, registry, None, metrics)))
        } else {
            Wired::Property(WiredProperty::from_parts(
                cwrapper,
                registry,
                Default::default(),
                metrics,
            ))
        }
    }

    /// Pre-arguments are fixed here and never change afterwards.
    pub(crate) fn new(
        cwrapper: Arc<dyn Introspect>,
        registry: Arc<BehaviorRegistry>,
        preargs: Option<&Receiver>,
        metrics: Arc<dyn WireMetrics>,
    ) -> Self {
        Wire {
            cwrapper,
            registry,
            preargs: preargs.map(Receiver::downgrade),
            bound: DashMap::new(),
            metrics,
        }
    }

    /// Declared name of the wrapped callable.
    pub fn name(&self) -> &str {
        self.cwrapper.code_name()
    }

    pub fn cwrapper(&self) -> &Arc<dyn Introspect> {
        &self.cwrapper
    }

    pub fn registry(&self) -> &Arc<BehaviorRegistry> {
        &self.registry
    }

    /// True if calls get an implicit receiver prepended.
    pub fn is_bound(&self) -> bool {
        self.preargs.is_some()
    }

    /// The implicit receiver, if this wire has one.
    ///
    /// # Errors
    /// `Error::ReceiverDropped` if the receiver no longer exists.
    pub fn receiver(&self) -> Result<Option<Receiver>> {
        upgrade(&self.preargs, self.name())
    }

    /// Invoke the wrapped callable with the pre-arguments prepended.
    ///
    /// The callable's result or error is returned unchanged.
    pub fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        let call = Call::bound(self.receiver()?, args, kwargs);
        (self.cwrapper.wrapped_callable())(call)
    }

    /// Look up a behavior attached to this wire's definition.
    ///
    /// Callable behaviors come back bound to this wire's pre-arguments and
    /// are memoized, so resolving the same name twice yields the same
    /// `Arc<BoundBehavior>` until the behavior is re-attached.
    ///
    /// # Errors
    /// `Error::AttributeError` if nothing is attached under `name`.
    pub fn resolve(&self, name: &str) -> Result<Resolved> {
        let Some(slot) = self.registry.slot(name) else {
            self.metrics.record_behavior_missing(name);
            return Err(Error::attribute("Wire", name));
        };
        self.metrics.record_behavior_resolved(name);

        let func = match slot.behavior {
            Behavior::Value(value) => {
                return Ok(Resolved::Value {
                    name: name.to_string(),
                    value,
                })
            }
            Behavior::Callable(func) => func,
        };

        let make = || {
            Arc::new(BoundBehavior {
                name: name.to_string(),
                owner: self.name().to_string(),
                func: Arc::clone(&func),
                preargs: self.preargs.clone(),
                stamp: slot.stamp,
            })
        };

        // Only move forward: a resolver that read an older slot keeps the
        // newer binding another resolver already stored.
        let mut entry = self.bound.entry(name.to_string()).or_insert_with(|| make());
        if entry.stamp < slot.stamp {
            debug!("Rebinding replaced behavior '{}' on {}", name, self.name());
            *entry = make();
        } else {
            trace!("Behavior '{}' bound on {}", name, self.name());
        }
        Ok(Resolved::Method(Arc::clone(entry.value())))
    }

    /// Resolve `name` and call it.
    ///
    /// # Errors
    /// `Error::AttributeError` if nothing is attached, `Error::NotCallable`
    /// if a plain value is attached, otherwise whatever the behavior returns.
    pub fn invoke(&self, name: &str, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        self.resolve(name)?.call(args, kwargs)
    }

    /// Build the full keyword view of a call.
    ///
    /// Arguments are merged against the wrapped callable's signature with the
    /// pre-arguments in front; the receiver's own entry is removed again so
    /// only caller-visible parameters remain.
    ///
    /// # Errors
    /// `Error::SignatureError` from the introspection collaborator when the
    /// arguments do not fit the signature.
    pub fn merge_args(&self, args: &[Value], kwargs: &Kwargs) -> Result<Kwargs> {
        let receiver = self.receiver()?;

        let mut full_args = Vec::with_capacity(args.len() + 1);
        if let Some(receiver) = &receiver {
            full_args.push(receiver.placeholder());
        }
        full_args.extend_from_slice(args);

        let mut merged = self.cwrapper.kwargify(&full_args, kwargs)?;
        if receiver.is_some() {
            if let Some(first) = self.cwrapper.first_parameter() {
                merged.shift_remove(&first.name);
            }
        }
        Ok(merged)
    }
}

impl fmt::Debug for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wire")
            .field("name", &self.name())
            .field("kind", &self.cwrapper.kind())
            .field("bound", &self.is_bound())
            .finish()
    }
}

fn upgrade(preargs: &Option<WeakReceiver>, owner: &str) -> Result<Option<Receiver>> {
    match preargs {
        Some(weak) => weak
            .upgrade()
            .map(Some)
            .ok_or_else(|| Error::ReceiverDropped(owner.to_string())),
        None => Ok(None),
    }
}

/// A callable behavior bound to one wire's pre-arguments.
pub struct BoundBehavior {
    name: String,
    owner: String,
    func: Func,
    preargs: Option<WeakReceiver>,
    stamp: u64,
}

impl BoundBehavior {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        let call = Call::bound(upgrade(&self.preargs, &self.owner)?, args, kwargs);
        (self.func)(call)
    }
}

impl fmt::Debug for BoundBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundBehavior")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("bound", &self.preargs.is_some())
            .finish()
    }
}

/// Outcome of [`Wire::resolve`].
#[derive(Debug, Clone)]
pub enum Resolved {
    Method(Arc<BoundBehavior>),
    /// A plain value attached under `name`.
    Value { name: String, value: Value },
}

impl Resolved {
    /// # Errors
    /// `Error::NotCallable` for a plain value.
    pub fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        match self {
            Resolved::Method(method) => method.call(args, kwargs),
            Resolved::Value { name, .. } => Err(Error::NotCallable(name.clone())),
        }
    }

    pub fn as_method(&self) -> Option<&Arc<BoundBehavior>> {
        match self {
            Resolved::Method(method) => Some(method),
            Resolved::Value { .. } => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Resolved::Method(_) => None,
            Resolved::Value { value, .. } => Some(value),
        }
    }

    /// Name the behavior was attached under.
    pub fn name(&self) -> &str {
        match self {
            Resolved::Method(method) => method.name(),
            Resolved::Value { name, .. } => name,
        }
    }
}

/// What [`Wire::for_callable`] hands back.
#[derive(Debug)]
pub enum Wired {
    /// A free function: the wire itself.
    Function(Arc<Wire>),
    /// A method: wires are produced per receiver.
    Property(WiredProperty),
}

impl Wired {
    /// Attach a behavior visible to every wire of this definition.
    pub fn attach(&self, name: impl Into<String>, behavior: impl Into<Behavior>) {
        self.registry().attach(name, behavior);
    }

    pub fn registry(&self) -> &Arc<BehaviorRegistry> {
        match self {
            Wired::Function(wire) => wire.registry(),
            Wired::Property(property) => property.registry(),
        }
    }

    pub fn cwrapper(&self) -> &Arc<dyn Introspect> {
        match self {
            Wired::Function(wire) => wire.cwrapper(),
            Wired::Property(property) => property.cwrapper(),
        }
    }

    pub fn as_function(&self) -> Option<&Arc<Wire>> {
        match self {
            Wired::Function(wire) => Some(wire),
            Wired::Property(_) => None,
        }
    }

    pub fn as_property(&self) -> Option<&WiredProperty> {
        match self {
            Wired::Function(_) => None,
            Wired::Property(property) => Some(property),
        }
    }

    /// # Errors
    /// `Error::ConfigError` if the definition is a method.
    pub fn into_function(self) -> Result<Arc<Wire>> {
        match self {
            Wired::Function(wire) => Ok(wire),
            Wired::Property(property) => Err(Error::ConfigError(format!(
                "'{}' is a {}, not a function",
                property.cwrapper().code_name(),
                property.cwrapper().kind()
            ))),
        }
    }

    /// # Errors
    /// `Error::ConfigError` if the definition is a free function.
    pub fn into_property(self) -> Result<WiredProperty> {
        match self {
            Wired::Property(property) => Ok(property),
            Wired::Function(wire) => Err(Error::ConfigError(format!(
                "'{}' is a function, not a method",
                wire.name()
            ))),
        }
    }
}
