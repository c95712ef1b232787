//! Per-receiver wire construction for method definitions.

use crate::binding::{bound_form, descriptor_bind, wrapper_name, BoundForm};
use crate::callable::Introspect;
use crate::config::WireConfig;
use crate::error::{Error, Result};
use crate::observability::{NoOpMetrics, WireMetrics};
use crate::receiver::{Class, Instance, Receiver, ReceiverId, WeakReceiver};
use crate::registry::{Behavior, BehaviorRegistry};
use crate::wire::Wire;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct TableEntry {
    receiver: WeakReceiver,
    wire: Arc<Wire>,
}

/// Wire-producing property for a method, class method or static method.
///
/// Accessing the property through a receiver yields that receiver's [`Wire`],
/// building it on first access. The wires live in a side-table keyed by
/// receiver identity and wrapper name; the table only holds receivers weakly,
/// so an entry outlives its receiver only until the next [`purge`].
///
/// With `purge_on_insert`, a sweep runs when an insert grows the table to its
/// high-water mark, which then moves to twice the surviving entries (never
/// below `table_capacity`). Inserting many receivers stays linear overall.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use wire_kit::call::{func, Kwargs};
/// use wire_kit::callable::{CallableWrapper, Parameter, Signature};
/// use wire_kit::receiver::{Class, Instance};
/// use wire_kit::Wire;
/// use std::sync::Arc;
///
/// struct Counter { v: i64 }
///
/// let class = Class::new("Counter");
/// let sig = Signature::new(vec![Parameter::positional("self")]).unwrap();
/// let cw = CallableWrapper::method(
///     "get",
///     sig,
///     func(|call| Ok(json!(call.instance::<Counter>().map(|c| c.v)))),
/// )
/// .unwrap();
/// let property = Wire::for_callable(cw).into_property().unwrap();
///
/// let a = Instance::new(&class, Counter { v: 10 });
/// let wire = property.get_for(&a);
/// assert!(Arc::ptr_eq(&wire, &property.get_for(&a)));
/// assert_eq!(wire.call(vec![], Kwargs::new()).unwrap(), json!(10));
/// ```
///
/// [`purge`]: WiredProperty::purge
pub struct WiredProperty {
    cwrapper: Arc<dyn Introspect>,
    registry: Arc<BehaviorRegistry>,
    table: DashMap<(ReceiverId, String), TableEntry>,
    purge_at: AtomicUsize,
    config: WireConfig,
    metrics: Arc<dyn WireMetrics>,
}

impl WiredProperty {
    /// Create a property for a method definition.
    ///
    /// # Errors
    /// `Error::ConfigError` if `cwrapper` is a free function, or if `config`
    /// is invalid.
    pub fn new(cwrapper: Arc<dyn Introspect>, config: WireConfig) -> Result<Self> {
        if cwrapper.is_barefunction() {
            return Err(Error::ConfigError(format!(
                "'{}' is a function; wrap it with Wire::for_callable instead",
                cwrapper.code_name()
            )));
        }
        config.validate()?;
        Ok(Self::from_parts(
            cwrapper,
            Arc::new(BehaviorRegistry::new()),
            config,
            Arc::new(NoOpMetrics),
        ))
    }

    pub(crate) fn from_parts(
        cwrapper: Arc<dyn Introspect>,
        registry: Arc<BehaviorRegistry>,
        config: WireConfig,
        metrics: Arc<dyn WireMetrics>,
    ) -> Self {
        let table = match config.shard_amount {
            Some(shards) => DashMap::with_capacity_and_shard_amount(config.table_capacity, shards),
            None => DashMap::with_capacity(config.table_capacity),
        };
        WiredProperty {
            cwrapper,
            registry,
            table,
            purge_at: AtomicUsize::new(config.table_capacity.max(1)),
            config,
            metrics,
        }
    }

    /// The wire for accessing this property through `instance` of `owner`.
    ///
    /// `instance` is `None` for access through the type itself. Repeated
    /// access through the same receiver returns the same wire.
    pub fn get(&self, instance: Option<&Arc<Instance>>, owner: &Arc<Class>) -> Arc<Wire> {
        let kind = self.cwrapper.kind();
        let target = descriptor_bind(kind, instance, owner);
        let name = wrapper_name(self.cwrapper.code_name(), kind, Some(&**owner));

        // The weak handle in an entry pins the receiver's allocation, so its
        // id cannot be reused by another receiver while the entry exists.
        let key = (target.id(), name);
        if let Some(entry) = self.table.get(&key) {
            self.metrics.record_wire_reused(&key.1);
            return Arc::clone(&entry.wire);
        }

        let mut created = false;
        let wire = {
            let entry = self.table.entry(key.clone()).or_insert_with(|| {
                created = true;
                let preargs = match bound_form(kind, instance) {
                    BoundForm::Method => Some(&target),
                    BoundForm::Function => None,
                };
                debug!(
                    "Creating {} for {:?} (bound: {})",
                    key.1,
                    target,
                    preargs.is_some()
                );
                TableEntry {
                    receiver: target.downgrade(),
                    wire: Arc::new(Wire::new(
                        Arc::clone(&self.cwrapper),
                        Arc::clone(&self.registry),
                        preargs,
                        Arc::clone(&self.metrics),
                    )),
                }
            });
            Arc::clone(&entry.wire)
        };

        if created {
            self.metrics.record_wire_created(&key.1);
            if self.config.purge_on_insert
                && self.table.len() >= self.purge_at.load(Ordering::Relaxed)
            {
                self.purge();
                let mark = (2 * self.table.len()).max(self.config.table_capacity).max(1);
                self.purge_at.store(mark, Ordering::Relaxed);
            }
        } else {
            self.metrics.record_wire_reused(&key.1);
        }
        wire
    }

    /// Instance access: `instance.method`.
    pub fn get_for(&self, instance: &Arc<Instance>) -> Arc<Wire> {
        self.get(Some(instance), instance.class())
    }

    /// Type access: `Class.method`.
    pub fn get_for_class(&self, owner: &Arc<Class>) -> Arc<Wire> {
        self.get(None, owner)
    }

    /// Attach a behavior visible to every wire of this property.
    pub fn attach(&self, name: impl Into<String>, behavior: impl Into<Behavior>) {
        self.registry.attach(name, behavior);
    }

    pub fn registry(&self) -> &Arc<BehaviorRegistry> {
        &self.registry
    }

    pub fn cwrapper(&self) -> &Arc<dyn Introspect> {
        &self.cwrapper
    }

    pub fn config(&self) -> &WireConfig {
        &self.config
    }

    /// Number of stored wires.
    ///
    /// Entries of dropped receivers count until they are purged.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop wires whose receivers are gone. Returns how many were dropped.
    pub fn purge(&self) -> usize {
        let before = self.table.len();
        self.table.retain(|_, entry| entry.receiver.is_alive());
        let purged = before.saturating_sub(self.table.len());
        self.metrics.record_purge(self.cwrapper.code_name(), purged);
        if purged > 0 {
            debug!("Purged {} dead wire(s) of {}", purged, self.cwrapper.code_name());
        }
        purged
    }

    /// True if `receiver` already has a wire under this property.
    ///
    /// `receiver` is the bound target: the instance for instance methods, the
    /// type for class and static methods or for access through the type.
    pub fn contains(&self, receiver: &Receiver) -> bool {
        let kind = self.cwrapper.kind();
        let name = wrapper_name(self.cwrapper.code_name(), kind, Some(&**receiver.class()));
        self.table
            .get(&(receiver.id(), name))
            .map_or(false, |entry| entry.receiver.is_alive())
    }
}

impl fmt::Debug for WiredProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WiredProperty")
            .field("name", &self.cwrapper.code_name())
            .field("kind", &self.cwrapper.kind())
            .field("wires", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{func, Kwargs};
    use crate::callable::{CallableWrapper, Parameter, Signature};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct PurgeCounter {
        passes: Mutex<usize>,
        purged: Mutex<usize>,
    }

    impl WireMetrics for PurgeCounter {
        fn record_purge(&self, _wrapper_name: &str, purged: usize) {
            *self.passes.lock().expect("Failed to lock passes") += 1;
            *self.purged.lock().expect("Failed to lock purged") += purged;
        }
    }

    fn counted(config: WireConfig) -> (WiredProperty, Arc<PurgeCounter>) {
        let metrics = Arc::new(PurgeCounter::default());
        let property = WiredProperty::from_parts(
            method().cwrapper().clone(),
            Arc::new(BehaviorRegistry::new()),
            config,
            metrics.clone(),
        );
        (property, metrics)
    }

    struct Item {
        v: i64,
    }

    fn value_of(call: &crate::call::Call) -> Value {
        json!(call.instance::<Item>().map(|item| item.v))
    }

    fn method() -> WiredProperty {
        let sig = Signature::new(vec![Parameter::positional("self")]).expect("valid signature");
        let cw = CallableWrapper::method("f", sig, func(|call| Ok(value_of(&call))))
            .expect("Failed to wrap method");
        WiredProperty::new(cw, WireConfig::default()).expect("Failed to build property")
    }

    fn classmethod() -> WiredProperty {
        let sig = Signature::new(vec![Parameter::positional("cls")]).expect("valid signature");
        let cw = CallableWrapper::classmethod(
            "make",
            sig,
            func(|call| Ok(json!(call.cls().map(|c| c.name().to_string())))),
        )
        .expect("Failed to wrap classmethod");
        WiredProperty::new(cw, WireConfig::default()).expect("Failed to build property")
    }

    #[test]
    fn test_identity_stability() {
        let class = Class::new("A");
        let a = Instance::new(&class, Item { v: 1 });
        let property = method();

        let first = property.get_for(&a);
        let second = property.get_for(&a);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(property.len(), 1);
    }

    #[test]
    fn test_isolation_across_receivers() {
        let class = Class::new("A");
        let a = Instance::new(&class, Item { v: 10 });
        let b = Instance::new(&class, Item { v: 20 });
        let property = method();

        let wa = property.get_for(&a);
        let wb = property.get_for(&b);
        assert!(!Arc::ptr_eq(&wa, &wb));
        assert_eq!(wa.call(vec![], Kwargs::new()).expect("call"), json!(10));
        assert_eq!(wb.call(vec![], Kwargs::new()).expect("call"), json!(20));
        assert_eq!(property.len(), 2);
    }

    #[test]
    fn test_instance_method_through_class_is_unbound() {
        let class = Class::new("A");
        let a = Instance::new(&class, Item { v: 7 });
        let property = method();

        let wire = property.get_for_class(&class);
        assert!(!wire.is_bound());
        assert!(Arc::ptr_eq(&wire, &property.get_for_class(&class)));
        assert!(!Arc::ptr_eq(&wire, &property.get_for(&a)));
    }

    #[test]
    fn test_classmethod_shared_per_type() {
        let base = Class::new("Base");
        let child = Class::subclass("Child", &base);
        let x = Instance::new(&base, Item { v: 1 });
        let y = Instance::new(&base, Item { v: 2 });
        let z = Instance::new(&child, Item { v: 3 });
        let property = classmethod();

        let wx = property.get_for(&x);
        let wy = property.get_for(&y);
        let wz = property.get_for(&z);

        assert!(Arc::ptr_eq(&wx, &wy));
        assert!(Arc::ptr_eq(&wx, &property.get_for_class(&base)));
        assert!(!Arc::ptr_eq(&wx, &wz));
        assert!(wx.is_bound());
        assert_eq!(wx.call(vec![], Kwargs::new()).expect("call"), json!("Base"));
        assert_eq!(wz.call(vec![], Kwargs::new()).expect("call"), json!("Child"));
        assert!(property.contains(&Receiver::Class(child.clone())));
    }

    #[test]
    fn test_staticmethod_unbound_but_per_type() {
        let class = Class::new("A");
        let other = Class::new("B");
        let sig = Signature::new(vec![Parameter::positional("x")]).expect("valid signature");
        let cw = CallableWrapper::staticmethod(
            "double",
            sig,
            func(|call| {
                assert!(call.receiver.is_none());
                Ok(json!(call.arg(0, "x").and_then(Value::as_i64).unwrap_or(0) * 2))
            }),
        );
        let property = WiredProperty::new(cw, WireConfig::default()).expect("property");

        let a = Instance::new(&class, ());
        let wire = property.get_for(&a);
        assert!(!wire.is_bound());
        assert!(Arc::ptr_eq(&wire, &property.get_for_class(&class)));
        assert!(!Arc::ptr_eq(&wire, &property.get_for_class(&other)));
        assert_eq!(
            wire.call(vec![json!(4)], Kwargs::new()).expect("call"),
            json!(8)
        );

        let merged = wire
            .merge_args(&[json!(4)], &Kwargs::new())
            .expect("Failed to merge");
        assert_eq!(merged.get("x"), Some(&json!(4)));
    }

    #[test]
    fn test_purge_drops_dead_receivers() {
        let class = Class::new("A");
        let property = WiredProperty::new(
            method().cwrapper().clone(),
            WireConfig {
                purge_on_insert: false,
                ..Default::default()
            },
        )
        .expect("property");

        let a = Instance::new(&class, Item { v: 1 });
        let b = Instance::new(&class, Item { v: 2 });
        property.get_for(&a);
        property.get_for(&b);
        assert_eq!(property.len(), 2);

        drop(a);
        assert_eq!(property.len(), 2);
        assert_eq!(property.purge(), 1);
        assert_eq!(property.purge(), 0);
        assert_eq!(property.len(), 1);
        assert!(!property.is_empty());
    }

    #[test]
    fn test_purge_on_insert() {
        let class = Class::new("A");
        let (property, _) = counted(WireConfig {
            table_capacity: 1,
            ..Default::default()
        });

        let a = Instance::new(&class, Item { v: 1 });
        property.get_for(&a);
        drop(a);

        let b = Instance::new(&class, Item { v: 2 });
        property.get_for(&b);
        assert_eq!(property.purge(), 0);
        assert_eq!(property.len(), 1);
    }

    #[test]
    fn test_purge_on_insert_is_amortized() {
        let class = Class::new("A");
        let (property, metrics) = counted(WireConfig::default());

        let instances: Vec<_> = (0..2000)
            .map(|v| Instance::new(&class, Item { v }))
            .collect();
        for obj in &instances {
            property.get_for(obj);
        }

        // Sweeps at 16, 32, ..., 1024.
        let passes = *metrics.passes.lock().expect("Failed to lock passes");
        assert!(passes <= 8, "{} sweeps for 2000 inserts", passes);
        assert_eq!(*metrics.purged.lock().expect("Failed to lock purged"), 0);
        assert_eq!(property.len(), 2000);
    }

    #[test]
    fn test_purge_on_insert_reclaims_dead_entries() {
        let class = Class::new("A");
        let (property, metrics) = counted(WireConfig::default());

        for v in 0..100 {
            let obj = Instance::new(&class, Item { v });
            property.get_for(&obj);
        }

        assert!(property.len() < 32, "{} entries kept", property.len());
        assert!(*metrics.purged.lock().expect("Failed to lock purged") >= 68);
    }

    #[test]
    fn test_no_purge_when_disabled() {
        let class = Class::new("A");
        let (property, metrics) = counted(WireConfig {
            purge_on_insert: false,
            ..Default::default()
        });

        for v in 0..50 {
            let obj = Instance::new(&class, Item { v });
            property.get_for(&obj);
        }

        assert_eq!(*metrics.passes.lock().expect("Failed to lock passes"), 0);
        assert_eq!(property.len(), 50);
        assert_eq!(property.purge(), 50);
    }

    #[test]
    fn test_contains_is_per_receiver() {
        let class = Class::new("A");
        let a = Instance::new(&class, Item { v: 1 });
        let b = Instance::new(&class, Item { v: 2 });
        let property = method();

        property.get_for(&a);
        assert!(property.contains(&Receiver::Instance(a.clone())));
        assert!(!property.contains(&Receiver::Instance(b.clone())));
        assert!(!property.contains(&Receiver::Class(class.clone())));

        property.get_for_class(&class);
        assert!(property.contains(&Receiver::Class(class.clone())));
    }

    #[test]
    fn test_rejects_plain_function() {
        let cw = CallableWrapper::function("f", Signature::default(), func(|_| Ok(Value::Null)));
        let err = WiredProperty::new(cw, WireConfig::default()).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = WireConfig {
            shard_amount: Some(3),
            ..Default::default()
        };
        let err = WiredProperty::new(method().cwrapper().clone(), config).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
