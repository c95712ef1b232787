//! Builder for wiring a callable with custom configuration.

use crate::callable::Introspect;
use crate::config::WireConfig;
use crate::error::Result;
use crate::observability::{NoOpMetrics, WireMetrics};
use crate::property::WiredProperty;
use crate::registry::BehaviorRegistry;
use crate::wire::{Wire, Wired};
use std::sync::Arc;

/// Fluent builder around [`Wire::for_callable`].
///
/// Lets decorating code size the per-receiver side-table, install a metrics
/// sink, or share an existing behavior registry.
///
/// # Example
///
/// ```ignore
/// use wire_kit::{WireBuilder, WireConfig};
///
/// // cw is an Arc<CallableWrapper> for a method
/// let wired = WireBuilder::new(cw)
///     .with_config(WireConfig::from_env()?)
///     .with_metrics(Arc::new(MyMetrics::default()))
///     .build()?;
/// ```
pub struct WireBuilder {
    cwrapper: Arc<dyn Introspect>,
    config: WireConfig,
    metrics: Arc<dyn WireMetrics>,
    registry: Option<Arc<BehaviorRegistry>>,
}

impl WireBuilder {
    /// Create a new builder with default settings.
    pub fn new(cwrapper: Arc<dyn Introspect>) -> Self {
        WireBuilder {
            cwrapper,
            config: WireConfig::default(),
            metrics: Arc::new(NoOpMetrics),
            registry: None,
        }
    }

    /// Set the side-table configuration.
    ///
    /// Ignored for free functions, which have no side-table.
    pub fn with_config(mut self, config: WireConfig) -> Self {
        self.config = config;
        self
    }

    /// Set a custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn WireMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Share an existing behavior registry instead of creating a fresh one.
    pub fn with_registry(mut self, registry: Arc<BehaviorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Wrap the callable.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the configuration fails validation.
    pub fn build(self) -> Result<Wired> {
        self.config.validate()?;
        let registry = self.registry.unwrap_or_default();

        debug!(
            "Wiring {} '{}'",
            self.cwrapper.kind(),
            self.cwrapper.code_name()
        );

        if self.cwrapper.is_barefunction() {
            Ok(Wired::Function(Arc::new(Wire::new(
                self.cwrapper,
                registry,
                None,
                self.metrics,
            ))))
        } else {
            Ok(Wired::Property(WiredProperty::from_parts(
                self.cwrapper,
                registry,
                self.config,
                self.metrics,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{func, Kwargs};
    use crate::callable::{CallableWrapper, Parameter, Signature};
    use crate::error::Error;
    use crate::receiver::{Class, Instance};
    use crate::registry::Behavior;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestMetrics {
        created: Mutex<usize>,
        reused: Mutex<usize>,
        missing: Mutex<Vec<String>>,
    }

    impl WireMetrics for TestMetrics {
        fn record_wire_created(&self, _wrapper_name: &str) {
            *self.created.lock().expect("Failed to lock created") += 1;
        }

        fn record_wire_reused(&self, _wrapper_name: &str) {
            *self.reused.lock().expect("Failed to lock reused") += 1;
        }

        fn record_behavior_missing(&self, name: &str) {
            self.missing
                .lock()
                .expect("Failed to lock missing")
                .push(name.to_string());
        }
    }

    fn method() -> Arc<dyn Introspect> {
        let sig = Signature::new(vec![Parameter::positional("self")]).expect("valid signature");
        CallableWrapper::method("f", sig, func(|_| Ok(Value::Null))).expect("Failed to wrap")
    }

    #[test]
    fn test_builder_basic() {
        let wired = WireBuilder::new(method()).build().expect("Failed to build");
        assert!(wired.as_property().is_some());

        let wired = WireBuilder::new(CallableWrapper::function(
            "g",
            Signature::default(),
            func(|_| Ok(json!(1))),
        ))
        .build()
        .expect("Failed to build");
        let wire = wired.into_function().expect("function wire");
        assert_eq!(wire.call(vec![], Kwargs::new()).expect("call"), json!(1));
    }

    #[test]
    fn test_builder_with_metrics() {
        let metrics = Arc::new(TestMetrics::default());
        let property = WireBuilder::new(method())
            .with_metrics(metrics.clone())
            .build()
            .expect("Failed to build")
            .into_property()
            .expect("property");

        let class = Class::new("A");
        let a = Instance::new(&class, ());
        let b = Instance::new(&class, ());

        let wire = property.get_for(&a);
        property.get_for(&a);
        property.get_for(&b);
        assert!(wire.resolve("missing").is_err());

        assert_eq!(*metrics.created.lock().expect("lock"), 2);
        assert_eq!(*metrics.reused.lock().expect("lock"), 1);
        assert_eq!(
            *metrics.missing.lock().expect("lock"),
            vec!["missing".to_string()]
        );
    }

    #[test]
    fn test_builder_with_config() {
        let config = WireConfig {
            table_capacity: 4,
            shard_amount: Some(4),
            purge_on_insert: false,
        };
        let property = WireBuilder::new(method())
            .with_config(config.clone())
            .build()
            .expect("Failed to build")
            .into_property()
            .expect("property");
        assert_eq!(property.config(), &config);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let err = WireBuilder::new(method())
            .with_config(WireConfig {
                shard_amount: Some(1),
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_builder_with_shared_registry() {
        let registry = Arc::new(BehaviorRegistry::new());
        registry.attach("key", Behavior::callable(|_| Ok(json!("shared"))));

        let wired = WireBuilder::new(method())
            .with_registry(registry.clone())
            .build()
            .expect("Failed to build");
        assert!(Arc::ptr_eq(wired.registry(), &registry));

        let class = Class::new("A");
        let a = Instance::new(&class, ());
        let wire = wired.as_property().expect("property").get_for(&a);
        assert_eq!(
            wire.invoke("key", vec![], Kwargs::new()).expect("invoke"),
            json!("shared")
        );
    }
}
