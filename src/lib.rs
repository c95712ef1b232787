//! # wire-kit
//!
//! The universal function/method wrapper underneath a caching decorator.
//!
//! ## Features
//!
//! - **Transparent:** A wire calls through to the wrapped callable unchanged
//! - **Per-receiver identity:** Methods get one wire per instance, class and
//!   static methods one wire per type, always the same object on re-access
//! - **Attachable behaviors:** Name a sub-behavior once per definition
//!   (`"call"`, `"key"`, ...) and every wire sees it bound to its own receiver
//! - **Merged arguments:** Rebuild the full keyword view of any call against
//!   the declared signature, receiver removed
//! - **Thread safe:** Side-tables and memoized bindings are `DashMap`-backed
//!
//! ## Quick Start
//!
//! ```
//! use serde_json::json;
//! use wire_kit::{
//!     call::{func, Kwargs},
//!     callable::{CallableWrapper, Parameter, Signature},
//!     receiver::{Class, Instance},
//!     registry::Behavior,
//!     Wire,
//! };
//!
//! // 1. Declare the method `A.f(self)` returning `self.v`
//! struct A {
//!     v: i64,
//! }
//!
//! let class = Class::new("A");
//! let sig = Signature::new(vec![Parameter::positional("self")]).unwrap();
//! let cw = CallableWrapper::method(
//!     "f",
//!     sig,
//!     func(|call| Ok(json!(call.instance::<A>().map(|a| a.v)))),
//! )
//! .unwrap();
//!
//! // 2. Wire it and attach behaviors
//! let f = Wire::for_callable(cw.clone()).into_property().unwrap();
//! f.attach("call", Behavior::callable(move |call| cw.invoke(call)));
//! f.attach("key", Behavior::callable(|_| Ok(json!("key"))));
//!
//! // 3. Use it through instances
//! let a = Instance::new(&class, A { v: 10 });
//! let b = Instance::new(&class, A { v: 20 });
//! assert_eq!(f.get_for(&a).invoke("call", vec![], Kwargs::new()).unwrap(), json!(10));
//! assert_eq!(f.get_for(&b).invoke("call", vec![], Kwargs::new()).unwrap(), json!(20));
//! assert_eq!(f.get_for(&a).invoke("key", vec![], Kwargs::new()).unwrap(), json!("key"));
//! ```

#[macro_use]
extern crate log;

pub mod binding;
pub mod builder;
pub mod call;
pub mod callable;
pub mod config;
pub mod error;
pub mod observability;
pub mod property;
pub mod receiver;
pub mod registry;
pub mod wire;

// Re-exports for convenience
pub use builder::WireBuilder;
pub use call::{Call, Func, Kwargs};
pub use callable::{CallableKind, CallableWrapper, Introspect, Parameter, Signature};
pub use config::WireConfig;
pub use error::{Error, Result};
pub use property::WiredProperty;
pub use receiver::{Class, Instance, Receiver};
pub use registry::{Behavior, BehaviorRegistry};
pub use wire::{BoundBehavior, Resolved, Wire, Wired};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
