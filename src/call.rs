//! Call model shared by wrapped callables and behaviors.

use crate::error::Result;
use crate::receiver::{Class, Instance, Receiver};
use serde_json::{Map, Value};
use std::any::Any;
use std::sync::Arc;

/// Keyword arguments and merged argument views.
pub type Kwargs = Map<String, Value>;

/// A wrapped callable or behavior implementation.
pub type Func = Arc<dyn Fn(Call) -> Result<Value> + Send + Sync>;

/// Wrap a closure as a [`Func`].
pub fn func<F>(f: F) -> Func
where
    F: Fn(Call) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// One invocation: the implicit receiver (if any) plus caller arguments.
#[derive(Debug, Clone, Default)]
pub struct Call {
    pub receiver: Option<Receiver>,
    pub args: Vec<Value>,
    pub kwargs: Kwargs,
}

impl Call {
    pub fn new(args: Vec<Value>, kwargs: Kwargs) -> Self {
        Call {
            receiver: None,
            args,
            kwargs,
        }
    }

    pub(crate) fn bound(receiver: Option<Receiver>, args: Vec<Value>, kwargs: Kwargs) -> Self {
        Call {
            receiver,
            args,
            kwargs,
        }
    }

    /// The bound instance, if the receiver is one.
    pub fn self_(&self) -> Option<&Arc<Instance>> {
        self.receiver.as_ref().and_then(Receiver::as_instance)
    }

    /// The bound class, if the receiver is one.
    pub fn cls(&self) -> Option<&Arc<Class>> {
        self.receiver.as_ref().and_then(Receiver::as_class)
    }

    /// Downcast the bound instance's payload.
    pub fn instance<T: Any>(&self) -> Option<&T> {
        self.self_().and_then(|obj| obj.downcast_ref::<T>())
    }

    /// Positional argument `index`, falling back to keyword `name`.
    pub fn arg(&self, index: usize, name: &str) -> Option<&Value> {
        self.args.get(index).or_else(|| self.kwargs.get(name))
    }
}
