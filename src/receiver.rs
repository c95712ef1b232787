//! Receivers: the instances and types a method wire can be bound to.
//!
//! A [`Class`] is a named type with an optional base. An [`Instance`] pairs a
//! class with an arbitrary payload. Both are handed around as `Arc`s and their
//! allocation address is their identity.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// A named owner type.
///
/// # Example
///
/// ```
/// use wire_kit::receiver::Class;
///
/// let base = Class::new("Base");
/// let child = Class::subclass("Child", &base);
/// assert!(child.is_subclass_of(&base));
/// ```
#[derive(Debug)]
pub struct Class {
    name: String,
    base: Option<Arc<Class>>,
}

impl Class {
    /// Create a root class.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Class {
            name: name.into(),
            base: None,
        })
    }

    /// Create a class deriving from `base`.
    pub fn subclass(name: impl Into<String>, base: &Arc<Class>) -> Arc<Self> {
        Arc::new(Class {
            name: name.into(),
            base: Some(Arc::clone(base)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&Arc<Class>> {
        self.base.as_ref()
    }

    /// True if `self` is `other` or derives from it.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if std::ptr::eq(class, other) {
                return true;
            }
            current = class.base.as_deref();
        }
        false
    }
}

/// An object of some [`Class`] carrying a typed payload.
pub struct Instance {
    class: Arc<Class>,
    payload: Box<dyn Any + Send + Sync>,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(class: &Arc<Class>, payload: T) -> Arc<Self> {
        Arc::new(Instance {
            class: Arc::clone(class),
            payload: Box::new(payload),
        })
    }

    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    /// Borrow the payload as `T`, if that is what it holds.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} object at {:p}>", self.class.name, self)
    }
}

/// Identity of a receiver: the address of its allocation.
///
/// Stable for as long as the receiver or any [`WeakReceiver`] to it exists,
/// since a weak handle keeps the allocation from being reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(usize);

/// The object a wire binds against.
#[derive(Debug, Clone)]
pub enum Receiver {
    Instance(Arc<Instance>),
    Class(Arc<Class>),
}

impl Receiver {
    pub fn id(&self) -> ReceiverId {
        match self {
            Receiver::Instance(obj) => ReceiverId(Arc::as_ptr(obj) as *const () as usize),
            Receiver::Class(cls) => ReceiverId(Arc::as_ptr(cls) as *const () as usize),
        }
    }

    /// The receiver's type: the instance's class, or the class itself.
    pub fn class(&self) -> &Arc<Class> {
        match self {
            Receiver::Instance(obj) => obj.class(),
            Receiver::Class(cls) => cls,
        }
    }

    pub fn as_instance(&self) -> Option<&Arc<Instance>> {
        match self {
            Receiver::Instance(obj) => Some(obj),
            Receiver::Class(_) => None,
        }
    }

    pub fn as_class(&self) -> Option<&Arc<Class>> {
        match self {
            Receiver::Instance(_) => None,
            Receiver::Class(cls) => Some(cls),
        }
    }

    pub fn downgrade(&self) -> WeakReceiver {
        match self {
            Receiver::Instance(obj) => WeakReceiver::Instance(Arc::downgrade(obj)),
            Receiver::Class(cls) => WeakReceiver::Class(Arc::downgrade(cls)),
        }
    }

    /// Placeholder used for the receiver's slot when merging arguments.
    pub(crate) fn placeholder(&self) -> serde_json::Value {
        match self {
            Receiver::Instance(obj) => serde_json::Value::String(format!("{:?}", obj)),
            Receiver::Class(cls) => serde_json::Value::String(format!("<class '{}'>", cls.name)),
        }
    }
}

impl PartialEq for Receiver {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Receiver {}

/// Non-owning handle to a [`Receiver`].
#[derive(Debug, Clone)]
pub enum WeakReceiver {
    Instance(Weak<Instance>),
    Class(Weak<Class>),
}

impl WeakReceiver {
    pub fn upgrade(&self) -> Option<Receiver> {
        match self {
            WeakReceiver::Instance(obj) => obj.upgrade().map(Receiver::Instance),
            WeakReceiver::Class(cls) => cls.upgrade().map(Receiver::Class),
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            WeakReceiver::Instance(obj) => obj.strong_count() > 0,
            WeakReceiver::Class(cls) => cls.strong_count() > 0,
        }
    }
}
