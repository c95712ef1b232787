//! Binding resolution for method-style definitions.

use crate::callable::CallableKind;
use crate::receiver::{Class, Instance, Receiver};
use std::sync::Arc;

/// Shape of a callable once it is accessed through an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundForm {
    /// The binding target is passed implicitly as the first argument.
    Method,
    /// Called as-is, with no implicit receiver.
    Function,
}

/// The object behaviors and wires of `kind` bind against.
///
/// Instance methods bind to the instance; class and static methods bind to
/// the type, so every instance of one type shares a single wire. An instance
/// method accessed on the type itself binds to the type.
pub fn descriptor_bind(
    kind: CallableKind,
    instance: Option<&Arc<Instance>>,
    owner: &Arc<Class>,
) -> Receiver {
    match (kind, instance) {
        (CallableKind::InstanceMethod | CallableKind::Function, Some(obj)) => {
            Receiver::Instance(Arc::clone(obj))
        }
        _ => Receiver::Class(Arc::clone(owner)),
    }
}

/// Whether accessing `kind` through `instance` yields a bound method.
pub fn bound_form(kind: CallableKind, instance: Option<&Arc<Instance>>) -> BoundForm {
    match kind {
        CallableKind::InstanceMethod if instance.is_some() => BoundForm::Method,
        CallableKind::ClassMethod => BoundForm::Method,
        CallableKind::InstanceMethod | CallableKind::StaticMethod | CallableKind::Function => {
            BoundForm::Function
        }
    }
}

/// Side-table name for the wire of `code_name` accessed through `owner`.
///
/// Descriptor-bound definitions are disambiguated by the owner's name so a
/// subclass never reuses a wire built against its base.
pub fn wrapper_name(code_name: &str, kind: CallableKind, owner: Option<&Class>) -> String {
    match owner {
        Some(class) if kind.is_descriptor() => format!("__wire_{}_{}", code_name, class.name()),
        _ => format!("__wire_{}", code_name),
    }
}
