//! Callable introspection: classification, signatures and `kwargify`.
//!
//! The wiring layer never inspects callables itself. It consumes the
//! [`Introspect`] trait; [`CallableWrapper`] is the stock implementation.

use crate::call::{Call, Func, Kwargs};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// How a callable binds when accessed through an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallableKind {
    /// Free function, never bound.
    Function,
    /// Bound to the instance it is accessed through.
    InstanceMethod,
    /// Bound to the type it is accessed through.
    ClassMethod,
    /// Accessed through a type but never bound.
    StaticMethod,
}

impl CallableKind {
    pub fn is_method(self) -> bool {
        !matches!(self, CallableKind::Function)
    }

    /// Class and static methods are descriptor-wrapped in their owner.
    pub fn is_descriptor(self) -> bool {
        matches!(self, CallableKind::ClassMethod | CallableKind::StaticMethod)
    }
}

impl fmt::Display for CallableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallableKind::Function => write!(f, "function"),
            CallableKind::InstanceMethod => write!(f, "method"),
            CallableKind::ClassMethod => write!(f, "classmethod"),
            CallableKind::StaticMethod => write!(f, "staticmethod"),
        }
    }
}

/// Parameter kinds, in the order they must appear in a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    pub default: Option<Value>,
}

impl Parameter {
    fn of(name: impl Into<String>, kind: ParameterKind) -> Self {
        Parameter {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn positional(name: impl Into<String>) -> Self {
        Self::of(name, ParameterKind::PositionalOrKeyword)
    }

    pub fn positional_only(name: impl Into<String>) -> Self {
        Self::of(name, ParameterKind::PositionalOnly)
    }

    pub fn var_positional(name: impl Into<String>) -> Self {
        Self::of(name, ParameterKind::VarPositional)
    }

    pub fn keyword_only(name: impl Into<String>) -> Self {
        Self::of(name, ParameterKind::KeywordOnly)
    }

    pub fn var_keyword(name: impl Into<String>) -> Self {
        Self::of(name, ParameterKind::VarKeyword)
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    fn is_variadic(&self) -> bool {
        matches!(
            self.kind,
            ParameterKind::VarPositional | ParameterKind::VarKeyword
        )
    }
}

/// A declared parameter list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    params: Vec<Parameter>,
}

impl Signature {
    /// Build a signature, rejecting parameter lists no function could declare.
    ///
    /// # Errors
    ///
    /// `Error::ConfigError` for duplicate names, out-of-order kinds, more than
    /// one `*args`/`**kwargs`, defaults on variadics, or a required positional
    /// parameter following one with a default.
    pub fn new(params: Vec<Parameter>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut last_kind = ParameterKind::PositionalOnly;
        let mut positional_default = false;

        for param in &params {
            if !seen.insert(param.name.as_str()) {
                return Err(Error::ConfigError(format!(
                    "duplicate argument '{}' in signature",
                    param.name
                )));
            }
            if param.kind < last_kind
                || (param.kind == last_kind && param.is_variadic())
            {
                return Err(Error::ConfigError(format!(
                    "parameter '{}' ({:?}) is out of order",
                    param.name, param.kind
                )));
            }
            if param.is_variadic() && param.default.is_some() {
                return Err(Error::ConfigError(format!(
                    "variadic parameter '{}' cannot have a default",
                    param.name
                )));
            }
            if matches!(
                param.kind,
                ParameterKind::PositionalOnly | ParameterKind::PositionalOrKeyword
            ) {
                if param.default.is_some() {
                    positional_default = true;
                } else if positional_default {
                    return Err(Error::ConfigError(format!(
                        "non-default argument '{}' follows default argument",
                        param.name
                    )));
                }
            }
            last_kind = param.kind;
        }

        Ok(Signature { params })
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn first(&self) -> Option<&Parameter> {
        self.params.first()
    }

    fn positional_capacity(&self) -> usize {
        self.params
            .iter()
            .filter(|p| {
                matches!(
                    p.kind,
                    ParameterKind::PositionalOnly | ParameterKind::PositionalOrKeyword
                )
            })
            .count()
    }

    fn has_kind(&self, kind: ParameterKind) -> bool {
        self.params.iter().any(|p| p.kind == kind)
    }

    /// Merge a call's arguments into a name -> value map in declaration order.
    ///
    /// Surplus positionals land in the `*args` parameter as an array and
    /// unknown keywords in the `**kwargs` parameter as an object. Defaults
    /// fill whatever the caller left out.
    ///
    /// # Errors
    ///
    /// `Error::SignatureError` when the call cannot bind: too many
    /// positionals, a value given twice, an unexpected keyword, a
    /// positional-only parameter passed by keyword, or a missing required
    /// argument.
    pub fn kwargify(&self, func_name: &str, args: &[Value], kwargs: &Kwargs) -> Result<Kwargs> {
        let capacity = self.positional_capacity();
        if args.len() > capacity && !self.has_kind(ParameterKind::VarPositional) {
            return Err(Error::SignatureError(format!(
                "{}() takes {} positional argument{} but {} {} given",
                func_name,
                capacity,
                plural(capacity),
                args.len(),
                if args.len() == 1 { "was" } else { "were" }
            )));
        }

        let mut remaining = kwargs.clone();
        let mut positional = args.iter();
        let mut merged = Kwargs::new();
        let mut missing_positional = Vec::new();
        let mut missing_keyword = Vec::new();
        let mut positional_only = Vec::new();

        for param in &self.params {
            let name = param.name.as_str();
            match param.kind {
                ParameterKind::PositionalOnly | ParameterKind::PositionalOrKeyword => {
                    let by_keyword = param.kind == ParameterKind::PositionalOrKeyword;
                    if let Some(value) = positional.next() {
                        if by_keyword && remaining.contains_key(name) {
                            return Err(Error::SignatureError(format!(
                                "{}() got multiple values for argument '{}'",
                                func_name, name
                            )));
                        }
                        merged.insert(name.to_string(), value.clone());
                    } else if let Some(value) = by_keyword.then(|| remaining.shift_remove(name)).flatten()
                    {
                        merged.insert(name.to_string(), value);
                    } else if let Some(default) = &param.default {
                        merged.insert(name.to_string(), default.clone());
                    } else {
                        missing_positional.push(name);
                    }
                    if !by_keyword && remaining.contains_key(name) {
                        positional_only.push(name);
                    }
                }
                ParameterKind::VarPositional => {
                    let rest: Vec<Value> = positional.by_ref().cloned().collect();
                    merged.insert(name.to_string(), Value::Array(rest));
                }
                ParameterKind::KeywordOnly => {
                    if let Some(value) = remaining.shift_remove(name) {
                        merged.insert(name.to_string(), value);
                    } else if let Some(default) = &param.default {
                        merged.insert(name.to_string(), default.clone());
                    } else {
                        missing_keyword.push(name);
                    }
                }
                ParameterKind::VarKeyword => {
                    let rest = std::mem::take(&mut remaining);
                    merged.insert(name.to_string(), Value::Object(rest));
                    positional_only.clear();
                }
            }
        }

        if !positional_only.is_empty() {
            return Err(Error::SignatureError(format!(
                "{}() got some positional-only arguments passed as keyword arguments: {}",
                func_name,
                quoted(&positional_only, ", ")
            )));
        }
        if let Some(unexpected) = remaining.keys().next() {
            return Err(Error::SignatureError(format!(
                "{}() got an unexpected keyword argument '{}'",
                func_name, unexpected
            )));
        }
        if !missing_positional.is_empty() {
            return Err(Error::SignatureError(format!(
                "{}() missing {} required positional argument{}: {}",
                func_name,
                missing_positional.len(),
                plural(missing_positional.len()),
                quoted(&missing_positional, " and ")
            )));
        }
        if !missing_keyword.is_empty() {
            return Err(Error::SignatureError(format!(
                "{}() missing {} required keyword-only argument{}: {}",
                func_name,
                missing_keyword.len(),
                plural(missing_keyword.len()),
                quoted(&missing_keyword, " and ")
            )));
        }

        Ok(merged)
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// `'a'`, `'a' and 'b'`, `'a', 'b' and 'c'`.
fn quoted(names: &[&str], last_sep: &str) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{}'", n)).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => {
            format!("{}{}{}", rest.join(", "), last_sep, last)
        }
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}

/// What the wiring layer needs to know about a decorated callable.
pub trait Introspect: Send + Sync {
    fn kind(&self) -> CallableKind;

    /// Name the callable was declared with.
    fn code_name(&self) -> &str;

    /// The raw callable, invoked with the receiver already in the [`Call`].
    fn wrapped_callable(&self) -> &Func;

    /// First declared parameter; the implicit receiver for bound methods.
    fn first_parameter(&self) -> Option<&Parameter>;

    /// Merge positional and keyword arguments against the declared signature.
    ///
    /// `args` includes the receiver's slot when the call is bound.
    fn kwargify(&self, args: &[Value], kwargs: &Kwargs) -> Result<Kwargs>;

    fn is_barefunction(&self) -> bool {
        self.kind() == CallableKind::Function
    }

    fn is_descriptor(&self) -> bool {
        self.kind().is_descriptor()
    }
}

/// Stock [`Introspect`] implementation: a named callable with a [`Signature`].
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use wire_kit::call::{func, Kwargs};
/// use wire_kit::callable::{CallableWrapper, Introspect, Parameter, Signature};
///
/// let sig = Signature::new(vec![
///     Parameter::positional("x"),
///     Parameter::positional("y").with_default(json!(1)),
/// ])
/// .unwrap();
/// let cw = CallableWrapper::function("add", sig, func(|_call| Ok(json!(null))));
///
/// let merged = cw.kwargify(&[json!(5)], &Kwargs::new()).unwrap();
/// assert_eq!(merged["x"], json!(5));
/// assert_eq!(merged["y"], json!(1));
/// ```
pub struct CallableWrapper {
    name: String,
    kind: CallableKind,
    signature: Signature,
    callable: Func,
}

impl CallableWrapper {
    /// Wrap a free function.
    pub fn function(name: impl Into<String>, signature: Signature, callable: Func) -> Arc<Self> {
        Arc::new(CallableWrapper {
            name: name.into(),
            kind: CallableKind::Function,
            signature,
            callable,
        })
    }

    /// Wrap an instance method; the first parameter is the receiver.
    ///
    /// # Errors
    ///
    /// `Error::ConfigError` if the signature has no leading positional
    /// parameter to bind the receiver to.
    pub fn method(name: impl Into<String>, signature: Signature, callable: Func) -> Result<Arc<Self>> {
        Self::bound(name.into(), CallableKind::InstanceMethod, signature, callable)
    }

    /// Wrap a class method; the first parameter is the owner type.
    ///
    /// # Errors
    ///
    /// Same as [`CallableWrapper::method`].
    pub fn classmethod(
        name: impl Into<String>,
        signature: Signature,
        callable: Func,
    ) -> Result<Arc<Self>> {
        Self::bound(name.into(), CallableKind::ClassMethod, signature, callable)
    }

    /// Wrap a static method.
    pub fn staticmethod(name: impl Into<String>, signature: Signature, callable: Func) -> Arc<Self> {
        Arc::new(CallableWrapper {
            name: name.into(),
            kind: CallableKind::StaticMethod,
            signature,
            callable,
        })
    }

    fn bound(
        name: String,
        kind: CallableKind,
        signature: Signature,
        callable: Func,
    ) -> Result<Arc<Self>> {
        let receiver_slot = signature.first().map(|p| p.kind);
        if !matches!(
            receiver_slot,
            Some(ParameterKind::PositionalOnly | ParameterKind::PositionalOrKeyword)
        ) {
            return Err(Error::ConfigError(format!(
                "{} '{}' needs a leading positional parameter for its receiver",
                kind, name
            )));
        }
        Ok(Arc::new(CallableWrapper {
            name,
            kind,
            signature,
            callable,
        }))
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Invoke the raw callable directly, bypassing any wire.
    pub fn invoke(&self, call: Call) -> Result<Value> {
        (self.callable)(call)
    }
}

impl Introspect for CallableWrapper {
    fn kind(&self) -> CallableKind {
        self.kind
    }

    fn code_name(&self) -> &str {
        &self.name
    }

    fn wrapped_callable(&self) -> &Func {
        &self.callable
    }

    fn first_parameter(&self) -> Option<&Parameter> {
        self.signature.first()
    }

    fn kwargify(&self, args: &[Value], kwargs: &Kwargs) -> Result<Kwargs> {
        self.signature.kwargify(&self.name, args, kwargs)
    }
}

impl fmt::Debug for CallableWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableWrapper")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}
