//! Registration-time class descriptors
//!
//! Rust has no runtime reflection, so constructor and method signatures are
//! described explicitly at registration time. A [`ClassDef`] plays the role
//! a reflected class plays in Laravel-style containers: it names the
//! constructor parameters, how each one is satisfied, and the methods that
//! can be invoked through [`Container::call`](super::Container::call).

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use super::{Container, ResolutionError};
use crate::error::FrameworkError;

/// A type-erased value stored in or produced by the container.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Named parameters supplied to `Container::call`, consumed once each.
pub type Params = HashMap<String, Value>;

/// Wrap a concrete value for storage in the container.
pub fn value<T: Any + Send + Sync>(v: T) -> Value {
    Arc::new(v)
}

/// Downcast a container value to its concrete type.
///
/// `identifier` is only used for the error message.
pub fn value_as<T: Any + Send + Sync>(
    v: &Value,
    identifier: &str,
) -> Result<Arc<T>, ResolutionError> {
    v.clone()
        .downcast::<T>()
        .map_err(|_| ResolutionError::TypeMismatch {
            identifier: identifier.to_string(),
            expected: std::any::type_name::<T>().to_string(),
        })
}

/// How a declared parameter is satisfied during resolution.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParamKind {
    /// An object type, resolved recursively through the container.
    Service,
    /// A primitive (string, number, ...) that must come from named
    /// parameters or a declared default.
    Primitive,
}

/// One declared constructor or method parameter.
#[derive(Clone)]
pub struct ParamDef {
    pub name: String,
    pub declared_type: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
}

impl ParamDef {
    /// A parameter whose declared type is a container-resolvable service.
    pub fn service(name: &str, declared_type: &str) -> Self {
        Self {
            name: name.to_string(),
            declared_type: declared_type.to_string(),
            kind: ParamKind::Service,
            default: None,
        }
    }

    /// A primitive parameter (satisfied by name or default only).
    pub fn primitive(name: &str, declared_type: &str) -> Self {
        Self {
            name: name.to_string(),
            declared_type: declared_type.to_string(),
            kind: ParamKind::Primitive,
            default: None,
        }
    }

    /// Attach a default value used when nothing else satisfies the parameter.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Resolved arguments handed to a constructor or method body, in the
/// declared parameter order.
pub struct CallArgs {
    values: Vec<Value>,
    names: Vec<String>,
}

impl CallArgs {
    pub(crate) fn new(values: Vec<Value>, names: Vec<String>) -> Self {
        Self { values, names }
    }

    /// Downcast the argument at `index` to its concrete type.
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, ResolutionError> {
        let name = self.names.get(index).map(String::as_str).unwrap_or("?");
        let v = self
            .values
            .get(index)
            .ok_or_else(|| ResolutionError::TypeMismatch {
                identifier: name.to_string(),
                expected: std::any::type_name::<T>().to_string(),
            })?;
        value_as::<T>(v, name)
    }

    /// Convenience accessor for string arguments (e.g. route parameters).
    pub fn string(&self, index: usize) -> Result<String, ResolutionError> {
        Ok(self.get::<String>(index)?.as_ref().clone())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Constructor body: builds the instance from resolved arguments.
pub type ConstructFn =
    Arc<dyn Fn(&Container, CallArgs) -> Result<Value, ResolutionError> + Send + Sync>;

/// Method body: invoked against a container-resolved receiver.
pub type MethodFn =
    Arc<dyn Fn(&Container, Value, CallArgs) -> Result<Value, FrameworkError> + Send + Sync>;

/// Free-function body for closure callables.
pub type ClosureFn =
    Arc<dyn Fn(&Container, CallArgs) -> Result<Value, FrameworkError> + Send + Sync>;

/// An invocable method attached to a [`ClassDef`].
#[derive(Clone)]
pub struct MethodDef {
    pub params: Vec<ParamDef>,
    pub body: MethodFn,
}

impl MethodDef {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&Container, Value, CallArgs) -> Result<Value, FrameworkError> + Send + Sync + 'static,
    {
        Self {
            params: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Declare the next parameter. Order matters: it is the invocation order.
    pub fn param(mut self, param: ParamDef) -> Self {
        self.params.push(param);
        self
    }
}

/// The registration-time description of a constructible class.
#[derive(Clone)]
pub struct ClassDef {
    pub name: String,
    pub instantiable: bool,
    pub params: Vec<ParamDef>,
    pub construct: Option<ConstructFn>,
    pub methods: HashMap<String, MethodDef>,
}

impl ClassDef {
    /// A concrete, instantiable class.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            instantiable: true,
            params: Vec::new(),
            construct: None,
            methods: HashMap::new(),
        }
    }

    /// An interface: known to the container but never buildable directly.
    /// Bind a concrete class to its name to make it resolvable.
    pub fn interface(name: &str) -> Self {
        Self {
            name: name.to_string(),
            instantiable: false,
            params: Vec::new(),
            construct: None,
            methods: HashMap::new(),
        }
    }

    /// Declare the next constructor parameter.
    pub fn param(mut self, param: ParamDef) -> Self {
        self.params.push(param);
        self
    }

    /// Set the constructor body.
    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&Container, CallArgs) -> Result<Value, ResolutionError> + Send + Sync + 'static,
    {
        self.construct = Some(Arc::new(f));
        self
    }

    /// Attach an invocable method.
    pub fn method(mut self, name: &str, def: MethodDef) -> Self {
        self.methods.insert(name.to_string(), def);
        self
    }
}

/// A closure callable with an explicit signature.
pub struct ClosureDef {
    pub params: Vec<ParamDef>,
    pub body: ClosureFn,
}

impl ClosureDef {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&Container, CallArgs) -> Result<Value, FrameworkError> + Send + Sync + 'static,
    {
        Self {
            params: Vec::new(),
            body: Arc::new(body),
        }
    }

    pub fn param(mut self, param: ParamDef) -> Self {
        self.params.push(param);
        self
    }
}

/// The three callable shapes accepted by [`Container::call`](super::Container::call):
/// a closure, a `(class, method)` pair, or a `"Class@method"` string parsed
/// via [`Callable::parse`].
#[derive(Clone)]
pub enum Callable {
    Closure(Arc<ClosureDef>),
    Method { class: String, method: String },
}

impl Callable {
    pub fn closure(def: ClosureDef) -> Self {
        Self::Closure(Arc::new(def))
    }

    pub fn method(class: &str, method: &str) -> Self {
        Self::Method {
            class: class.to_string(),
            method: method.to_string(),
        }
    }

    /// Parse a `"Class@method"` specification.
    pub fn parse(spec: &str) -> Result<Self, ResolutionError> {
        match spec.split_once('@') {
            Some((class, method)) if !class.is_empty() && !method.is_empty() => {
                Ok(Self::method(class, method))
            }
            _ => Err(ResolutionError::BadCallable {
                spec: spec.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closure(_) => write!(f, "Callable::Closure"),
            Self::Method { class, method } => write!(f, "Callable::Method({}@{})", class, method),
        }
    }
}
