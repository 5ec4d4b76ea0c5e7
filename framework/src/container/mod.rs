//! Service container for dependency injection
//!
//! This module provides Laravel-like service container capabilities:
//! - Bindings: abstract identifier -> factory, with optional singleton sharing
//! - Instance cache: shared instances returned by identity on every resolution
//! - Aliases: redirect one identifier to another before lookup
//! - Dependency-injecting `call` for controller actions and closures
//!
//! Abstract identifiers are strings, and constructor/method signatures are
//! described by explicit [`ClassDef`] descriptors registered up front — the
//! registration-time stand-in for runtime reflection.
//!
//! # Example
//!
//! ```rust,ignore
//! let container = Container::new();
//! container.register_class(
//!     ClassDef::new("GreetingService")
//!         .constructor(|_, _| Ok(value(GreetingService::default()))),
//! );
//! container.singleton("greeter", Concrete::class("GreetingService"));
//!
//! let greeter = container.make("greeter")?;
//! ```

mod class;

pub use class::{
    value, value_as, CallArgs, Callable, ClassDef, ClosureDef, ClosureFn, ConstructFn, MethodDef,
    MethodFn, ParamDef, ParamKind, Params, Value,
};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::error::FrameworkError;

/// Failure to resolve a type, constructor parameter or callable target.
///
/// Never retried: resolution either succeeds or fails deterministically,
/// and the error names the offending identifier.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// The concrete target has no registered class descriptor.
    #[error("Target class [{class}] does not exist.")]
    UnknownType { class: String },

    /// The target is an interface or otherwise cannot be built directly.
    #[error("Target class [{class}] is not instantiable.")]
    NotInstantiable { class: String },

    /// A constructor or method parameter could not be satisfied.
    #[error("Unresolvable dependency: parameter '{parameter}' of type '{declared_type}' in '{owner}'")]
    UnresolvableParameter {
        parameter: String,
        declared_type: String,
        owner: String,
    },

    /// The named method is not declared on the class descriptor.
    #[error("Method '{method}' is not defined on class [{class}]")]
    UnknownMethod { class: String, method: String },

    /// A resolved value did not downcast to the expected concrete type.
    #[error("Type mismatch for '{identifier}': expected {expected}")]
    TypeMismatch { identifier: String, expected: String },

    /// A callable string was not of the form `Class@method`.
    #[error("Malformed callable '{spec}': expected 'Class@method'")]
    BadCallable { spec: String },
}

/// How a binding produces its value: a factory closure, or the name of a
/// concrete class to build through its descriptor.
#[derive(Clone)]
pub enum Concrete {
    Factory(Arc<dyn Fn(&Container) -> Result<Value, ResolutionError> + Send + Sync>),
    Class(String),
}

impl Concrete {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&Container) -> Result<Value, ResolutionError> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(f))
    }

    pub fn class(name: &str) -> Self {
        Self::Class(name.to_string())
    }
}

impl From<&str> for Concrete {
    fn from(name: &str) -> Self {
        Self::class(name)
    }
}

#[derive(Clone)]
struct Binding {
    concrete: Concrete,
    shared: bool,
}

#[derive(Default)]
struct State {
    bindings: HashMap<String, Binding>,
    instances: HashMap<String, Value>,
    aliases: HashMap<String, String>,
    resolved: HashSet<String>,
    classes: HashMap<String, Arc<ClassDef>>,
}

/// The service container.
///
/// Interior mutability lets a single container be shared behind `Arc`
/// across the router, kernel and pipeline; registration normally happens
/// single-threaded at bootstrap.
pub struct Container {
    state: RwLock<State>,
}

impl Container {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a class descriptor so `build` and `call` can reach it.
    pub fn register_class(&self, def: ClassDef) {
        let mut state = self.write();
        state.classes.insert(def.name.clone(), Arc::new(def));
    }

    /// Bind a concrete implementation to an abstract identifier.
    ///
    /// Re-binding always overwrites ("last wins"). An already-resolved
    /// shared instance keeps its identity: the instance cache is consulted
    /// before bindings, so instances distributed earlier are never swapped
    /// out retroactively.
    pub fn bind(&self, abstract_id: &str, concrete: impl Into<Concrete>, shared: bool) {
        let mut state = self.write();
        state.bindings.insert(
            abstract_id.to_string(),
            Binding {
                concrete: concrete.into(),
                shared,
            },
        );
    }

    /// Bind a shared (singleton) concrete implementation.
    pub fn singleton(&self, abstract_id: &str, concrete: impl Into<Concrete>) {
        self.bind(abstract_id, concrete, true);
    }

    /// Register an existing instance as a shared singleton.
    ///
    /// Clears any alias or binding registered under the identifier and
    /// marks it resolved.
    pub fn instance(&self, abstract_id: &str, instance: Value) -> Value {
        let mut state = self.write();
        state.aliases.remove(abstract_id);
        state.bindings.remove(abstract_id);
        state
            .instances
            .insert(abstract_id.to_string(), instance.clone());
        state.resolved.insert(abstract_id.to_string());
        instance
    }

    /// Register an alias for an abstract identifier.
    ///
    /// `alias(abstract, name)` makes `make(name)` resolve `abstract`.
    pub fn alias(&self, abstract_id: &str, alias: &str) {
        let mut state = self.write();
        state
            .aliases
            .insert(alias.to_string(), abstract_id.to_string());
    }

    /// Dereference an alias; idempotent when no alias is registered.
    pub fn get_alias(&self, abstract_id: &str) -> String {
        self.read()
            .aliases
            .get(abstract_id)
            .cloned()
            .unwrap_or_else(|| abstract_id.to_string())
    }

    /// Resolve the given abstract identifier from the container.
    ///
    /// Aliases are dereferenced first, then the instance cache, then the
    /// binding's factory; an unbound identifier is treated as its own
    /// concrete target. Shared results are cached for future calls.
    pub fn make(&self, abstract_id: &str) -> Result<Value, ResolutionError> {
        self.make_with(abstract_id, Params::new())
    }

    /// [`make`](Self::make) with explicit named constructor parameters.
    ///
    /// Supplied parameters only participate when the target is built through
    /// a class descriptor; factories and cached instances ignore them.
    pub fn make_with(
        &self,
        abstract_id: &str,
        mut parameters: Params,
    ) -> Result<Value, ResolutionError> {
        let abstract_id = self.get_alias(abstract_id);

        if let Some(existing) = self.read().instances.get(&abstract_id) {
            return Ok(existing.clone());
        }

        let (concrete, shared) = match self.read().bindings.get(&abstract_id) {
            Some(binding) => (binding.concrete.clone(), binding.shared),
            None => (Concrete::Class(abstract_id.clone()), false),
        };

        let object = match concrete {
            Concrete::Class(name) => self.build_with(&name, &mut parameters)?,
            Concrete::Factory(factory) => factory(self)?,
        };

        let mut state = self.write();
        state.resolved.insert(abstract_id.clone());
        if shared {
            // Two threads can race to build an unbound shared target; the
            // first instance cached wins so singleton identity holds.
            return Ok(state.instances.entry(abstract_id).or_insert(object).clone());
        }

        Ok(object)
    }

    /// Instantiate a concrete class through its registered descriptor.
    ///
    /// Each declared parameter is satisfied by a supplied named parameter
    /// (consumed once), else its explicit default, else — when the
    /// parameter is a service type — resolved recursively via
    /// [`make`](Self::make), else the build fails naming the parameter,
    /// its declared type and the owning class.
    pub fn build(&self, concrete: &str) -> Result<Value, ResolutionError> {
        self.build_with(concrete, &mut Params::new())
    }

    fn build_with(
        &self,
        concrete: &str,
        parameters: &mut Params,
    ) -> Result<Value, ResolutionError> {
        let class =
            self.read()
                .classes
                .get(concrete)
                .cloned()
                .ok_or_else(|| ResolutionError::UnknownType {
                    class: concrete.to_string(),
                })?;

        if !class.instantiable {
            return Err(ResolutionError::NotInstantiable {
                class: class.name.clone(),
            });
        }

        let construct = class
            .construct
            .clone()
            .ok_or_else(|| ResolutionError::NotInstantiable {
                class: class.name.clone(),
            })?;

        let mut values = Vec::with_capacity(class.params.len());
        let mut names = Vec::with_capacity(class.params.len());
        for param in &class.params {
            let resolved = if let Some(supplied) = parameters.remove(&param.name) {
                supplied
            } else if let Some(default) = &param.default {
                default.clone()
            } else if param.kind == ParamKind::Service {
                self.make(&param.declared_type)?
            } else {
                return Err(ResolutionError::UnresolvableParameter {
                    parameter: param.name.clone(),
                    declared_type: param.declared_type.clone(),
                    owner: class.name.clone(),
                });
            };
            values.push(resolved);
            names.push(param.name.clone());
        }

        construct(self, CallArgs::new(values, names))
    }

    /// Call a closure or class method, injecting its dependencies.
    ///
    /// Each declared parameter is satisfied by a named entry in
    /// `parameters` (consumed once), else by type-based container
    /// resolution for service parameters, else by a declared default.
    /// Method targets are invoked against a container-resolved instance of
    /// the owning class.
    pub fn call(&self, callable: &Callable, parameters: Params) -> Result<Value, FrameworkError> {
        let mut parameters = parameters;
        match callable {
            Callable::Closure(def) => {
                let args = self.resolve_call_args(&def.params, &mut parameters, "closure")?;
                (def.body)(self, args)
            }
            Callable::Method { class, method } => {
                let class_def = self.read().classes.get(class).cloned().ok_or_else(|| {
                    ResolutionError::UnknownType {
                        class: class.clone(),
                    }
                })?;
                let method_def = class_def.methods.get(method).cloned().ok_or_else(|| {
                    ResolutionError::UnknownMethod {
                        class: class.clone(),
                        method: method.clone(),
                    }
                })?;

                let owner = format!("{}::{}", class, method);
                let args = self.resolve_call_args(&method_def.params, &mut parameters, &owner)?;
                let receiver = self.make(class)?;
                (method_def.body)(self, receiver, args)
            }
        }
    }

    fn resolve_call_args(
        &self,
        defs: &[ParamDef],
        parameters: &mut Params,
        owner: &str,
    ) -> Result<CallArgs, ResolutionError> {
        let mut values = Vec::with_capacity(defs.len());
        let mut names = Vec::with_capacity(defs.len());
        for param in defs {
            let resolved = if let Some(supplied) = parameters.remove(&param.name) {
                supplied
            } else if param.kind == ParamKind::Service {
                self.make(&param.declared_type)?
            } else if let Some(default) = &param.default {
                default.clone()
            } else {
                return Err(ResolutionError::UnresolvableParameter {
                    parameter: param.name.clone(),
                    declared_type: param.declared_type.clone(),
                    owner: owner.to_string(),
                });
            };
            values.push(resolved);
            names.push(param.name.clone());
        }
        Ok(CallArgs::new(values, names))
    }

    /// Whether the identifier has been resolved at least once.
    pub fn is_resolved(&self, abstract_id: &str) -> bool {
        let abstract_id = self.get_alias(abstract_id);
        self.read().resolved.contains(&abstract_id)
    }

    /// Whether a binding or cached instance exists for the identifier.
    pub fn has(&self, abstract_id: &str) -> bool {
        let abstract_id = self.get_alias(abstract_id);
        let state = self.read();
        state.bindings.contains_key(&abstract_id) || state.instances.contains_key(&abstract_id)
    }

    /// Flush all bindings, instances, aliases and resolution records.
    pub fn flush(&self) {
        let mut state = self.write();
        state.bindings.clear();
        state.instances.clear();
        state.aliases.clear();
        state.resolved.clear();
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Counter {
        id: u64,
    }

    fn register_counter(container: &Container) {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(0);
        container.register_class(ClassDef::new("Counter").constructor(|_, _| {
            Ok(value(Counter {
                id: NEXT.fetch_add(1, Ordering::SeqCst),
            }))
        }));
    }

    #[test]
    fn test_singleton_returns_identical_instance() {
        let container = Container::new();
        register_counter(&container);
        container.singleton("Counter", Concrete::class("Counter"));

        let a = container.make("Counter").unwrap();
        let b = container.make("Counter").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_non_shared_bind_returns_distinct_instances() {
        let container = Container::new();
        register_counter(&container);
        container.bind("Counter", Concrete::class("Counter"), false);

        let a = container.make("Counter").unwrap();
        let b = container.make("Counter").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        let a = value_as::<Counter>(&a, "Counter").unwrap();
        let b = value_as::<Counter>(&b, "Counter").unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_alias_is_transparent() {
        let container = Container::new();
        let x = value(String::from("the instance"));
        container.alias("a", "b");
        container.instance("a", x.clone());

        let resolved = container.make("b").unwrap();
        assert!(Arc::ptr_eq(&resolved, &x));
    }

    #[test]
    fn test_get_alias_is_idempotent_without_registration() {
        let container = Container::new();
        assert_eq!(container.get_alias("nothing"), "nothing");
    }

    #[test]
    fn test_unknown_type_error_names_the_target() {
        let container = Container::new();
        let err = container.make("MissingService").unwrap_err();
        assert!(err.to_string().contains("MissingService"));
    }

    #[test]
    fn test_interface_without_binding_is_not_instantiable() {
        let container = Container::new();
        container.register_class(ClassDef::interface("Mailer"));

        let err = container.make("Mailer").unwrap_err();
        match err {
            ResolutionError::NotInstantiable { class } => assert_eq!(class, "Mailer"),
            other => panic!("expected NotInstantiable, got {:?}", other),
        }
    }

    #[test]
    fn test_interface_bound_to_concrete_resolves() {
        let container = Container::new();
        container.register_class(ClassDef::interface("Mailer"));
        register_counter(&container);
        container.bind("Mailer", Concrete::class("Counter"), false);

        let resolved = container.make("Mailer").unwrap();
        assert!(value_as::<Counter>(&resolved, "Mailer").is_ok());
    }

    #[test]
    fn test_build_failure_names_parameter_type_and_owner() {
        let container = Container::new();
        container.register_class(
            ClassDef::new("ReportJob")
                .param(ParamDef::primitive("threshold", "u32"))
                .constructor(|_, _| Ok(value(()))),
        );

        let err = container.build("ReportJob").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("threshold"));
        assert!(message.contains("u32"));
        assert!(message.contains("ReportJob"));
    }

    #[test]
    fn test_build_injects_service_dependencies_recursively() {
        let container = Container::new();
        register_counter(&container);
        container.register_class(
            ClassDef::new("Greeter")
                .param(ParamDef::service("counter", "Counter"))
                .constructor(|_, args| {
                    let counter = args.get::<Counter>(0)?;
                    Ok(value(format!("greeter-{}", counter.id)))
                }),
        );

        let built = container.build("Greeter").unwrap();
        let label = value_as::<String>(&built, "Greeter").unwrap();
        assert!(label.starts_with("greeter-"));
    }

    #[test]
    fn test_build_uses_declared_default() {
        let container = Container::new();
        container.register_class(
            ClassDef::new("Paginator")
                .param(ParamDef::primitive("per_page", "usize").with_default(value(25usize)))
                .constructor(|_, args| {
                    let per_page = args.get::<usize>(0)?;
                    Ok(value(*per_page))
                }),
        );

        let built = container.build("Paginator").unwrap();
        assert_eq!(*value_as::<usize>(&built, "Paginator").unwrap(), 25);
    }

    #[test]
    fn test_make_with_supplies_primitive_parameters() {
        let container = Container::new();
        container.register_class(
            ClassDef::new("Signer")
                .param(ParamDef::primitive("secret", "String"))
                .constructor(|_, args| Ok(value(args.string(0)?))),
        );

        let mut params = Params::new();
        params.insert("secret".to_string(), value(String::from("s3cr3t")));
        let built = container.make_with("Signer", params).unwrap();
        assert_eq!(&*value_as::<String>(&built, "Signer").unwrap(), "s3cr3t");
    }

    #[test]
    fn test_concurrent_singleton_resolution_shares_one_instance() {
        use std::thread;
        use std::time::Duration;

        let container = Arc::new(Container::new());
        // A slow constructor so the builds overlap.
        container.register_class(ClassDef::new("Slow").constructor(|_, _| {
            thread::sleep(Duration::from_millis(20));
            Ok(value(String::from("built")))
        }));
        container.singleton("Slow", Concrete::class("Slow"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let container = container.clone();
                thread::spawn(move || container.make("Slow").unwrap())
            })
            .collect();
        let resolved: Vec<Value> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for other in &resolved[1..] {
            assert!(Arc::ptr_eq(&resolved[0], other));
        }
    }

    #[test]
    fn test_rebinding_keeps_already_resolved_shared_instance() {
        let container = Container::new();
        register_counter(&container);
        container.singleton("Counter", Concrete::class("Counter"));
        let first = container.make("Counter").unwrap();

        // Last-wins policy for bindings, but cached shared instances keep
        // the identity they were given.
        container.bind("Counter", Concrete::class("Counter"), true);
        let second = container.make("Counter").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_instance_clears_alias_and_binding() {
        let container = Container::new();
        register_counter(&container);
        container.alias("Counter", "shadowed");
        container.instance("shadowed", value(String::from("direct")));

        let resolved = container.make("shadowed").unwrap();
        assert_eq!(
            &*value_as::<String>(&resolved, "shadowed").unwrap(),
            "direct"
        );
        assert!(container.is_resolved("shadowed"));
    }

    #[test]
    fn test_call_resolves_named_typed_and_default_parameters() {
        let container = Container::new();
        register_counter(&container);
        container.register_class(
            ClassDef::new("ReportController")
                .constructor(|_, _| Ok(value(())))
                .method(
                    "show",
                    MethodDef::new(|_, _recv, args| {
                        let id = args.string(0)?;
                        let counter = args.get::<Counter>(1)?;
                        let format = args.string(2)?;
                        Ok(value(format!("{}:{}:{}", id, counter.id, format)))
                    })
                    .param(ParamDef::primitive("id", "String"))
                    .param(ParamDef::service("counter", "Counter"))
                    .param(
                        ParamDef::primitive("format", "String")
                            .with_default(value(String::from("html"))),
                    ),
                ),
        );

        let mut params = Params::new();
        params.insert("id".to_string(), value(String::from("42")));
        let out = container
            .call(&Callable::parse("ReportController@show").unwrap(), params)
            .unwrap();
        let out = value_as::<String>(&out, "show").unwrap();
        assert!(out.starts_with("42:"));
        assert!(out.ends_with(":html"));
    }

    #[test]
    fn test_call_unresolvable_parameter_errors() {
        let container = Container::new();
        container.register_class(
            ClassDef::new("Bare")
                .constructor(|_, _| Ok(value(())))
                .method(
                    "act",
                    MethodDef::new(|_, _, _| Ok(value(())))
                        .param(ParamDef::primitive("token", "String")),
                ),
        );

        let err = container
            .call(&Callable::method("Bare", "act"), Params::new())
            .unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_call_closure_with_named_parameter() {
        let container = Container::new();
        let callable = Callable::closure(
            ClosureDef::new(|_, args| {
                let name = args.string(0)?;
                Ok(value(format!("hello {}", name)))
            })
            .param(ParamDef::primitive("name", "String")),
        );

        let mut params = Params::new();
        params.insert("name".to_string(), value(String::from("trellis")));
        let out = container.call(&callable, params).unwrap();
        assert_eq!(
            &*value_as::<String>(&out, "closure").unwrap(),
            "hello trellis"
        );
    }

    #[test]
    fn test_malformed_callable_spec() {
        assert!(Callable::parse("NoSeparator").is_err());
        assert!(Callable::parse("@method").is_err());
        assert!(Callable::parse("Class@").is_err());
    }

    #[test]
    fn test_flush_clears_everything() {
        let container = Container::new();
        container.instance("config", value(1u8));
        container.alias("config", "cfg");
        container.flush();
        assert!(!container.has("config"));
        assert_eq!(container.get_alias("cfg"), "cfg");
    }
}
