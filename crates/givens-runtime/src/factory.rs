//! Values and the factories that produce them.

use crate::error::RuntimeError;
use givens_solver::{FqName, TypeRef};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A value produced by the plan. Consumers downcast to the concrete type.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Error type factories report; wrapped into [`RuntimeError::FactoryFailed`].
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Invokes one declaration. Receives the declaration's parameters in order,
/// with assisted parameters in their declared positions.
pub type Factory = Arc<dyn Fn(&[Instance]) -> Result<Instance, FactoryError> + Send + Sync>;

/// Value of a nullable request with no binding, or of an optional parameter
/// whose default should be used.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Absent;

pub fn instance<T: Any + Send + Sync>(value: T) -> Instance {
    Arc::new(value)
}

pub fn is_absent(value: &Instance) -> bool {
    value.is::<Absent>()
}

/// Downcast a value, reporting the expected type on mismatch.
pub fn downcast<T: Any + Send + Sync>(value: Instance) -> Result<Arc<T>, RuntimeError> {
    value
        .downcast::<T>()
        .map_err(|_| RuntimeError::mismatch::<T>("a value of another type"))
}

/// Positional argument `index` of a factory call, downcast to `T`.
pub fn arg<T: Any + Send + Sync>(args: &[Instance], index: usize) -> Result<Arc<T>, FactoryError> {
    let Some(value) = args.get(index) else {
        return Err(format!("missing argument {index}").into());
    };
    Ok(downcast::<T>(value.clone())?)
}

/// Like [`arg`], but `None` when the argument is [`Absent`].
pub fn optional_arg<T: Any + Send + Sync>(args: &[Instance], index: usize) -> Result<Option<Arc<T>>, FactoryError> {
    match args.get(index) {
        Some(value) if is_absent(value) => Ok(None),
        Some(_) => arg(args, index).map(Some),
        None => Ok(None),
    }
}

/// A callable value: providers, assisted factories, child component
/// factories, function aliases, and intercepted factories.
#[derive(Clone)]
pub struct Function {
    arity: usize,
    call: Arc<dyn Fn(&[Instance]) -> Result<Instance, RuntimeError> + Send + Sync>,
}

impl Function {
    pub fn new<F>(arity: usize, call: F) -> Self
    where
        F: Fn(&[Instance]) -> Result<Instance, RuntimeError> + Send + Sync + 'static,
    {
        Self {
            arity,
            call: Arc::new(call),
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn invoke(&self, args: &[Instance]) -> Result<Instance, RuntimeError> {
        if args.len() != self.arity {
            return Err(RuntimeError::TypeMismatch {
                expected: format!("{} arguments", self.arity),
                found: format!("{} arguments", args.len()),
            });
        }
        (self.call)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("arity", &self.arity).finish()
    }
}

/// Factories by declaration name, plus the instances of object bindings.
#[derive(Clone, Default)]
pub struct FactoryTable {
    factories: FxHashMap<FqName, Factory>,
    objects: FxHashMap<TypeRef, Instance>,
}

impl FactoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, origin: impl Into<FqName>, factory: F) -> &mut Self
    where
        F: Fn(&[Instance]) -> Result<Instance, FactoryError> + Send + Sync + 'static,
    {
        self.factories.insert(origin.into(), Arc::new(factory));
        self
    }

    /// Register the singleton instance of an object classifier.
    pub fn object(&mut self, type_ref: TypeRef, value: Instance) -> &mut Self {
        self.objects.insert(type_ref, value);
        self
    }

    pub fn factory(&self, origin: &FqName) -> Option<&Factory> {
        self.factories.get(origin)
    }

    pub fn object_instance(&self, type_ref: &TypeRef) -> Option<&Instance> {
        self.objects.get(type_ref)
    }

    /// Invoke the factory of `origin`.
    pub fn call(&self, origin: &FqName, args: &[Instance]) -> Result<Instance, RuntimeError> {
        let Some(factory) = self.factories.get(origin) else {
            return Err(RuntimeError::MissingFactory { origin: origin.clone() });
        };
        factory(args).map_err(|source| RuntimeError::FactoryFailed {
            origin: origin.clone(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
#[path = "../tests/factory_tests.rs"]
mod tests;
