//! Plan Execution
//!
//! Runs a [`givens_solver::BindingPlan`] without generated code: each
//! declaration the plan invokes is looked up by name in a [`FactoryTable`],
//! and each scope of the plan becomes a [`ScopeInstance`] at run time.
//!
//! - **Scoped nodes** are memoized once per scope instance in a
//!   [`ScopedSlot`] (double-checked initialization)
//! - **Unscoped nodes** are recomputed on every request
//! - **Eager nodes** are initialized while their scope instance is built
//! - **Providers and child components** become [`Function`] values

mod error;
mod factory;
mod instance;
mod slot;

pub use error::RuntimeError;
pub use factory::{
    Absent, Factory, FactoryError, FactoryTable, Function, Instance, arg, downcast, instance, is_absent,
    optional_arg,
};
pub use instance::{Runtime, ScopeInstance};
pub use slot::ScopedSlot;
