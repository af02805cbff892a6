//! Memo slots for scoped bindings.
//!
//! A slot is read without locking. On a miss the initializing thread takes
//! the slot's lock, checks again so that racing initializers collapse into
//! one, runs the computation, and publishes the result. Once published the
//! value never changes. A failed computation publishes nothing and the next
//! request retries.

use crate::error::RuntimeError;
use crate::factory::Instance;
use once_cell::sync::OnceCell;
use std::sync::{Mutex, PoisonError};

#[derive(Default)]
pub struct ScopedSlot {
    value: OnceCell<Instance>,
    lock: Mutex<()>,
}

impl ScopedSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The published value, if any.
    pub fn get(&self) -> Option<&Instance> {
        self.value.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.value.get().is_some()
    }

    /// Return the published value, computing it with `init` if there is none.
    ///
    /// `init` runs at most once per successful publication, under the slot
    /// lock. It must not request this same slot.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<Instance, RuntimeError>
    where
        F: FnOnce() -> Result<Instance, RuntimeError>,
    {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        // A panicking initializer published nothing, so the guard is still valid.
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        let value = init()?;
        Ok(self.value.get_or_init(|| value).clone())
    }
}

#[cfg(test)]
#[path = "../tests/slot_tests.rs"]
mod tests;
