//! External function binding bookkeeping
//!
//! The engine owns the actual callables; the bridge tracks which names are
//! live so that rebinding a bound name fails fast instead of silently
//! overwriting. The bare name is the uniqueness key: the callback signature
//! is variadic, so arity overloading cannot arise.

use std::collections::HashSet;

use crate::error::{PlayerError, PlayerResult};

/// Names of currently bound external functions.
#[derive(Debug, Default)]
pub(crate) struct FunctionRegistry {
    bound: HashSet<String>,
}

impl FunctionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claim a name before forwarding the bind to the engine.
    pub(crate) fn claim(&mut self, name: &str) -> PlayerResult<()> {
        if !self.bound.insert(name.to_string()) {
            return Err(PlayerError::DuplicateBinding(name.to_string()));
        }
        Ok(())
    }

    /// Roll back a claim when the engine rejected the bind.
    pub(crate) fn release_claim(&mut self, name: &str) {
        self.bound.remove(name);
    }

    /// Release a name after unbinding.
    pub(crate) fn release(&mut self, name: &str) {
        self.bound.remove(name);
    }

    /// Drop all claims; used when the execution they belong to goes away.
    pub(crate) fn clear(&mut self) {
        self.bound.clear();
    }
}
