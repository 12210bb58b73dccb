//! Model registry loading.
//!
//! This module loads model files listed in a JSON manifest into the
//! read-only registry used by the ensemble.

pub mod builtin;
pub mod loader;

pub use loader::load_registry;
