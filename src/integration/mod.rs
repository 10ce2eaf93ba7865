//! Cross-module tests: shared fixtures and end-to-end scenarios driven
//! through the HTTP router.

pub mod fixtures;

mod e2e;
