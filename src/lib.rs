//! Flow step-graph model and its structural normalization.
//!
//! A flow is a trigger followed by steps: leaf actions, routers (multi-way
//! branches) and loops. Legacy records store the steps as a pointer-chained
//! tree (`dsl`); canonical records store every step once in a flat arena and
//! express structure through ordered name lists (`flow`).
//!
//! The `compiler` module converts between the two: the `Normalizer` flattens,
//! the `Validator` checks the flat invariants, and the `Expander` rebuilds the
//! legacy view. `migration` gates the flattening on `schemaVersion` so that a
//! record is flattened at most once.

pub mod compiler;
pub mod dsl;
pub mod error;
pub mod flow;
pub mod migration;

pub use compiler::expander::Expander;
pub use compiler::normalizer::Normalizer;
pub use compiler::validator::Validator;
pub use error::{Invariant, MigrationError, StructuralIntegrityError};
