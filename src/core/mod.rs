//! Runtime machinery: traversal, choice compilation, content rendering,
//! quality mutation, and the deterministic random source.

pub mod choices;
pub mod compiler;
pub mod engine;
pub mod qualities;
pub mod random;
pub mod signals;
