//! Storyweave — a deterministic state-machine engine for interactive fiction.
//!
//! Walks an authored scene graph, compiling choices and content against live
//! player state, with seedable randomness so any playthrough can be
//! reproduced or resumed from a serialized snapshot.

pub mod core;
pub mod display;
pub mod loader;
pub mod schema;
