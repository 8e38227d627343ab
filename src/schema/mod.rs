//! Plain data types: the game definition, content trees, the serializable
//! game state, and the callable signatures the definition carries.

pub mod callable;
pub mod content;
pub mod game;
pub mod state;
