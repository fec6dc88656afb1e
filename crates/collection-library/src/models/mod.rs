//! Data types for library entities and per-user state.
//!
//! These are plain snapshots: the engine never mutates them, it only reads
//! them through its own adapter views.

mod entity;
mod user;

pub use entity::*;
pub use user::*;
