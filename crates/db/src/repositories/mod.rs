//! Database repositories.

pub mod object;

pub use object::{ObjectRecord, ObjectRepository};
