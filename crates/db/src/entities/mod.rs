//! Database entities.

pub mod ap_object;

pub use ap_object::Entity as ApObject;
