//! HTTP route handlers.

pub mod albums;
pub mod ops;
pub mod orders;
