//! CLI command implementations

pub mod health;
pub mod status;
pub mod validate;
