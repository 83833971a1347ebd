//! CLI commands

pub mod expand;
pub mod helm_values;
