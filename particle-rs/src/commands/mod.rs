//! Command implementations

pub mod compile;
pub mod generate;
pub mod info;
