pub mod config;
pub mod instances;
pub mod start;
