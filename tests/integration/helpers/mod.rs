#![allow(dead_code, unused_imports)]

pub mod test_config;

pub use test_config::{build_test_state, create_test_config, read_json, TestState};
