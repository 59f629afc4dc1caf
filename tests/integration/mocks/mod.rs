#![allow(dead_code, unused_imports)]

pub mod cost_explorer_mock;
pub mod ec2_mock;

pub use cost_explorer_mock::{cost_and_usage_payload, mount_cost_explorer_error, mount_cost_explorer_ok};
pub use ec2_mock::{mount_describe_instances_page, mount_ec2_error, mount_terminate_ok};
