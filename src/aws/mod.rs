//! Minimal AWS plumbing: credential resolution, SigV4 signing and a signed
//! POST client shared by the Cost Explorer and EC2 providers.

pub mod client;
pub mod credentials;
pub mod sigv4;

pub use client::{format_aws_error, AwsResponse, AwsServiceClient};
pub use credentials::{AwsCredentials, CredentialsProvider};
