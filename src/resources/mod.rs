//! Resource builders, one module per slice of the workload.
//!
//! Builders take the [`Stack`](crate::core::stack::Stack) plus the handles of
//! what they depend on, add their CloudFormation resources, and return a
//! handle for the next builder:
//! `VpcHandle -> ClusterHandle -> SecurityGroupHandle -> ServiceHandle`.

pub mod api;
pub mod cluster;
pub mod dashboard;
pub mod iam;
pub mod logs;
pub mod network;
pub mod registry;
pub mod security;
pub mod service;
pub mod task;
