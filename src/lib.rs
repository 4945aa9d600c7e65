//! ecsynth — synthesize CloudFormation templates for containerized ECS workloads.
//!
//! One YAML workload in, one checked template out: VPC, ECS cluster,
//! security boundary, task definition and service, plus an optional
//! load balancer and HTTP API, and a CloudWatch dashboard.

pub mod cli;
pub mod core;
pub mod resources;
