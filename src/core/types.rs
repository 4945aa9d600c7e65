//! WT-001: Workload configuration types.
//!
//! Defines the YAML schema for a workload: cluster, container, registry,
//! service, network, logging, rollout, and API exposure. All types derive
//! Serialize/Deserialize for YAML roundtripping and JsonSchema for `ecsynth schema`.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Top-level workload.yaml
// ============================================================================

/// Root configuration: one workload, synthesized into one stack.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkloadConfig {
    /// Stack and environment settings
    #[serde(default)]
    pub app: AppSettings,

    /// ECS cluster
    pub cluster: ClusterSpec,

    /// The single application container
    pub container: ContainerSpec,

    /// Image source
    pub registry: RegistrySpec,

    /// Service replica settings
    #[serde(alias = "fargate_service")]
    pub service: ServiceSpec,

    /// Network layout
    #[serde(default)]
    pub vpc: VpcSpec,

    /// Front the service with a load balancer and an HTTP API
    #[serde(default)]
    pub expose_api: bool,

    /// Container log settings
    #[serde(default)]
    pub logger: Option<LoggerSpec>,

    /// Deployment controller, passed through unmodified
    #[serde(default)]
    pub rollout_strategy: Option<DeploymentControllerType>,

    /// Informational; the dashboard is always created
    #[serde(default)]
    pub create_dashboard: Option<bool>,

    /// Plain environment variables for the container
    #[serde(default)]
    pub environment: IndexMap<String, String>,

    /// Environment variables resolved from Secrets Manager JSON fields
    /// (load-balanced service only)
    #[serde(default = "default_secret_environment")]
    pub secret_environment: Vec<SecretEnvVar>,

    /// HTTP API routing
    #[serde(default)]
    pub api: ApiSpec,
}

// ============================================================================
// App / stack
// ============================================================================

/// Stack identity and target environment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AppSettings {
    /// CloudFormation stack name (also the output file stem)
    #[serde(default = "default_stack_name")]
    pub stack_name: String,

    /// Id of the workload scope; prefixes every logical ID
    #[serde(default = "default_construct_id")]
    pub construct_id: String,

    /// Target region (informational, recorded in the manifest)
    #[serde(default)]
    pub region: Option<String>,

    /// Target account (informational, recorded in the manifest)
    #[serde(default)]
    pub account: Option<String>,

    /// Template description
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            stack_name: default_stack_name(),
            construct_id: default_construct_id(),
            region: None,
            account: None,
            description: None,
        }
    }
}

fn default_stack_name() -> String {
    "MyStack".to_string()
}

fn default_construct_id() -> String {
    "workloadConstruct".to_string()
}

// ============================================================================
// Cluster
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClusterSpec {
    /// Cluster name
    pub name: String,

    /// Capacity mode
    #[serde(rename = "type")]
    pub cluster_type: ClusterType,
}

/// Cluster capacity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    /// Serverless tasks
    Fargate,
    /// Tasks on an auto-scaled pool of instances
    Ec2,
}

impl ClusterType {
    /// ECS launch type for services on this cluster.
    pub fn launch_type(self) -> &'static str {
        match self {
            Self::Fargate => "FARGATE",
            Self::Ec2 => "EC2",
        }
    }
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fargate => write!(f, "fargate"),
            Self::Ec2 => write!(f, "ec2"),
        }
    }
}

// ============================================================================
// Container / registry
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContainerSpec {
    /// Container name
    pub name: String,

    /// Port the application listens on; the only ingress port opened
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegistrySpec {
    /// Image reference, e.g. `org/app:tag`
    pub image: String,

    /// Registry visibility
    #[serde(rename = "type", alias = "visibility", default)]
    pub visibility: RegistryVisibility,

    /// Secrets Manager secret name holding pull credentials
    #[serde(default)]
    pub secret_name: Option<String>,

    /// Full ARN of the pull credential secret
    #[serde(default)]
    pub secret_arn: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RegistryVisibility {
    #[default]
    Public,
    Private,
}

// ============================================================================
// Service
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ServiceSpec {
    /// ECS service name
    #[serde(alias = "service_name")]
    pub name: String,

    /// Replica target
    pub desired_count: u32,

    /// Give each task a public IP (and place it in public subnets)
    #[serde(default)]
    pub assign_public_ip: bool,
}

/// Deployment controller kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentControllerType {
    Ecs,
    CodeDeploy,
    External,
}

impl DeploymentControllerType {
    /// CloudFormation `DeploymentController.Type` value.
    pub fn as_cfn(self) -> &'static str {
        match self {
            Self::Ecs => "ECS",
            Self::CodeDeploy => "CODE_DEPLOY",
            Self::External => "EXTERNAL",
        }
    }
}

/// Env var whose value comes from a JSON field of a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SecretEnvVar {
    /// Variable name inside the container
    pub name: String,

    /// Secrets Manager secret name
    pub secret_name: String,

    /// JSON key inside the secret string
    pub field: String,
}

/// `APPLICATION_NAME` from the `name` field of the `appName` secret.
pub fn default_secret_environment() -> Vec<SecretEnvVar> {
    vec![SecretEnvVar {
        name: "APPLICATION_NAME".to_string(),
        secret_name: "appName".to_string(),
        field: "name".to_string(),
    }]
}

// ============================================================================
// Network
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct VpcSpec {
    /// Value of the VPC `Name` tag
    #[serde(default)]
    pub name: Option<String>,

    /// Tier to build when `single_tier` is set
    #[serde(default)]
    pub subnet: Option<SubnetVisibility>,

    /// Build only the `subnet` tier instead of public + private
    #[serde(default)]
    pub single_tier: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubnetVisibility {
    #[default]
    Public,
    Private,
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LoggerSpec {
    /// Attach the awslogs driver to the container
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Log group retention
    #[serde(default)]
    pub retention_days: Option<RetentionDays>,
}

/// CloudWatch Logs retention periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RetentionDays {
    OneDay,
    ThreeDays,
    FiveDays,
    OneWeek,
    TwoWeeks,
    OneMonth,
    TwoMonths,
    ThreeMonths,
    FourMonths,
    FiveMonths,
    SixMonths,
    OneYear,
    ThirteenMonths,
    EighteenMonths,
    TwoYears,
    ThreeYears,
    FiveYears,
    SixYears,
    SevenYears,
    EightYears,
    NineYears,
    TenYears,
    Infinite,
}

impl RetentionDays {
    /// `RetentionInDays` value; `None` means never expire.
    pub fn days(self) -> Option<u32> {
        let days = match self {
            Self::OneDay => 1,
            Self::ThreeDays => 3,
            Self::FiveDays => 5,
            Self::OneWeek => 7,
            Self::TwoWeeks => 14,
            Self::OneMonth => 30,
            Self::TwoMonths => 60,
            Self::ThreeMonths => 90,
            Self::FourMonths => 120,
            Self::FiveMonths => 150,
            Self::SixMonths => 180,
            Self::OneYear => 365,
            Self::ThirteenMonths => 400,
            Self::EighteenMonths => 545,
            Self::TwoYears => 731,
            Self::ThreeYears => 1096,
            Self::FiveYears => 1827,
            Self::SixYears => 2192,
            Self::SevenYears => 2557,
            Self::EightYears => 2922,
            Self::NineYears => 3288,
            Self::TenYears => 3653,
            Self::Infinite => return None,
        };
        Some(days)
    }
}

// ============================================================================
// API
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
pub struct ApiSpec {
    /// Route shape
    #[serde(default)]
    pub route: ApiRoute,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApiRoute {
    /// `ANY /`
    #[default]
    Root,
    /// `ANY /{proxy+}`
    Proxy,
}

impl ApiRoute {
    pub fn route_key(self) -> &'static str {
        match self {
            Self::Root => "ANY /",
            Self::Proxy => "ANY /{proxy+}",
        }
    }
}

// ============================================================================
// Fixed sizing
// ============================================================================

/// CPU/memory reservation. Not configurable from the workload file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSizing {
    pub memory_mib: u32,
    pub cpu: u32,
}

impl TaskSizing {
    pub const FIXED: Self = Self {
        memory_mib: 512,
        cpu: 256,
    };
}

// ============================================================================
// Tests
// ============================================================================
