//! WT-015: Task definition and container builder.
//!
//! One task definition per workload, holding exactly one container sized at
//! [`TaskSizing::FIXED`]. Roles are created alongside: a task role always, an
//! execution role only when the container needs to write logs or pull with
//! credentials.

use super::cluster::ClusterHandle;
use super::iam;
use super::logs::{self, AwsLogDriver, DEFAULT_RETENTION};
use super::registry::{self, ContainerImage};
use crate::core::error::SynthError;
use crate::core::stack::Stack;
use crate::core::template::{get_att, CfnResource};
use crate::core::types::{ClusterType, TaskSizing, WorkloadConfig};
use serde_json::{json, Value};

/// Port mapped on the bare-service container. The configured container port
/// only drives the security group; this mapping stays at 80.
pub const BARE_CONTAINER_PORT_MAPPING: u16 = 80;

pub const BARE_STREAM_PREFIX: &str = "my-container";

const TASK_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Everything needed to render the single container definition.
#[derive(Debug, Clone)]
pub struct ContainerOptions {
    pub name: String,
    pub image: ContainerImage,
    pub port_mapping: u16,
    pub log_driver: Option<AwsLogDriver>,
    /// `{"Name": .., "Value": ..}` entries, in declaration order
    pub environment: Vec<Value>,
}

impl ContainerOptions {
    fn definition(&self, sizing: TaskSizing) -> Value {
        let mut def = json!({
            "Cpu": sizing.cpu,
            "Essential": true,
            "Image": self.image.image(),
            "Memory": sizing.memory_mib,
            "Name": self.name,
            "PortMappings": [{"ContainerPort": self.port_mapping, "Protocol": "tcp"}],
        });
        if let Some(driver) = &self.log_driver {
            def["LogConfiguration"] = driver.log_configuration();
        }
        if let Some(creds) = self.image.repository_credentials() {
            def["RepositoryCredentials"] = creds;
        }
        if !self.environment.is_empty() {
            def["Environment"] = Value::Array(self.environment.clone());
        }
        def
    }
}

/// `Environment` entry.
pub fn env_var(name: &str, value: Value) -> Value {
    json!({"Name": name, "Value": value})
}

/// The constructed task definition.
#[derive(Debug, Clone)]
pub struct TaskDefinitionHandle {
    pub task_definition_id: String,
    pub compatibility: ClusterType,
    pub container_name: String,
    pub container_port: u16,
    pub task_role_id: String,
    pub execution_role_id: Option<String>,
}

/// Build a task definition at `path` compatible with `compatibility`.
pub fn build_task_definition(
    stack: &mut Stack,
    path: &[&str],
    compatibility: ClusterType,
    container: &ContainerOptions,
) -> Result<TaskDefinitionHandle, SynthError> {
    let sizing = TaskSizing::FIXED;

    let mut task_role_path = path.to_vec();
    task_role_path.push("TaskRole");
    let task_role_id = iam::build_role(stack, &task_role_path, TASK_PRINCIPAL)?;

    let mut statements = Vec::new();
    if let Some(driver) = &container.log_driver {
        statements.push(iam::allow(
            &["logs:CreateLogStream", "logs:PutLogEvents"],
            get_att(&driver.log_group_id, "Arn"),
        ));
    }
    if let Some(secret) = container.image.credentials() {
        statements.push(iam::allow(
            &["secretsmanager:DescribeSecret", "secretsmanager:GetSecretValue"],
            secret.policy_resource(),
        ));
    }

    let mut execution_role_id = None;
    let mut execution_policy_id = None;
    if !statements.is_empty() {
        let mut exec_path = path.to_vec();
        exec_path.push("ExecutionRole");
        let role = iam::build_role(stack, &exec_path, TASK_PRINCIPAL)?;
        execution_policy_id = iam::build_default_policy(stack, &exec_path, &role, statements)?;
        execution_role_id = Some(role);
    }

    let family = stack.logical_id(path);
    let mut properties = json!({
        "ContainerDefinitions": [container.definition(sizing)],
        "Family": family,
        "NetworkMode": "awsvpc",
        "RequiresCompatibilities": [compatibility.launch_type()],
        "TaskRoleArn": get_att(&task_role_id, "Arn"),
    });
    match compatibility {
        ClusterType::Fargate => {
            properties["Cpu"] = json!(sizing.cpu.to_string());
            properties["Memory"] = json!(sizing.memory_mib.to_string());
        }
        ClusterType::Ec2 => {}
    }
    if let Some(role) = &execution_role_id {
        properties["ExecutionRoleArn"] = get_att(role, "Arn");
    }

    let mut resource = CfnResource::new("AWS::ECS::TaskDefinition", properties);
    if let Some(policy) = &execution_policy_id {
        resource = resource.depends_on(policy);
    }
    let task_definition_id = stack.add_resource(path, resource)?;

    tracing::debug!(task_definition = %task_definition_id, kind = %compatibility, "built task definition");
    Ok(TaskDefinitionHandle {
        task_definition_id,
        compatibility,
        container_name: container.name.clone(),
        container_port: container.port_mapping,
        task_role_id,
        execution_role_id,
    })
}

/// Task definition for the bare (non-load-balanced) service.
///
/// A log group is always created; the awslogs driver is attached only when
/// `logger.enabled` is true.
pub fn build_bare_task(
    stack: &mut Stack,
    config: &WorkloadConfig,
    cluster: &ClusterHandle,
) -> Result<TaskDefinitionHandle, SynthError> {
    let logger = config.logger.clone().unwrap_or_default();
    let retention = logger.retention_days.unwrap_or(DEFAULT_RETENTION);
    let log_group_id = logs::build_log_group(stack, &["LogGroup"], retention)?;

    let log_driver = logger.enabled.unwrap_or(false).then(|| AwsLogDriver {
        log_group_id,
        stream_prefix: BARE_STREAM_PREFIX.to_string(),
    });

    let environment = config
        .environment
        .iter()
        .map(|(name, value)| env_var(name, json!(value)))
        .collect();

    let container = ContainerOptions {
        name: config.container.name.clone(),
        image: registry::resolve_image(&config.registry),
        port_mapping: BARE_CONTAINER_PORT_MAPPING,
        log_driver,
        environment,
    };

    build_task_definition(stack, &["ECSDesignTask"], cluster.cluster_type, &container)
}
