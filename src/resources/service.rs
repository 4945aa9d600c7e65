//! WT-016: ECS service builders.
//!
//! Two entry points, one per branch of the workload:
//! - [`build_exposed_service`]: Fargate clusters get an application
//!   load-balanced service; EC2 clusters get a plain EC2 service. The
//!   workload security group is attached either way.
//! - [`build_bare_service`]: a service around an existing task definition,
//!   with its own default security group and no load balancer.

use super::cluster::ClusterHandle;
use super::logs::{self, AwsLogDriver};
use super::network::VpcHandle;
use super::registry::{self, SecretRef};
use super::security::{allow_all_outbound, SecurityGroupHandle};
use super::task::{self, ContainerOptions, TaskDefinitionHandle};
use crate::core::error::SynthError;
use crate::core::stack::Stack;
use crate::core::template::{get_att, join, reference, CfnResource, Output};
use crate::core::types::{ClusterType, RetentionDays, WorkloadConfig};
use serde_json::{json, Value};

pub const EXPOSED_STREAM_PREFIX: &str = "ECSLog";
pub const LISTENER_PORT: u16 = 80;
pub const HEALTH_CHECK_GRACE_SECONDS: u32 = 60;

/// A service fronted by an application load balancer.
#[derive(Debug, Clone)]
pub struct LoadBalancedService {
    pub service_id: String,
    pub cluster_id: String,
    pub load_balancer_id: String,
    pub listener_id: String,
    pub target_group_id: String,
    pub task: TaskDefinitionHandle,
}

/// A service without a load balancer.
#[derive(Debug, Clone)]
pub struct BareService {
    pub service_id: String,
    pub cluster_id: String,
    pub task: TaskDefinitionHandle,
}

/// The constructed service, by kind.
#[derive(Debug, Clone)]
pub enum ServiceHandle {
    LoadBalanced(LoadBalancedService),
    Fargate(BareService),
    Ec2(BareService),
}

impl ServiceHandle {
    pub fn service_id(&self) -> &str {
        match self {
            Self::LoadBalanced(s) => &s.service_id,
            Self::Fargate(s) | Self::Ec2(s) => &s.service_id,
        }
    }

    pub fn cluster_id(&self) -> &str {
        match self {
            Self::LoadBalanced(s) => &s.cluster_id,
            Self::Fargate(s) | Self::Ec2(s) => &s.cluster_id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::LoadBalanced(_) => "load-balanced fargate service",
            Self::Fargate(_) => "fargate service",
            Self::Ec2(_) => "ec2 service",
        }
    }
}

/// Properties shared by every service kind.
fn service_properties(
    config: &WorkloadConfig,
    cluster: &ClusterHandle,
    task: &TaskDefinitionHandle,
    security_groups: Vec<Value>,
) -> Value {
    let subnets = cluster.vpc.task_subnets(config.service.assign_public_ip);
    let assign_public_ip = if config.service.assign_public_ip {
        "ENABLED"
    } else {
        "DISABLED"
    };

    let mut props = json!({
        "Cluster": reference(&cluster.cluster_id),
        "DeploymentConfiguration": {
            "MaximumPercent": 200,
            "MinimumHealthyPercent": 50,
        },
        "DesiredCount": config.service.desired_count,
        "EnableECSManagedTags": false,
        "LaunchType": cluster.cluster_type.launch_type(),
        "NetworkConfiguration": {
            "AwsvpcConfiguration": {
                "AssignPublicIp": assign_public_ip,
                "SecurityGroups": security_groups,
                "Subnets": VpcHandle::subnet_refs(subnets),
            },
        },
        "ServiceName": config.service.name,
        "TaskDefinition": reference(&task.task_definition_id),
    });
    if let Some(strategy) = config.rollout_strategy {
        props["DeploymentController"] = json!({"Type": strategy.as_cfn()});
    }
    props
}

fn wrap(cluster_type: ClusterType, service: BareService) -> ServiceHandle {
    match cluster_type {
        ClusterType::Fargate => ServiceHandle::Fargate(service),
        ClusterType::Ec2 => ServiceHandle::Ec2(service),
    }
}

/// Service around `task` with its own egress-only security group.
pub fn build_bare_service(
    stack: &mut Stack,
    config: &WorkloadConfig,
    cluster: &ClusterHandle,
    task: TaskDefinitionHandle,
) -> Result<ServiceHandle, SynthError> {
    let description = stack.node_path(&["Service", "SecurityGroup"]);
    let own_sg = stack.add_resource(
        &["Service", "SecurityGroup"],
        CfnResource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": description,
                "SecurityGroupEgress": allow_all_outbound(),
                "VpcId": reference(&cluster.vpc.vpc_id),
            }),
        ),
    )?;

    let props = service_properties(config, cluster, &task, vec![get_att(&own_sg, "GroupId")]);
    let service_id = stack.add_resource(
        &["Service", "Service"],
        CfnResource::new("AWS::ECS::Service", props).depends_on(&task.task_role_id),
    )?;

    tracing::debug!(service = %service_id, kind = %cluster.cluster_type, "built bare service");
    Ok(wrap(
        cluster.cluster_type,
        BareService {
            service_id,
            cluster_id: cluster.cluster_id.clone(),
            task,
        },
    ))
}

/// Container for the exposed branch: configured port, logging forced on,
/// plain and secret-backed environment.
fn exposed_container(
    stack: &mut Stack,
    config: &WorkloadConfig,
    task_path: &[&str],
) -> Result<ContainerOptions, SynthError> {
    let retention = config
        .logger
        .as_ref()
        .and_then(|l| l.retention_days)
        .unwrap_or(RetentionDays::Infinite);
    let mut log_path = task_path.to_vec();
    log_path.extend(["web", "LogGroup"]);
    let log_group_id = logs::build_log_group(stack, &log_path, retention)?;

    let mut environment: Vec<Value> = config
        .environment
        .iter()
        .map(|(name, value)| task::env_var(name, json!(value)))
        .collect();
    for var in &config.secret_environment {
        let secret = SecretRef::Name(var.secret_name.clone());
        environment.push(task::env_var(&var.name, secret.json_field(&var.field)));
    }

    Ok(ContainerOptions {
        name: config.container.name.clone(),
        image: registry::resolve_image(&config.registry),
        port_mapping: config.container.port,
        log_driver: Some(AwsLogDriver {
            log_group_id,
            stream_prefix: EXPOSED_STREAM_PREFIX.to_string(),
        }),
        environment,
    })
}

/// Service for the exposed branch, shaped by the cluster type.
pub fn build_exposed_service(
    stack: &mut Stack,
    config: &WorkloadConfig,
    cluster: &ClusterHandle,
    security_group: &SecurityGroupHandle,
) -> Result<ServiceHandle, SynthError> {
    let task_path = ["Service", "TaskDef"];
    let container = exposed_container(stack, config, &task_path)?;
    let task = task::build_task_definition(stack, &task_path, cluster.cluster_type, &container)?;

    match cluster.cluster_type {
        ClusterType::Fargate => build_load_balanced(stack, config, cluster, security_group, task),
        ClusterType::Ec2 => {
            let props = service_properties(
                config,
                cluster,
                &task,
                vec![get_att(&security_group.group_id, "GroupId")],
            );
            let service_id = stack.add_resource(
                &["Service", "Service"],
                CfnResource::new("AWS::ECS::Service", props).depends_on(&task.task_role_id),
            )?;
            tracing::debug!(service = %service_id, "built exposed ec2 service without load balancer");
            Ok(ServiceHandle::Ec2(BareService {
                service_id,
                cluster_id: cluster.cluster_id.clone(),
                task,
            }))
        }
    }
}

fn build_load_balanced(
    stack: &mut Stack,
    config: &WorkloadConfig,
    cluster: &ClusterHandle,
    security_group: &SecurityGroupHandle,
    task: TaskDefinitionHandle,
) -> Result<ServiceHandle, SynthError> {
    let vpc = &cluster.vpc;
    let port = task.container_port;

    let lb_sg_description = format!(
        "Automatically created Security Group for ELB {}",
        stack.logical_id(&["Service", "LB"])
    );
    let lb_sg = stack.add_resource(
        &["Service", "LB", "SecurityGroup"],
        CfnResource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": lb_sg_description,
                "SecurityGroupEgress": [{
                    "CidrIp": "255.255.255.255/32",
                    "Description": "Disallow all traffic",
                    "FromPort": 252,
                    "IpProtocol": "icmp",
                    "ToPort": 86,
                }],
                "SecurityGroupIngress": [{
                    "CidrIp": "0.0.0.0/0",
                    "Description": format!("Allow from anyone on port {}", LISTENER_PORT),
                    "FromPort": LISTENER_PORT,
                    "IpProtocol": "tcp",
                    "ToPort": LISTENER_PORT,
                }],
                "VpcId": reference(&vpc.vpc_id),
            }),
        ),
    )?;

    let public_subnets = vpc.public_subnets().unwrap_or_else(|| vpc.task_subnets(true));
    let mut lb = CfnResource::new(
        "AWS::ElasticLoadBalancingV2::LoadBalancer",
        json!({
            "LoadBalancerAttributes": [{"Key": "deletion_protection.enabled", "Value": "false"}],
            "Scheme": "internet-facing",
            "SecurityGroups": [get_att(&lb_sg, "GroupId")],
            "Subnets": VpcHandle::subnet_refs(public_subnets),
            "Type": "application",
        }),
    );
    for route in &vpc.internet_routes {
        lb = lb.depends_on(route);
    }
    let load_balancer_id = stack.add_resource(&["Service", "LB"], lb)?;

    let target_group_id = stack.add_resource(
        &["Service", "LB", "PublicListener", "ECSGroup"],
        CfnResource::new(
            "AWS::ElasticLoadBalancingV2::TargetGroup",
            json!({
                "Port": LISTENER_PORT,
                "Protocol": "HTTP",
                "TargetGroupAttributes": [{"Key": "stickiness.enabled", "Value": "false"}],
                "TargetType": "ip",
                "VpcId": reference(&vpc.vpc_id),
            }),
        ),
    )?;

    let listener_id = stack.add_resource(
        &["Service", "LB", "PublicListener"],
        CfnResource::new(
            "AWS::ElasticLoadBalancingV2::Listener",
            json!({
                "DefaultActions": [{"TargetGroupArn": reference(&target_group_id), "Type": "forward"}],
                "LoadBalancerArn": reference(&load_balancer_id),
                "Port": LISTENER_PORT,
                "Protocol": "HTTP",
            }),
        ),
    )?;

    let service_sg_description = stack.node_path(&["Service", "Service", "SecurityGroup"]);
    let service_sg = stack.add_resource(
        &["Service", "Service", "SecurityGroup"],
        CfnResource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": service_sg_description,
                "SecurityGroupEgress": allow_all_outbound(),
                "VpcId": reference(&vpc.vpc_id),
            }),
        ),
    )?;

    let ingress_name = format!("from {}:{}", lb_sg, port);
    stack.add_resource(
        &["Service", "Service", "SecurityGroup", ingress_name.as_str()],
        CfnResource::new(
            "AWS::EC2::SecurityGroupIngress",
            json!({
                "Description": "Load balancer to target",
                "FromPort": port,
                "GroupId": get_att(&service_sg, "GroupId"),
                "IpProtocol": "tcp",
                "SourceSecurityGroupId": get_att(&lb_sg, "GroupId"),
                "ToPort": port,
            }),
        ),
    )?;
    let egress_name = format!("to {}:{}", service_sg, port);
    stack.add_resource(
        &["Service", "LB", "SecurityGroup", egress_name.as_str()],
        CfnResource::new(
            "AWS::EC2::SecurityGroupEgress",
            json!({
                "Description": "Load balancer to target",
                "DestinationSecurityGroupId": get_att(&service_sg, "GroupId"),
                "FromPort": port,
                "GroupId": get_att(&lb_sg, "GroupId"),
                "IpProtocol": "tcp",
                "ToPort": port,
            }),
        ),
    )?;

    let mut props = service_properties(
        config,
        cluster,
        &task,
        vec![
            get_att(&service_sg, "GroupId"),
            get_att(&security_group.group_id, "GroupId"),
        ],
    );
    props["HealthCheckGracePeriodSeconds"] = json!(HEALTH_CHECK_GRACE_SECONDS);
    props["LoadBalancers"] = json!([{
        "ContainerName": task.container_name,
        "ContainerPort": port,
        "TargetGroupArn": reference(&target_group_id),
    }]);
    let service_id = stack.add_resource(
        &["Service", "Service"],
        CfnResource::new("AWS::ECS::Service", props)
            .depends_on(&target_group_id)
            .depends_on(&listener_id)
            .depends_on(&task.task_role_id),
    )?;

    stack.add_output(
        &["Service", "LoadBalancerDNS"],
        Output {
            value: get_att(&load_balancer_id, "DNSName"),
            description: None,
        },
    )?;
    stack.add_output(
        &["Service", "ServiceURL"],
        Output {
            value: join("", vec![json!("http://"), get_att(&load_balancer_id, "DNSName")]),
            description: None,
        },
    )?;

    tracing::debug!(service = %service_id, load_balancer = %load_balancer_id, "built load-balanced service");
    Ok(ServiceHandle::LoadBalanced(LoadBalancedService {
        service_id,
        cluster_id: cluster.cluster_id.clone(),
        load_balancer_id,
        listener_id,
        target_group_id,
        task,
    }))
}
