//! WT-005: ECS cluster builder.
//!
//! Every cluster gets container insights and a private DNS namespace named
//! `default`. Fargate clusters get the FARGATE/FARGATE_SPOT capacity
//! providers; EC2 clusters get an auto-scaled instance pool.

use super::iam;
use super::network::VpcHandle;
use crate::core::error::SynthError;
use crate::core::stack::Stack;
use crate::core::template::{base64, get_att, join, reference, CfnResource, Parameter};
use crate::core::types::{ClusterSpec, ClusterType};
use serde_json::json;

pub const NAMESPACE_NAME: &str = "default";
pub const INSTANCE_TYPE: &str = "t3.medium";
pub const CAPACITY_MIN: u32 = 1;
pub const CAPACITY_DESIRED: u32 = 1;
pub const CAPACITY_MAX: u32 = 10;
pub const ECS_AMI_PARAMETER: &str = "/aws/service/ecs/optimized-ami/amazon-linux-2/recommended/image_id";

/// Instance pool behind an EC2 cluster.
#[derive(Debug, Clone)]
pub struct CapacityHandle {
    pub auto_scaling_group_id: String,
    pub instance_security_group_id: String,
}

/// The constructed cluster; owns the network handle it was built in.
#[derive(Debug, Clone)]
pub struct ClusterHandle {
    pub cluster_id: String,
    pub cluster_type: ClusterType,
    pub namespace_id: String,
    pub vpc: VpcHandle,
    pub capacity: Option<CapacityHandle>,
}

/// Build the cluster inside `vpc`.
pub fn build_cluster(stack: &mut Stack, spec: &ClusterSpec, vpc: VpcHandle) -> Result<ClusterHandle, SynthError> {
    let cluster_id = stack.add_resource(
        &["Cluster"],
        CfnResource::new(
            "AWS::ECS::Cluster",
            json!({
                "ClusterName": spec.name,
                "ClusterSettings": [{"Name": "containerInsights", "Value": "enabled"}],
            }),
        ),
    )?;

    let namespace_id = stack.add_resource(
        &["Cluster", "DefaultServiceDiscoveryNamespace"],
        CfnResource::new(
            "AWS::ServiceDiscovery::PrivateDnsNamespace",
            json!({
                "Name": NAMESPACE_NAME,
                "Vpc": reference(&vpc.vpc_id),
            }),
        ),
    )?;

    let capacity = match spec.cluster_type {
        ClusterType::Fargate => {
            stack.add_resource(
                &["Cluster", "Cluster"],
                CfnResource::new(
                    "AWS::ECS::ClusterCapacityProviderAssociations",
                    json!({
                        "CapacityProviders": ["FARGATE", "FARGATE_SPOT"],
                        "Cluster": reference(&cluster_id),
                        "DefaultCapacityProviderStrategy": [],
                    }),
                ),
            )?;
            None
        }
        ClusterType::Ec2 => Some(build_capacity(stack, &cluster_id, &vpc)?),
    };

    tracing::debug!(cluster = %cluster_id, kind = %spec.cluster_type, "built cluster");
    Ok(ClusterHandle {
        cluster_id,
        cluster_type: spec.cluster_type,
        namespace_id,
        vpc,
        capacity,
    })
}

fn build_capacity(stack: &mut Stack, cluster_id: &str, vpc: &VpcHandle) -> Result<CapacityHandle, SynthError> {
    let ami = stack.add_parameter(
        &["EC2Capacity", "AmiParameter"],
        Parameter {
            parameter_type: "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>".to_string(),
            default: Some(ECS_AMI_PARAMETER.to_string()),
        },
    )?;

    let sg_description = stack.node_path(&["Cluster", "EC2Capacity", "InstanceSecurityGroup"]);
    let instance_sg = stack.add_resource(
        &["Cluster", "EC2Capacity", "InstanceSecurityGroup"],
        CfnResource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": sg_description,
                "SecurityGroupEgress": [{
                    "CidrIp": "0.0.0.0/0",
                    "Description": "Allow all outbound traffic by default",
                    "IpProtocol": "-1",
                }],
                "VpcId": reference(&vpc.vpc_id),
            }),
        ),
    )?;

    let role_path = ["Cluster", "EC2Capacity", "InstanceRole"];
    let role = iam::build_role(stack, &role_path, "ec2.amazonaws.com")?;
    let policy = iam::build_default_policy(
        stack,
        &role_path,
        &role,
        vec![
            iam::allow(
                &["ecs:DeregisterContainerInstance", "ecs:RegisterContainerInstance", "ecs:Submit*"],
                get_att(cluster_id, "Arn"),
            ),
            iam::allow(
                &[
                    "ecs:CreateCluster",
                    "ecs:DiscoverPollEndpoint",
                    "ecr:GetAuthorizationToken",
                    "logs:CreateLogStream",
                    "logs:PutLogEvents",
                ],
                json!("*"),
            ),
            iam::allow(&["ecs:Poll", "ecs:StartTelemetrySession"], json!("*")),
        ],
    )?;

    let profile = stack.add_resource(
        &["Cluster", "EC2Capacity", "InstanceProfile"],
        CfnResource::new(
            "AWS::IAM::InstanceProfile",
            json!({"Roles": [reference(&role)]}),
        ),
    )?;

    let user_data = base64(join(
        "",
        vec![
            json!("#!/bin/bash\necho ECS_CLUSTER="),
            reference(cluster_id),
            json!(" >> /etc/ecs/ecs.config"),
        ],
    ));

    let mut launch_template = CfnResource::new(
        "AWS::EC2::LaunchTemplate",
        json!({
            "LaunchTemplateData": {
                "IamInstanceProfile": {"Arn": get_att(&profile, "Arn")},
                "ImageId": reference(&ami),
                "InstanceType": INSTANCE_TYPE,
                "SecurityGroupIds": [get_att(&instance_sg, "GroupId")],
                "UserData": user_data,
            },
        }),
    )
    .depends_on(&role);
    if let Some(policy) = &policy {
        launch_template = launch_template.depends_on(policy);
    }
    let launch_template = stack.add_resource(&["Cluster", "EC2Capacity", "LaunchTemplate"], launch_template)?;

    let subnets = vpc.task_subnets(false).to_vec();
    let asg = stack.add_resource(
        &["Cluster", "EC2Capacity", "ASG"],
        CfnResource::new(
            "AWS::AutoScaling::AutoScalingGroup",
            json!({
                "DesiredCapacity": CAPACITY_DESIRED.to_string(),
                "LaunchTemplate": {
                    "LaunchTemplateId": reference(&launch_template),
                    "Version": get_att(&launch_template, "LatestVersionNumber"),
                },
                "MaxSize": CAPACITY_MAX.to_string(),
                "MinSize": CAPACITY_MIN.to_string(),
                "VPCZoneIdentifier": VpcHandle::subnet_refs(&subnets),
            }),
        ),
    )?;

    Ok(CapacityHandle {
        auto_scaling_group_id: asg,
        instance_security_group_id: instance_sg,
    })
}
