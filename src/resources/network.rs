//! WT-004: VPC builder: network, subnets, gateways, routes.
//!
//! Two availability zones, /24 subnets allocated sequentially out of
//! `10.0.0.0/16`. The default layout has a public tier and a private tier
//! with NAT egress; `single_tier` keeps only the requested tier.

use crate::core::error::SynthError;
use crate::core::stack::Stack;
use crate::core::template::{get_att, get_azs, reference, select, CfnResource};
use crate::core::types::{SubnetVisibility, VpcSpec};
use serde_json::{json, Value};

pub const VPC_CIDR: &str = "10.0.0.0/16";
pub const MAX_AZS: usize = 2;
const ANY_IPV4: &str = "0.0.0.0/0";

/// Kind of a subnet tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetKind {
    Public,
    PrivateWithEgress,
    PrivateIsolated,
}

impl SubnetKind {
    fn group_name(self) -> &'static str {
        match self {
            Self::Public => "Public Subnet",
            Self::PrivateWithEgress | Self::PrivateIsolated => "Private Subnet",
        }
    }

    fn type_tag(self) -> &'static str {
        match self {
            Self::Public => "Public",
            Self::PrivateWithEgress => "Private",
            Self::PrivateIsolated => "Isolated",
        }
    }
}

/// Subnet tiers to build for a network spec, in allocation order.
pub fn subnet_layout(spec: &VpcSpec) -> Vec<SubnetKind> {
    if !spec.single_tier {
        return vec![SubnetKind::Public, SubnetKind::PrivateWithEgress];
    }
    match spec.subnet.unwrap_or_default() {
        SubnetVisibility::Public => vec![SubnetKind::Public],
        SubnetVisibility::Private => vec![SubnetKind::PrivateIsolated],
    }
}

/// Subnet IDs of one tier.
#[derive(Debug, Clone)]
pub struct SubnetGroup {
    pub kind: SubnetKind,
    pub subnet_ids: Vec<String>,
}

/// The constructed network.
#[derive(Debug, Clone)]
pub struct VpcHandle {
    pub vpc_id: String,
    pub groups: Vec<SubnetGroup>,
    /// Public default routes and their table associations; internet-facing
    /// resources must wait for these
    pub internet_routes: Vec<String>,
}

impl VpcHandle {
    pub fn public_subnets(&self) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|g| g.kind == SubnetKind::Public)
            .map(|g| g.subnet_ids.as_slice())
    }

    pub fn private_subnets(&self) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|g| g.kind != SubnetKind::Public)
            .map(|g| g.subnet_ids.as_slice())
    }

    /// Subnets for tasks: public ones when tasks get a public IP, private
    /// otherwise, falling back to whichever tier exists.
    pub fn task_subnets(&self, assign_public_ip: bool) -> &[String] {
        let (preferred, fallback) = if assign_public_ip {
            (self.public_subnets(), self.private_subnets())
        } else {
            (self.private_subnets(), self.public_subnets())
        };
        preferred.or(fallback).unwrap_or(&[])
    }

    /// `[{"Ref": subnet}, ...]`
    pub fn subnet_refs(ids: &[String]) -> Value {
        Value::Array(ids.iter().map(|id| reference(id)).collect())
    }
}

/// `10.0.{index}.0/24`
pub fn cidr_block(index: usize) -> String {
    format!("10.0.{}.0/24", index)
}

/// Build the VPC and its subnets.
pub fn build_vpc(stack: &mut Stack, spec: &VpcSpec) -> Result<VpcHandle, SynthError> {
    let layout = subnet_layout(spec);
    let vpc_name = spec
        .name
        .clone()
        .unwrap_or_else(|| stack.node_path(&["MyVpc"]));

    let vpc_id = stack.add_resource(
        &["MyVpc"],
        CfnResource::new(
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": VPC_CIDR,
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": [{"Key": "Name", "Value": vpc_name}],
            }),
        ),
    )?;

    let has_public = layout.contains(&SubnetKind::Public);
    let needs_nat = layout.contains(&SubnetKind::PrivateWithEgress);
    let igw_id = stack.logical_id(&["MyVpc", "IGW"]);
    let attachment_id = stack.logical_id(&["MyVpc", "VPCGW"]);

    let mut groups = Vec::new();
    let mut nat_ids: Vec<String> = Vec::new();
    let mut internet_routes: Vec<String> = Vec::new();
    let mut cidr_index = 0;

    for kind in layout {
        let mut subnet_ids = Vec::with_capacity(MAX_AZS);
        for az in 0..MAX_AZS {
            let construct = format!("{}Subnet{}", kind.group_name(), az + 1);
            let subnet_id = build_subnet(stack, &vpc_id, kind, construct.as_str(), az, cidr_block(cidr_index))?;
            cidr_index += 1;

            let table_name = stack.node_path(&["MyVpc", construct.as_str()]);
            let route_table_id = stack.add_resource(
                &["MyVpc", construct.as_str(), "RouteTable"],
                CfnResource::new(
                    "AWS::EC2::RouteTable",
                    json!({
                        "Tags": [{"Key": "Name", "Value": table_name}],
                        "VpcId": reference(&vpc_id),
                    }),
                ),
            )?;
            let association_id = stack.add_resource(
                &["MyVpc", construct.as_str(), "RouteTableAssociation"],
                CfnResource::new(
                    "AWS::EC2::SubnetRouteTableAssociation",
                    json!({
                        "RouteTableId": reference(&route_table_id),
                        "SubnetId": reference(&subnet_id),
                    }),
                ),
            )?;

            match kind {
                SubnetKind::Public => {
                    let route_id = stack.add_resource(
                        &["MyVpc", construct.as_str(), "DefaultRoute"],
                        CfnResource::new(
                            "AWS::EC2::Route",
                            json!({
                                "DestinationCidrBlock": ANY_IPV4,
                                "GatewayId": reference(&igw_id),
                                "RouteTableId": reference(&route_table_id),
                            }),
                        )
                        .depends_on(&attachment_id),
                    )?;
                    if needs_nat {
                        let nat_id = build_nat_gateway(stack, construct.as_str(), &subnet_id, &route_id, &association_id)?;
                        nat_ids.push(nat_id);
                    }
                    internet_routes.push(route_id);
                    internet_routes.push(association_id);
                }
                SubnetKind::PrivateWithEgress => {
                    let nat_id = nat_ids.get(az).or(nat_ids.first()).cloned().unwrap_or_default();
                    stack.add_resource(
                        &["MyVpc", construct.as_str(), "DefaultRoute"],
                        CfnResource::new(
                            "AWS::EC2::Route",
                            json!({
                                "DestinationCidrBlock": ANY_IPV4,
                                "NatGatewayId": reference(&nat_id),
                                "RouteTableId": reference(&route_table_id),
                            }),
                        ),
                    )?;
                }
                SubnetKind::PrivateIsolated => {}
            }
            subnet_ids.push(subnet_id);
        }
        groups.push(SubnetGroup { kind, subnet_ids });
    }

    if has_public {
        stack.add_resource(
            &["MyVpc", "IGW"],
            CfnResource::new(
                "AWS::EC2::InternetGateway",
                json!({"Tags": [{"Key": "Name", "Value": vpc_name}]}),
            ),
        )?;
        stack.add_resource(
            &["MyVpc", "VPCGW"],
            CfnResource::new(
                "AWS::EC2::VPCGatewayAttachment",
                json!({
                    "InternetGatewayId": reference(&igw_id),
                    "VpcId": reference(&vpc_id),
                }),
            ),
        )?;
    }

    tracing::debug!(vpc = %vpc_id, tiers = groups.len(), "built network");
    Ok(VpcHandle {
        vpc_id,
        groups,
        internet_routes,
    })
}

fn build_subnet(
    stack: &mut Stack,
    vpc_id: &str,
    kind: SubnetKind,
    construct: &str,
    az: usize,
    cidr: String,
) -> Result<String, SynthError> {
    let name = stack.node_path(&["MyVpc", construct]);
    stack.add_resource(
        &["MyVpc", construct, "Subnet"],
        CfnResource::new(
            "AWS::EC2::Subnet",
            json!({
                "AvailabilityZone": select(az, get_azs()),
                "CidrBlock": cidr,
                "MapPublicIpOnLaunch": kind == SubnetKind::Public,
                "Tags": [
                    {"Key": "aws-cdk:subnet-name", "Value": kind.group_name()},
                    {"Key": "aws-cdk:subnet-type", "Value": kind.type_tag()},
                    {"Key": "Name", "Value": name},
                ],
                "VpcId": reference(vpc_id),
            }),
        ),
    )
}

fn build_nat_gateway(
    stack: &mut Stack,
    construct: &str,
    subnet_id: &str,
    route_id: &str,
    association_id: &str,
) -> Result<String, SynthError> {
    let name = stack.node_path(&["MyVpc", construct]);
    let eip_id = stack.add_resource(
        &["MyVpc", construct, "EIP"],
        CfnResource::new(
            "AWS::EC2::EIP",
            json!({
                "Domain": "vpc",
                "Tags": [{"Key": "Name", "Value": name}],
            }),
        ),
    )?;
    stack.add_resource(
        &["MyVpc", construct, "NATGateway"],
        CfnResource::new(
            "AWS::EC2::NatGateway",
            json!({
                "AllocationId": get_att(&eip_id, "AllocationId"),
                "SubnetId": reference(subnet_id),
                "Tags": [{"Key": "Name", "Value": name}],
            }),
        )
        .depends_on(route_id)
        .depends_on(association_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver;
    use crate::core::types::AppSettings;

    fn build(spec: &VpcSpec) -> (Stack, VpcHandle) {
        let mut stack = Stack::new(&AppSettings::default());
        let vpc = build_vpc(&mut stack, spec).unwrap();
        (stack, vpc)
    }

    fn count(stack: &Stack, ty: &str) -> usize {
        stack.template().resources_of_type(ty).count()
    }

    #[test]
    fn test_wt004_name_tag() {
        let spec = VpcSpec {
            name: Some("ConstructVPC".to_string()),
            ..Default::default()
        };
        let (stack, vpc) = build(&spec);
        let r = &stack.template().resources[&vpc.vpc_id];
        assert_eq!(
            r.prop("Tags").unwrap(),
            &json!([{"Key": "Name", "Value": "ConstructVPC"}])
        );
    }

    #[test]
    fn test_wt004_default_name_is_path() {
        let (stack, vpc) = build(&VpcSpec::default());
        let r = &stack.template().resources[&vpc.vpc_id];
        assert_eq!(
            r.prop("Tags").unwrap()[0]["Value"],
            "MyStack/workloadConstruct/MyVpc"
        );
    }

    #[test]
    fn test_wt004_two_tier_layout() {
        let (stack, vpc) = build(&VpcSpec::default());
        assert_eq!(count(&stack, "AWS::EC2::Subnet"), 4);
        assert_eq!(count(&stack, "AWS::EC2::NatGateway"), 2);
        assert_eq!(count(&stack, "AWS::EC2::InternetGateway"), 1);
        assert_eq!(vpc.public_subnets().unwrap().len(), 2);
        assert_eq!(vpc.private_subnets().unwrap().len(), 2);
        assert!(vpc.public_subnets().unwrap()[0].starts_with("workloadConstructMyVpcPublicSubnetSubnet1Subnet"));
    }

    #[test]
    fn test_wt004_cidr_allocation() {
        let (stack, vpc) = build(&VpcSpec::default());
        let cidrs: Vec<_> = vpc
            .groups
            .iter()
            .flat_map(|g| g.subnet_ids.iter())
            .map(|id| stack.template().resources[id].prop("CidrBlock").unwrap().clone())
            .collect();
        assert_eq!(
            cidrs,
            vec![
                json!("10.0.0.0/24"),
                json!("10.0.1.0/24"),
                json!("10.0.2.0/24"),
                json!("10.0.3.0/24")
            ]
        );
    }

    #[test]
    fn test_wt004_private_routes_through_nat() {
        let (stack, vpc) = build(&VpcSpec::default());
        let routes: Vec<_> = stack
            .template()
            .resources_of_type("AWS::EC2::Route")
            .filter(|(_, r)| r.prop("NatGatewayId").is_some())
            .collect();
        assert_eq!(routes.len(), 2);
        assert_eq!(vpc.task_subnets(false), vpc.private_subnets().unwrap());
        assert_eq!(vpc.task_subnets(true), vpc.public_subnets().unwrap());
    }

    #[test]
    fn test_wt004_single_public_tier() {
        let spec = VpcSpec {
            name: None,
            subnet: Some(SubnetVisibility::Public),
            single_tier: true,
        };
        let (stack, vpc) = build(&spec);
        assert_eq!(count(&stack, "AWS::EC2::Subnet"), 2);
        assert_eq!(count(&stack, "AWS::EC2::NatGateway"), 0);
        assert_eq!(count(&stack, "AWS::EC2::InternetGateway"), 1);
        assert!(vpc.private_subnets().is_none());
        // no private tier: private placement falls back to public
        assert_eq!(vpc.task_subnets(false), vpc.public_subnets().unwrap());
    }

    #[test]
    fn test_wt004_single_private_tier_is_isolated() {
        let spec = VpcSpec {
            name: None,
            subnet: Some(SubnetVisibility::Private),
            single_tier: true,
        };
        let (stack, vpc) = build(&spec);
        assert_eq!(count(&stack, "AWS::EC2::Subnet"), 2);
        assert_eq!(count(&stack, "AWS::EC2::InternetGateway"), 0);
        assert_eq!(count(&stack, "AWS::EC2::Route"), 0);
        assert!(vpc.internet_routes.is_empty());
        assert_eq!(vpc.groups[0].kind, SubnetKind::PrivateIsolated);
        assert_eq!(vpc.task_subnets(true), vpc.private_subnets().unwrap());
    }

    #[test]
    fn test_wt004_graph_resolves() {
        let (stack, _) = build(&VpcSpec::default());
        let order = resolver::build_deploy_order(stack.template()).unwrap();
        assert_eq!(order.len(), stack.template().resources.len());
    }
}
