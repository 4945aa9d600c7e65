//! WT-006: Service security group — all egress, one TCP ingress port from anywhere.

use super::cluster::ClusterHandle;
use crate::core::error::SynthError;
use crate::core::stack::Stack;
use crate::core::template::{reference, CfnResource};
use serde_json::{json, Value};

const ANY_IPV4: &str = "0.0.0.0/0";

#[derive(Debug, Clone)]
pub struct SecurityGroupHandle {
    pub group_id: String,
}

/// Egress rule allowing all outbound traffic.
pub fn allow_all_outbound() -> Value {
    json!([{
        "CidrIp": ANY_IPV4,
        "Description": "Allow all outbound traffic by default",
        "IpProtocol": "-1",
    }])
}

/// Build the security boundary for `port` in the cluster's VPC.
pub fn build_service_security_group(
    stack: &mut Stack,
    cluster: &ClusterHandle,
    port: u16,
) -> Result<SecurityGroupHandle, SynthError> {
    let description = stack.node_path(&["ServiceSecurityGroup"]);
    let group_id = stack.add_resource(
        &["ServiceSecurityGroup"],
        CfnResource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": description,
                "SecurityGroupEgress": allow_all_outbound(),
                "SecurityGroupIngress": [{
                    "CidrIp": ANY_IPV4,
                    "Description": format!("from {}:{}", ANY_IPV4, port),
                    "FromPort": port,
                    "IpProtocol": "tcp",
                    "ToPort": port,
                }],
                "VpcId": reference(&cluster.vpc.vpc_id),
            }),
        ),
    )?;
    Ok(SecurityGroupHandle { group_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AppSettings, ClusterSpec, ClusterType, VpcSpec};
    use crate::resources::{cluster, network};

    #[test]
    fn test_wt006_single_ingress_rule() {
        let mut stack = Stack::new(&AppSettings::default());
        let vpc = network::build_vpc(&mut stack, &VpcSpec::default()).unwrap();
        let spec = ClusterSpec {
            name: "c".to_string(),
            cluster_type: ClusterType::Fargate,
        };
        let cluster = cluster::build_cluster(&mut stack, &spec, vpc).unwrap();
        let sg = build_service_security_group(&mut stack, &cluster, 6000).unwrap();

        let r = &stack.template().resources[&sg.group_id];
        let ingress = r.prop("SecurityGroupIngress").unwrap().as_array().unwrap();
        assert_eq!(ingress.len(), 1);
        assert_eq!(ingress[0]["CidrIp"], "0.0.0.0/0");
        assert_eq!(ingress[0]["IpProtocol"], "tcp");
        assert_eq!(ingress[0]["FromPort"], 6000);
        assert_eq!(ingress[0]["ToPort"], 6000);
        assert_eq!(r.prop("SecurityGroupEgress").unwrap()[0]["IpProtocol"], "-1");
        assert_eq!(r.prop("VpcId").unwrap(), &reference(&cluster.vpc.vpc_id));
    }
}
