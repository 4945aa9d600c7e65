//! WT-017: HTTP API in front of the load balancer.

use super::service::ServiceHandle;
use crate::core::error::SynthError;
use crate::core::stack::Stack;
use crate::core::template::{get_att, join, reference, CfnResource, Output, REGION};
use crate::core::types::ApiRoute;
use serde_json::json;

pub const API_NAME: &str = "ecs-api-gateway";
pub const DEFAULT_STAGE: &str = "$default";

#[derive(Debug, Clone)]
pub struct ApiHandle {
    pub api_id: String,
    pub stage_id: String,
    /// `None` when the service had nothing to integrate with
    pub route_id: Option<String>,
}

/// Build the HTTP API and, for a load-balanced service, its proxy route.
pub fn build_http_api(stack: &mut Stack, service: &ServiceHandle, route: ApiRoute) -> Result<ApiHandle, SynthError> {
    let api_id = stack.add_resource(
        &[API_NAME],
        CfnResource::new(
            "AWS::ApiGatewayV2::Api",
            json!({"Name": API_NAME, "ProtocolType": "HTTP"}),
        ),
    )?;
    let stage_id = stack.add_resource(
        &[API_NAME, "DefaultStage"],
        CfnResource::new(
            "AWS::ApiGatewayV2::Stage",
            json!({"ApiId": reference(&api_id), "AutoDeploy": true, "StageName": DEFAULT_STAGE}),
        ),
    )?;

    let route_id = match service {
        ServiceHandle::LoadBalanced(lb) => {
            let integration_id = stack.add_resource(
                &[API_NAME, "ProxyIntegration"],
                CfnResource::new(
                    "AWS::ApiGatewayV2::Integration",
                    json!({
                        "ApiId": reference(&api_id),
                        "IntegrationMethod": "ANY",
                        "IntegrationType": "HTTP_PROXY",
                        "IntegrationUri": join("", vec![json!("http://"), get_att(&lb.load_balancer_id, "DNSName")]),
                        "PayloadFormatVersion": "1.0",
                    }),
                ),
            )?;
            let route_key = route.route_key();
            let id = stack.add_resource(
                &[API_NAME, route_key],
                CfnResource::new(
                    "AWS::ApiGatewayV2::Route",
                    json!({
                        "ApiId": reference(&api_id),
                        "AuthorizationType": "NONE",
                        "RouteKey": route_key,
                        "Target": join("", vec![json!("integrations/"), reference(&integration_id)]),
                    }),
                ),
            )?;
            Some(id)
        }
        ServiceHandle::Fargate(_) | ServiceHandle::Ec2(_) => {
            tracing::warn!(
                service = %service.service_id(),
                kind = service.kind_name(),
                "API route needs a load-balanced service, skipping integration"
            );
            None
        }
    };

    stack.add_output(
        &[API_NAME, "Endpoint"],
        Output {
            value: join(
                "",
                vec![
                    json!("https://"),
                    reference(&api_id),
                    json!(".execute-api."),
                    reference(REGION),
                    json!("."),
                    reference("AWS::URLSuffix"),
                    json!("/"),
                ],
            ),
            description: Some("HTTP API endpoint".to_string()),
        },
    )?;

    Ok(ApiHandle {
        api_id,
        stage_id,
        route_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AppSettings, ClusterType};
    use crate::resources::service::{BareService, LoadBalancedService};
    use crate::resources::task::TaskDefinitionHandle;

    fn task() -> TaskDefinitionHandle {
        TaskDefinitionHandle {
            task_definition_id: "Task".to_string(),
            compatibility: ClusterType::Fargate,
            container_name: "web".to_string(),
            container_port: 80,
            task_role_id: "Role".to_string(),
            execution_role_id: None,
        }
    }

    fn load_balanced() -> ServiceHandle {
        ServiceHandle::LoadBalanced(LoadBalancedService {
            service_id: "Svc".to_string(),
            cluster_id: "Cluster".to_string(),
            load_balancer_id: "Lb".to_string(),
            listener_id: "Listener".to_string(),
            target_group_id: "Tg".to_string(),
            task: task(),
        })
    }

    #[test]
    fn test_wt017_load_balanced_route() {
        let mut stack = Stack::new(&AppSettings::default());
        let api = build_http_api(&mut stack, &load_balanced(), ApiRoute::Root).unwrap();
        let t = stack.template();

        let apis: Vec<_> = t.resources_of_type("AWS::ApiGatewayV2::Api").collect();
        assert_eq!(apis.len(), 1);
        assert_eq!(apis[0].1.prop("Name").unwrap(), "ecs-api-gateway");

        let route = &t.resources[api.route_id.as_ref().unwrap()];
        assert_eq!(route.prop("RouteKey").unwrap(), "ANY /");

        let (_, integration) = t.resources_of_type("AWS::ApiGatewayV2::Integration").next().unwrap();
        assert_eq!(integration.prop("IntegrationType").unwrap(), "HTTP_PROXY");
        assert_eq!(
            integration.prop("IntegrationUri").unwrap()["Fn::Join"][1][1],
            get_att("Lb", "DNSName")
        );
        assert_eq!(t.resources[&api.stage_id].prop("AutoDeploy").unwrap(), true);
    }

    #[test]
    fn test_wt017_proxy_route_key() {
        let mut stack = Stack::new(&AppSettings::default());
        let api = build_http_api(&mut stack, &load_balanced(), ApiRoute::Proxy).unwrap();
        let route = &stack.template().resources[api.route_id.as_ref().unwrap()];
        assert_eq!(route.prop("RouteKey").unwrap(), "ANY /{proxy+}");
    }

    #[test]
    fn test_wt017_non_load_balanced_skips_integration() {
        let mut stack = Stack::new(&AppSettings::default());
        let service = ServiceHandle::Ec2(BareService {
            service_id: "Svc".to_string(),
            cluster_id: "Cluster".to_string(),
            task: task(),
        });
        let api = build_http_api(&mut stack, &service, ApiRoute::Root).unwrap();
        assert!(api.route_id.is_none());
        let t = stack.template();
        assert_eq!(t.resources_of_type("AWS::ApiGatewayV2::Api").count(), 1);
        assert_eq!(t.resources_of_type("AWS::ApiGatewayV2::Integration").count(), 0);
        assert_eq!(t.resources_of_type("AWS::ApiGatewayV2::Route").count(), 0);
    }
}
