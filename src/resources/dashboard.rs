//! WT-018: CloudWatch dashboard with CPU and memory graphs for the service.

use super::service::ServiceHandle;
use crate::core::error::SynthError;
use crate::core::stack::Stack;
use crate::core::template::{get_att, join_json_with_tokens, reference, token_placeholder, CfnResource, REGION};
use serde_json::{json, Value};

pub const WIDGET_WIDTH: u32 = 12;
pub const WIDGET_HEIGHT: u32 = 6;

const CLUSTER_TOKEN: usize = 0;
const SERVICE_TOKEN: usize = 1;
const REGION_TOKEN: usize = 2;

fn metric_widget(title: &str, metric: &str, x: u32) -> Value {
    json!({
        "type": "metric",
        "width": WIDGET_WIDTH,
        "height": WIDGET_HEIGHT,
        "x": x,
        "y": 0,
        "properties": {
            "view": "timeSeries",
            "title": title,
            "region": token_placeholder(REGION_TOKEN),
            "metrics": [[
                "AWS/ECS",
                metric,
                "ClusterName",
                token_placeholder(CLUSTER_TOKEN),
                "ServiceName",
                token_placeholder(SERVICE_TOKEN),
            ]],
            "yAxis": {},
        },
    })
}

/// Build the dashboard for `service`. Returns its logical ID.
pub fn build_dashboard(stack: &mut Stack, service: &ServiceHandle) -> Result<String, SynthError> {
    let body = json!({
        "widgets": [
            metric_widget("CPU Utilization", "CPUUtilization", 0),
            metric_widget("Memory Utilization", "MemoryUtilization", WIDGET_WIDTH),
        ],
    });
    let tokens = [
        reference(service.cluster_id()),
        get_att(service.service_id(), "Name"),
        reference(REGION),
    ];
    let dashboard_body = join_json_with_tokens(&body, &tokens)?;

    let id = stack.add_resource(
        &["Dashboard"],
        CfnResource::new("AWS::CloudWatch::Dashboard", json!({"DashboardBody": dashboard_body})),
    )?;
    tracing::debug!(dashboard = %id, service_kind = service.kind_name(), "built dashboard");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::template::collect_references;
    use crate::core::types::{AppSettings, ClusterType};
    use crate::resources::service::BareService;
    use crate::resources::task::TaskDefinitionHandle;

    fn service() -> ServiceHandle {
        ServiceHandle::Fargate(BareService {
            service_id: "Svc".to_string(),
            cluster_id: "Cluster".to_string(),
            task: TaskDefinitionHandle {
                task_definition_id: "Task".to_string(),
                compatibility: ClusterType::Fargate,
                container_name: "web".to_string(),
                container_port: 80,
                task_role_id: "Role".to_string(),
                execution_role_id: None,
            },
        })
    }

    #[test]
    fn test_wt018_dashboard_widgets() {
        let mut stack = Stack::new(&AppSettings::default());
        let id = build_dashboard(&mut stack, &service()).unwrap();
        let body = stack.template().resources[&id].prop("DashboardBody").unwrap();
        let parts = body["Fn::Join"][1].as_array().unwrap();

        let text: String = parts.iter().filter_map(Value::as_str).collect();
        assert!(text.contains("\"title\":\"CPU Utilization\""));
        assert!(text.contains("\"title\":\"Memory Utilization\""));
        assert!(text.contains("\"AWS/ECS\""));
        assert!(!text.contains("${Token["));

        let mut refs = Vec::new();
        collect_references(body, &mut refs);
        assert!(refs.contains(&"Cluster".to_string()));
        assert!(refs.contains(&"Svc".to_string()));
    }

    #[test]
    fn test_wt018_dashboard_body_is_valid_json_once_resolved() {
        let mut stack = Stack::new(&AppSettings::default());
        let id = build_dashboard(&mut stack, &service()).unwrap();
        let body = stack.template().resources[&id].prop("DashboardBody").unwrap();
        let resolved: String = body["Fn::Join"][1]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p.as_str().unwrap_or("X").to_string())
            .collect();
        let parsed: Value = serde_json::from_str(&resolved).unwrap();
        assert_eq!(parsed["widgets"].as_array().unwrap().len(), 2);
    }
}
