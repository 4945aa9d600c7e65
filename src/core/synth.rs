//! WT-013: Synthesis — workload config in, checked CloudFormation template out.
//!
//! One synchronous pass: network, cluster, security boundary, then the
//! branch selected by `expose_api`, then the dashboard. The finished graph is
//! checked by the resolver before it is returned.

use super::error::SynthError;
use super::parser;
use super::resolver;
use super::stack::Stack;
use super::template::Template;
use super::types::WorkloadConfig;
use crate::resources::{api, cluster, dashboard, network, security, service, task};

/// Synthesize the workload into a template.
pub fn synthesize(config: &WorkloadConfig) -> Result<Template, SynthError> {
    let errors = parser::validate_config(config);
    if !errors.is_empty() {
        let joined: Vec<String> = errors.iter().map(|e| e.message.clone()).collect();
        return Err(SynthError::InvalidConfig(joined.join("; ")));
    }

    let mut stack = Stack::new(&config.app);
    tracing::info!(
        stack = %stack.stack_name(),
        cluster_type = %config.cluster.cluster_type,
        expose_api = config.expose_api,
        "synthesizing workload"
    );

    let vpc = network::build_vpc(&mut stack, &config.vpc)?;
    let cluster = cluster::build_cluster(&mut stack, &config.cluster, vpc)?;
    let boundary = security::build_service_security_group(&mut stack, &cluster, config.container.port)?;

    let service = if config.expose_api {
        let service = service::build_exposed_service(&mut stack, config, &cluster, &boundary)?;
        api::build_http_api(&mut stack, &service, config.api.route)?;
        service
    } else {
        let task = task::build_bare_task(&mut stack, config, &cluster)?;
        service::build_bare_service(&mut stack, config, &cluster, task)?
    };

    if config.create_dashboard == Some(false) {
        tracing::debug!("create_dashboard is informational, building dashboard anyway");
    }
    dashboard::build_dashboard(&mut stack, &service)?;

    let template = stack.into_template();
    let order = resolver::build_deploy_order(&template)?;
    resolver::check_outputs(&template)?;
    tracing::info!(
        resources = template.resources.len(),
        outputs = template.outputs.len(),
        first = order.first().map(String::as_str).unwrap_or(""),
        "synthesis complete"
    );
    Ok(template)
}
