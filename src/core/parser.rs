//! WT-002: Workload YAML parsing and validation.
//!
//! Parsing rejects structurally invalid files (including an unknown
//! `cluster.type`). Validation then checks what serde cannot:
//! - cluster, container and service names must not be empty
//! - the image reference must not be empty
//! - secret-backed env vars need a secret name and field
//! - the stack name must be a valid CloudFormation stack name
//! - an exposed Fargate service needs a public subnet tier
//!
//! Linting reports settings that are accepted but have no effect.

use super::types::*;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

static STACK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[A-Za-z][-A-Za-z0-9]*$").expect("static regex"));

/// CloudFormation limit on stack names.
pub const MAX_STACK_NAME_LEN: usize = 128;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Non-fatal finding: the config synthesizes, but not the way it reads.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub message: String,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a workload file from disk.
pub fn parse_config_file(path: &Path) -> Result<WorkloadConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a workload from a string.
pub fn parse_config(yaml: &str) -> Result<WorkloadConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

fn require_name(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError {
            message: format!("{} must not be empty", field),
        });
    }
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &WorkloadConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    require_name(&mut errors, "cluster.name", &config.cluster.name);
    require_name(&mut errors, "container.name", &config.container.name);
    require_name(&mut errors, "service.name", &config.service.name);
    require_name(&mut errors, "registry.image", &config.registry.image);
    require_name(&mut errors, "app.stack_name", &config.app.stack_name);
    require_name(&mut errors, "app.construct_id", &config.app.construct_id);

    let stack_name = &config.app.stack_name;
    if !stack_name.is_empty()
        && (!STACK_NAME.is_match(stack_name) || stack_name.len() > MAX_STACK_NAME_LEN)
    {
        errors.push(ValidationError {
            message: format!(
                "app.stack_name '{}' must start with a letter, contain only letters, digits and hyphens, and be at most {} characters",
                stack_name, MAX_STACK_NAME_LEN
            ),
        });
    }

    if config.expose_api
        && config.cluster.cluster_type == ClusterType::Fargate
        && config.vpc.single_tier
        && config.vpc.subnet.unwrap_or_default() == SubnetVisibility::Private
    {
        errors.push(ValidationError {
            message: "expose_api on a fargate cluster needs a public subnet for the load balancer; vpc.single_tier builds only private subnets".to_string(),
        });
    }

    if config.container.port == 0 {
        errors.push(ValidationError {
            message: "container.port must be between 1 and 65535".to_string(),
        });
    }

    let mut seen = HashSet::new();
    let names = config
        .environment
        .keys()
        .map(String::as_str)
        .chain(config.secret_environment.iter().map(|v| v.name.as_str()));
    for name in names {
        if name.is_empty() {
            errors.push(ValidationError {
                message: "environment variable name must not be empty".to_string(),
            });
        } else if !seen.insert(name) {
            errors.push(ValidationError {
                message: format!("environment variable '{}' is defined more than once", name),
            });
        }
    }

    for var in &config.secret_environment {
        if var.secret_name.is_empty() || var.field.is_empty() {
            errors.push(ValidationError {
                message: format!("secret environment variable '{}' needs secret_name and field", var.name),
            });
        }
    }

    errors
}

/// Settings that are accepted but ignored or overridden.
pub fn lint_config(config: &WorkloadConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if config.registry.visibility == RegistryVisibility::Private
        && config.registry.secret_name.is_none()
        && config.registry.secret_arn.is_none()
    {
        warnings.push(ValidationWarning {
            message: format!(
                "registry '{}' is private but has no secret_name or secret_arn; it will be pulled as a public image",
                config.registry.image
            ),
        });
    }

    if config.create_dashboard == Some(false) {
        warnings.push(ValidationWarning {
            message: "create_dashboard is false, but a dashboard is always created".to_string(),
        });
    }

    if !config.expose_api && config.container.port != 80 {
        warnings.push(ValidationWarning {
            message: format!(
                "container.port {} opens the security group only; without expose_api the container maps port 80",
                config.container.port
            ),
        });
    }

    if config.expose_api && config.cluster.cluster_type == ClusterType::Ec2 {
        warnings.push(ValidationWarning {
            message: "expose_api on an ec2 cluster creates no load balancer; the API gets no route".to_string(),
        });
    }

    if !config.expose_api && config.secret_environment != default_secret_environment() {
        warnings.push(ValidationWarning {
            message: "secret_environment only applies when expose_api is true".to_string(),
        });
    }

    if config.cluster.cluster_type == ClusterType::Ec2 && config.service.assign_public_ip {
        warnings.push(ValidationWarning {
            message: "assign_public_ip is rejected by ECS for the ec2 launch type".to_string(),
        });
    }

    if config.vpc.subnet.is_some() && !config.vpc.single_tier {
        warnings.push(ValidationWarning {
            message: "vpc.subnet only applies when vpc.single_tier is true".to_string(),
        });
    }

    warnings
}
