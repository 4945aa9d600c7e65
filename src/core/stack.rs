//! WT-012: Stack — owns the template under construction and allocates logical IDs.
//!
//! A resource is addressed by its construct path below the workload scope,
//! e.g. `["MyVpc", "PublicSubnetSubnet1", "Subnet"]`. The logical ID is the
//! path's alphanumeric characters followed by an 8-char BLAKE3 suffix of the
//! full path, so IDs are readable, stable across runs, and collision-free.
//! A human part longer than [`MAX_HUMAN_LEN`] keeps only its head and tail,
//! which holds every ID within CloudFormation's 255-character limit.

use super::error::SynthError;
use super::hasher;
use super::template::{CfnResource, Output, Parameter, Template};
use super::types::AppSettings;
use regex::Regex;
use std::sync::LazyLock;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^A-Za-z0-9]").expect("static regex"));

/// Path components that add nothing to a human-readable ID.
const HIDDEN_COMPONENTS: &[&str] = &["Resource", "Default"];

/// Longest human-readable prefix of a logical ID.
pub const MAX_HUMAN_LEN: usize = 240;

/// Keep the head and tail of an over-long ASCII id.
fn truncate_middle(human: String) -> String {
    if human.len() <= MAX_HUMAN_LEN {
        return human;
    }
    let half = MAX_HUMAN_LEN / 2;
    format!("{}{}", &human[..half], &human[human.len() - half..])
}

pub struct Stack {
    stack_name: String,
    construct_id: String,
    template: Template,
}

impl Stack {
    pub fn new(app: &AppSettings) -> Self {
        Self {
            stack_name: app.stack_name.clone(),
            construct_id: app.construct_id.clone(),
            template: Template::new(app.description.clone()),
        }
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    /// `Stack/construct/a/b`: the display path used for tags and descriptions.
    pub fn node_path(&self, path: &[&str]) -> String {
        let mut parts = vec![self.stack_name.as_str(), self.construct_id.as_str()];
        parts.extend_from_slice(path);
        parts.join("/")
    }

    /// Logical ID for a construct path below the workload scope.
    pub fn logical_id(&self, path: &[&str]) -> String {
        let mut full: Vec<&str> = vec![self.construct_id.as_str()];
        full.extend_from_slice(path);

        let mut human = String::new();
        let mut previous: Option<&str> = None;
        for component in &full {
            if HIDDEN_COMPONENTS.contains(component) || previous == Some(*component) {
                continue;
            }
            human.push_str(&NON_ALPHANUMERIC.replace_all(component, ""));
            previous = Some(component);
        }

        format!("{}{}", truncate_middle(human), hasher::path_suffix(&full))
    }

    /// Add a resource at `path`. Returns its logical ID.
    pub fn add_resource(&mut self, path: &[&str], resource: CfnResource) -> Result<String, SynthError> {
        let id = self.logical_id(path);
        if self.template.resources.contains_key(&id) {
            return Err(SynthError::DuplicateLogicalId(id));
        }
        tracing::debug!(logical_id = %id, resource_type = %resource.resource_type, "add resource");
        self.template.resources.insert(id.clone(), resource);
        Ok(id)
    }

    /// Add a template parameter at `path`. Returns its logical ID.
    pub fn add_parameter(&mut self, path: &[&str], parameter: Parameter) -> Result<String, SynthError> {
        let id = self.logical_id(path);
        if self.template.parameters.contains_key(&id) {
            return Err(SynthError::DuplicateLogicalId(id));
        }
        self.template.parameters.insert(id.clone(), parameter);
        Ok(id)
    }

    /// Add a stack output at `path`. Returns its logical ID.
    pub fn add_output(&mut self, path: &[&str], output: Output) -> Result<String, SynthError> {
        let id = self.logical_id(path);
        if self.template.outputs.contains_key(&id) {
            return Err(SynthError::DuplicateLogicalId(id));
        }
        self.template.outputs.insert(id.clone(), output);
        Ok(id)
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn into_template(self) -> Template {
        self.template
    }
}
