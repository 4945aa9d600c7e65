//! WT-020: Template diff — compare a fresh synth against the written template.
//!
//! Resources are matched by logical ID and compared by the BLAKE3 hash of
//! their JSON. Because logical IDs are path-derived, a renamed construct
//! shows up as one removal plus one addition.

use super::hasher;
use super::template::{CfnResource, Template};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Add,
    Modify,
    Remove,
    Unchanged,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Add => "+",
            Self::Modify => "~",
            Self::Remove => "-",
            Self::Unchanged => " ",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceChange {
    pub logical_id: String,
    pub resource_type: String,
    pub action: ChangeAction,
    pub description: String,
}

/// Every resource change plus summary counts.
#[derive(Debug, Clone, Default)]
pub struct TemplateDiff {
    pub changes: Vec<ResourceChange>,
    pub to_add: u32,
    pub to_modify: u32,
    pub to_remove: u32,
    pub unchanged: u32,
    pub outputs_changed: bool,
}

impl TemplateDiff {
    pub fn has_changes(&self) -> bool {
        self.to_add + self.to_modify + self.to_remove > 0 || self.outputs_changed
    }
}

fn resource_hash(resource: &CfnResource) -> Result<String, serde_json::Error> {
    hasher::hash_json(resource)
}

fn describe(logical_id: &str, resource: &CfnResource, action: ChangeAction, old: Option<&CfnResource>) -> String {
    match action {
        ChangeAction::Add => format!("{}: create {}", logical_id, resource.resource_type),
        ChangeAction::Remove => format!("{}: delete {}", logical_id, resource.resource_type),
        ChangeAction::Unchanged => format!("{}: no changes", logical_id),
        ChangeAction::Modify => match old {
            Some(old) if old.resource_type != resource.resource_type => format!(
                "{}: replace {} with {}",
                logical_id, old.resource_type, resource.resource_type
            ),
            _ => format!("{}: update {}", logical_id, changed_properties(old, resource).join(", ")),
        },
    }
}

/// Top-level property names whose values differ.
fn changed_properties(old: Option<&CfnResource>, new: &CfnResource) -> Vec<String> {
    let Some(old) = old else {
        return Vec::new();
    };
    let mut names: Vec<String> = Vec::new();
    let empty = serde_json::Map::new();
    let old_props = old.properties.as_object().unwrap_or(&empty);
    let new_props = new.properties.as_object().unwrap_or(&empty);
    for (key, value) in new_props {
        if old_props.get(key) != Some(value) {
            names.push(key.clone());
        }
    }
    for key in old_props.keys() {
        if !new_props.contains_key(key) {
            names.push(key.clone());
        }
    }
    if old.depends_on != new.depends_on {
        names.push("DependsOn".to_string());
    }
    if names.is_empty() {
        names.push("attributes".to_string());
    }
    names
}

/// Diff `desired` against the previously written `current` template.
/// With no current template, everything is an addition.
pub fn diff_templates(current: Option<&Template>, desired: &Template) -> Result<TemplateDiff, serde_json::Error> {
    let mut diff = TemplateDiff::default();

    for (id, resource) in &desired.resources {
        let old = current.and_then(|t| t.resources.get(id));
        let action = match old {
            None => ChangeAction::Add,
            Some(old) if resource_hash(old)? == resource_hash(resource)? => ChangeAction::Unchanged,
            Some(_) => ChangeAction::Modify,
        };
        match action {
            ChangeAction::Add => diff.to_add += 1,
            ChangeAction::Modify => diff.to_modify += 1,
            ChangeAction::Unchanged => diff.unchanged += 1,
            ChangeAction::Remove => {}
        }
        diff.changes.push(ResourceChange {
            logical_id: id.clone(),
            resource_type: resource.resource_type.clone(),
            action,
            description: describe(id, resource, action, old),
        });
    }

    if let Some(current) = current {
        for (id, resource) in &current.resources {
            if desired.resources.contains_key(id) {
                continue;
            }
            diff.to_remove += 1;
            diff.changes.push(ResourceChange {
                logical_id: id.clone(),
                resource_type: resource.resource_type.clone(),
                action: ChangeAction::Remove,
                description: describe(id, resource, ChangeAction::Remove, None),
            });
        }
        diff.outputs_changed = hasher::hash_json(&current.outputs)? != hasher::hash_json(&desired.outputs)?;
    } else {
        diff.outputs_changed = !desired.outputs.is_empty();
    }

    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::template::Output;
    use serde_json::json;

    fn template(entries: &[(&str, &str, serde_json::Value)]) -> Template {
        let mut t = Template::new(None);
        for (id, ty, props) in entries {
            t.resources
                .insert(id.to_string(), CfnResource::new(ty, props.clone()));
        }
        t
    }

    #[test]
    fn test_wt020_no_current_all_add() {
        let desired = template(&[
            ("Vpc", "AWS::EC2::VPC", json!({"CidrBlock": "10.0.0.0/16"})),
            ("Cluster", "AWS::ECS::Cluster", json!({})),
        ]);
        let diff = diff_templates(None, &desired).unwrap();
        assert_eq!(diff.to_add, 2);
        assert!(diff.has_changes());
        assert!(diff.changes.iter().all(|c| c.action == ChangeAction::Add));
    }

    #[test]
    fn test_wt020_identical_no_changes() {
        let t = template(&[("Cluster", "AWS::ECS::Cluster", json!({"ClusterName": "c"}))]);
        let diff = diff_templates(Some(&t), &t).unwrap();
        assert_eq!(diff.unchanged, 1);
        assert!(!diff.has_changes());
    }

    #[test]
    fn test_wt020_modify_names_property() {
        let current = template(&[("Svc", "AWS::ECS::Service", json!({"DesiredCount": 1, "LaunchType": "FARGATE"}))]);
        let desired = template(&[("Svc", "AWS::ECS::Service", json!({"DesiredCount": 3, "LaunchType": "FARGATE"}))]);
        let diff = diff_templates(Some(&current), &desired).unwrap();
        assert_eq!(diff.to_modify, 1);
        assert_eq!(diff.changes[0].description, "Svc: update DesiredCount");
    }

    #[test]
    fn test_wt020_remove() {
        let current = template(&[
            ("Svc", "AWS::ECS::Service", json!({})),
            ("Old", "AWS::Logs::LogGroup", json!({})),
        ]);
        let desired = template(&[("Svc", "AWS::ECS::Service", json!({}))]);
        let diff = diff_templates(Some(&current), &desired).unwrap();
        assert_eq!(diff.to_remove, 1);
        let removed = diff.changes.iter().find(|c| c.action == ChangeAction::Remove).unwrap();
        assert_eq!(removed.logical_id, "Old");
        assert_eq!(removed.action.to_string(), "-");
    }

    #[test]
    fn test_wt020_type_change_is_replace() {
        let current = template(&[("X", "AWS::ECS::Service", json!({}))]);
        let desired = template(&[("X", "AWS::Logs::LogGroup", json!({}))]);
        let diff = diff_templates(Some(&current), &desired).unwrap();
        assert!(diff.changes[0].description.contains("replace"));
    }

    #[test]
    fn test_wt020_outputs_changed() {
        let current = template(&[]);
        let mut desired = template(&[]);
        desired.outputs.insert(
            "Url".to_string(),
            Output {
                value: json!("http://x"),
                description: None,
            },
        );
        let diff = diff_templates(Some(&current), &desired).unwrap();
        assert!(diff.outputs_changed);
        assert!(diff.has_changes());
    }
}
