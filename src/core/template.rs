//! WT-011: CloudFormation template model and intrinsic function helpers.
//!
//! Properties are plain `serde_json::Value`s built with `json!`; the helpers
//! here produce the intrinsic shapes (`Ref`, `Fn::GetAtt`, `Fn::Join`, ...)
//! so builders never spell them by hand.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const FORMAT_VERSION: &str = "2010-09-09";

/// A complete CloudFormation template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "Parameters", default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, Parameter>,

    /// Resources in creation order
    #[serde(rename = "Resources")]
    pub resources: IndexMap<String, CfnResource>,

    #[serde(rename = "Outputs", default, skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, Output>,
}

impl Template {
    pub fn new(description: Option<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description,
            parameters: IndexMap::new(),
            resources: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    /// Logical IDs of every resource with the given type.
    pub fn resources_of_type<'a>(&'a self, resource_type: &str) -> impl Iterator<Item = (&'a String, &'a CfnResource)> {
        let resource_type = resource_type.to_string();
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    /// Pretty JSON, the on-disk form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// A single resource declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfnResource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(rename = "Properties", default, skip_serializing_if = "Value::is_null")]
    pub properties: Value,

    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(rename = "DeletionPolicy", default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,

    #[serde(rename = "UpdateReplacePolicy", default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
}

impl CfnResource {
    pub fn new(resource_type: &str, properties: Value) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    pub fn depends_on(mut self, logical_id: &str) -> Self {
        if !self.depends_on.iter().any(|d| d == logical_id) {
            self.depends_on.push(logical_id.to_string());
        }
        self
    }

    /// Keep the physical resource on stack deletion and replacement.
    pub fn retain(mut self) -> Self {
        self.deletion_policy = Some("Retain".to_string());
        self.update_replace_policy = Some("Retain".to_string());
        self
    }

    /// A property by name.
    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub parameter_type: String,

    #[serde(rename = "Default", default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    #[serde(rename = "Value")]
    pub value: Value,

    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================================================
// Intrinsics
// ============================================================================

pub const PARTITION: &str = "AWS::Partition";
pub const REGION: &str = "AWS::Region";
pub const ACCOUNT_ID: &str = "AWS::AccountId";

/// `{"Ref": id}`
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [id, attr]}`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Join": [delimiter, parts]}`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `{"Fn::Select": [index, list]}`
pub fn select(index: usize, list: Value) -> Value {
    json!({ "Fn::Select": [index, list] })
}

/// Availability zones of the deployment region.
pub fn get_azs() -> Value {
    json!({ "Fn::GetAZs": "" })
}

/// `{"Fn::Base64": value}`
pub fn base64(value: Value) -> Value {
    json!({ "Fn::Base64": value })
}

/// `arn:<partition>:<service>:<region>:<account>:<resource>` built from pseudo parameters.
pub fn arn(service: &str, resource: &str) -> Value {
    join(
        "",
        vec![
            json!("arn:"),
            reference(PARTITION),
            json!(format!(":{}:", service)),
            reference(REGION),
            json!(":"),
            reference(ACCOUNT_ID),
            json!(format!(":{}", resource)),
        ],
    )
}

/// Render `body` to compact JSON and splice `tokens` in for the placeholders
/// `token_placeholder(i)` it contains, yielding a `Fn::Join`.
///
/// Used for JSON documents embedded as strings (dashboard bodies) that must
/// reference other resources.
pub fn join_json_with_tokens(body: &Value, tokens: &[Value]) -> Result<Value, serde_json::Error> {
    let rendered = serde_json::to_string(body)?;
    let mut parts: Vec<Value> = Vec::new();
    let mut rest = rendered.as_str();

    while let Some((index, start, len)) = next_token(rest, tokens.len()) {
        if start > 0 {
            parts.push(Value::String(rest[..start].to_string()));
        }
        parts.push(tokens[index].clone());
        rest = &rest[start + len..];
    }
    if !rest.is_empty() {
        parts.push(Value::String(rest.to_string()));
    }

    Ok(join("", parts))
}

/// Placeholder string for token `i` in [`join_json_with_tokens`].
pub fn token_placeholder(i: usize) -> String {
    format!("${{Token[{}]}}", i)
}

fn next_token(s: &str, count: usize) -> Option<(usize, usize, usize)> {
    (0..count)
        .filter_map(|i| {
            let p = token_placeholder(i);
            s.find(&p).map(|start| (i, start, p.len()))
        })
        .min_by_key(|&(_, start, _)| start)
}

/// Every logical ID a value points at through `Ref` or `Fn::GetAtt`.
pub fn collect_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("Ref") {
                out.push(target.clone());
            }
            if let Some(Value::Array(args)) = map.get("Fn::GetAtt") {
                if let Some(Value::String(target)) = args.first() {
                    out.push(target.clone());
                }
            }
            for v in map.values() {
                collect_references(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_references(v, out);
            }
        }
        _ => {}
    }
}

/// True for `AWS::Region` and friends.
pub fn is_pseudo_parameter(name: &str) -> bool {
    name.starts_with("AWS::")
}
