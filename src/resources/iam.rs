//! WT-009: IAM roles and inline policies shared by the task and capacity builders.

use crate::core::error::SynthError;
use crate::core::stack::Stack;
use crate::core::template::{reference, CfnResource};
use serde_json::{json, Value};

/// Add a role assumable by `service_principal` (e.g. `ecs-tasks.amazonaws.com`).
pub fn build_role(stack: &mut Stack, path: &[&str], service_principal: &str) -> Result<String, SynthError> {
    stack.add_resource(
        path,
        CfnResource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": {
                    "Statement": [{
                        "Action": "sts:AssumeRole",
                        "Effect": "Allow",
                        "Principal": {"Service": service_principal},
                    }],
                    "Version": "2012-10-17",
                },
            }),
        ),
    )
}

/// One `Allow` statement.
pub fn allow(actions: &[&str], resource: Value) -> Value {
    let action = match actions {
        [single] => json!(single),
        many => json!(many),
    };
    json!({
        "Action": action,
        "Effect": "Allow",
        "Resource": resource,
    })
}

/// Attach an inline policy with `statements` to `role_id`, at `<role path>/DefaultPolicy`.
/// Returns `None` when there is nothing to grant.
pub fn build_default_policy(
    stack: &mut Stack,
    role_path: &[&str],
    role_id: &str,
    statements: Vec<Value>,
) -> Result<Option<String>, SynthError> {
    if statements.is_empty() {
        return Ok(None);
    }
    let mut path: Vec<&str> = role_path.to_vec();
    path.push("DefaultPolicy");
    let policy_name = stack.logical_id(&path);

    let id = stack.add_resource(
        &path,
        CfnResource::new(
            "AWS::IAM::Policy",
            json!({
                "PolicyDocument": {
                    "Statement": statements,
                    "Version": "2012-10-17",
                },
                "PolicyName": policy_name,
                "Roles": [reference(role_id)],
            }),
        ),
    )?;
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AppSettings;

    #[test]
    fn test_wt009_role_principal() {
        let mut stack = Stack::new(&AppSettings::default());
        let id = build_role(&mut stack, &["TaskDef", "TaskRole"], "ecs-tasks.amazonaws.com").unwrap();
        let r = &stack.template().resources[&id];
        assert_eq!(r.resource_type, "AWS::IAM::Role");
        assert_eq!(
            r.prop("AssumeRolePolicyDocument").unwrap()["Statement"][0]["Principal"]["Service"],
            "ecs-tasks.amazonaws.com"
        );
    }

    #[test]
    fn test_wt009_allow_single_vs_many() {
        assert_eq!(allow(&["a:B"], json!("*"))["Action"], json!("a:B"));
        assert_eq!(allow(&["a:B", "a:C"], json!("*"))["Action"], json!(["a:B", "a:C"]));
    }

    #[test]
    fn test_wt009_empty_policy_skipped() {
        let mut stack = Stack::new(&AppSettings::default());
        let role = build_role(&mut stack, &["Role"], "ec2.amazonaws.com").unwrap();
        assert!(build_default_policy(&mut stack, &["Role"], &role, vec![])
            .unwrap()
            .is_none());
        let policy = build_default_policy(&mut stack, &["Role"], &role, vec![allow(&["x:Y"], json!("*"))])
            .unwrap()
            .unwrap();
        let r = &stack.template().resources[&policy];
        assert_eq!(r.prop("Roles").unwrap(), &json!([{"Ref": role}]));
        assert_eq!(r.prop("PolicyName").unwrap(), &json!(policy));
    }
}
