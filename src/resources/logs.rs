//! WT-008: CloudWatch log groups and the awslogs driver block.

use crate::core::error::SynthError;
use crate::core::stack::Stack;
use crate::core::template::{reference, CfnResource, REGION};
use crate::core::types::RetentionDays;
use serde_json::{json, Value};

/// Retention applied when the workload does not set one.
pub const DEFAULT_RETENTION: RetentionDays = RetentionDays::TwoYears;

/// Add a retained log group at `path`.
pub fn build_log_group(stack: &mut Stack, path: &[&str], retention: RetentionDays) -> Result<String, SynthError> {
    let properties = match retention.days() {
        Some(days) => json!({"RetentionInDays": days}),
        None => Value::Null,
    };
    stack.add_resource(path, CfnResource::new("AWS::Logs::LogGroup", properties).retain())
}

/// An `awslogs` log driver writing to a log group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsLogDriver {
    pub log_group_id: String,
    pub stream_prefix: String,
}

impl AwsLogDriver {
    /// `LogConfiguration` block for a container definition.
    pub fn log_configuration(&self) -> Value {
        json!({
            "LogDriver": "awslogs",
            "Options": {
                "awslogs-group": reference(&self.log_group_id),
                "awslogs-region": reference(REGION),
                "awslogs-stream-prefix": self.stream_prefix,
            },
        })
    }
}
