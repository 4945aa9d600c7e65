//! WT-010: Synthesis errors.

/// A failure while turning a workload config into a template.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    /// Required fields missing or empty.
    #[error("invalid workload config: {0}")]
    InvalidConfig(String),

    /// Two resources mapped to the same logical ID.
    #[error("duplicate logical ID '{0}'")]
    DuplicateLogicalId(String),

    /// A `Ref`, `Fn::GetAtt`, or `DependsOn` pointing at nothing.
    #[error("resource '{from}' references unknown '{target}'")]
    DanglingReference { from: String, target: String },

    /// The resource graph is not a DAG.
    #[error("dependency cycle detected involving: {0}")]
    Cycle(String),

    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}
