use thiserror::Error;

#[derive(Debug, Error)]
pub enum VandelayError {
    #[error("missing required configuration: {0}")]
    MissingConfig(String),

    #[error("config not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid {field}: '{value}'")]
    InvalidValue { field: String, value: String },

    #[error("dependency cycle: edge {from} -> {to} closes a cycle")]
    Cycle { from: String, to: String },

    #[error("undeclared resource '{resource}' referenced by {referenced_by}")]
    UndeclaredResource {
        resource: String,
        referenced_by: String,
    },

    #[error("unknown secret '{0}': declare it before binding")]
    UnknownSecret(String),

    #[error("mode invariant violated on '{node}': {reason}")]
    ModeInvariant { node: String, reason: String },

    #[error("node already exists: {0}")]
    DuplicateNode(String),

    #[error("invalid name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidName(String),

    #[error("cannot grant access on {kind} '{resource}' to role '{role}'")]
    InvalidGrant {
        role: String,
        resource: String,
        kind: String,
    },

    #[error("invalid binding of '{env_var}' on '{task_definition}': {reason}")]
    InvalidBinding {
        task_definition: String,
        env_var: String,
        reason: String,
    },

    #[error("wildcard resource on role '{0}' requires a privileged statement")]
    WildcardNotPrivileged(String),

    #[error("workload '{workload}' needs a public IP but network '{network}' has no public subnet")]
    NoPublicSubnet { workload: String, network: String },

    #[error("invalid schedule expression '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VandelayError>;
