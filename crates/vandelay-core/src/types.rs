use crate::error::VandelayError;
use serde::{Deserialize, Serialize};
use std::fmt;

fn invalid(field: &str, value: &str) -> VandelayError {
    VandelayError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Network,
    Cluster,
    Role,
    Secret,
    Bucket,
    LogSink,
    TaskDefinition,
    Workload,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Network => "network",
            NodeKind::Cluster => "cluster",
            NodeKind::Role => "role",
            NodeKind::Secret => "secret",
            NodeKind::Bucket => "bucket",
            NodeKind::LogSink => "log_sink",
            NodeKind::TaskDefinition => "task_definition",
            NodeKind::Workload => "workload",
        }
    }

    /// Kinds a role may hold permission statements on.
    pub fn is_grantable(self) -> bool {
        matches!(self, NodeKind::Secret | NodeKind::Bucket | NodeKind::LogSink)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Relation
// ---------------------------------------------------------------------------

/// Edge label. Every relation also orders the plan: the target of an edge is
/// materialized before its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    DependsOn,
    GrantsAccess,
    /// Read-only trust: the source identity may fetch the target at runtime.
    Trust,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::DependsOn => "depends_on",
            Relation::GrantsAccess => "grants_access",
            Relation::Trust => "trust",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SubnetVisibility
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetVisibility {
    Public,
    Private,
}

impl SubnetVisibility {
    pub fn as_str(self) -> &'static str {
        match self {
            SubnetVisibility::Public => "public",
            SubnetVisibility::Private => "private",
        }
    }
}

impl fmt::Display for SubnetVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RemovalPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    Retain,
    DestroyWithContents,
}

impl fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemovalPolicy::Retain => "retain",
            RemovalPolicy::DestroyWithContents => "destroy_with_contents",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// AccessLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Read,
    Write,
    ReadWrite,
}

impl AccessLevel {
    pub fn includes_read(self) -> bool {
        matches!(self, AccessLevel::Read | AccessLevel::ReadWrite)
    }

    pub fn includes_write(self) -> bool {
        matches!(self, AccessLevel::Write | AccessLevel::ReadWrite)
    }

    /// Union of two levels: read merged with write yields read-write.
    pub fn merge(self, other: AccessLevel) -> AccessLevel {
        let read = self.includes_read() || other.includes_read();
        let write = self.includes_write() || other.includes_write();
        match (read, write) {
            (true, true) => AccessLevel::ReadWrite,
            (false, true) => AccessLevel::Write,
            _ => AccessLevel::Read,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::ReadWrite => "read_write",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WorkloadMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadMode {
    ScheduledServerless,
    PersistentAccelerated,
}

impl WorkloadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkloadMode::ScheduledServerless => "scheduled_serverless",
            WorkloadMode::PersistentAccelerated => "persistent_accelerated",
        }
    }

    pub fn is_accelerated(self) -> bool {
        matches!(self, WorkloadMode::PersistentAccelerated)
    }
}

impl fmt::Display for WorkloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkloadMode {
    type Err = VandelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled_serverless" | "scheduled-serverless" | "scheduled" => {
                Ok(WorkloadMode::ScheduledServerless)
            }
            "persistent_accelerated" | "persistent-accelerated" | "accelerated" => {
                Ok(WorkloadMode::PersistentAccelerated)
            }
            _ => Err(invalid("mode", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// LaunchCompatibility
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchCompatibility {
    Fargate,
    Ec2,
}

impl LaunchCompatibility {
    pub fn as_str(self) -> &'static str {
        match self {
            LaunchCompatibility::Fargate => "fargate",
            LaunchCompatibility::Ec2 => "ec2",
        }
    }
}

impl fmt::Display for LaunchCompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Warning / WarnLevel
// ---------------------------------------------------------------------------

/// A non-fatal finding surfaced alongside a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub level: WarnLevel,
    pub message: String,
}

impl Warning {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_merge_is_union() {
        assert_eq!(AccessLevel::Read.merge(AccessLevel::Read), AccessLevel::Read);
        assert_eq!(AccessLevel::Read.merge(AccessLevel::Write), AccessLevel::ReadWrite);
        assert_eq!(AccessLevel::Write.merge(AccessLevel::Write), AccessLevel::Write);
        assert_eq!(
            AccessLevel::ReadWrite.merge(AccessLevel::Read),
            AccessLevel::ReadWrite
        );
    }

    #[test]
    fn mode_parses_aliases() {
        assert_eq!(
            "scheduled".parse::<WorkloadMode>().unwrap(),
            WorkloadMode::ScheduledServerless
        );
        assert_eq!(
            "persistent-accelerated".parse::<WorkloadMode>().unwrap(),
            WorkloadMode::PersistentAccelerated
        );
        assert!("gpu".parse::<WorkloadMode>().is_err());
    }

    #[test]
    fn mode_yaml_is_snake_case() {
        let yaml = serde_yaml::to_string(&WorkloadMode::PersistentAccelerated).unwrap();
        assert_eq!(yaml.trim(), "persistent_accelerated");
    }

    #[test]
    fn only_storage_like_kinds_are_grantable() {
        assert!(NodeKind::Bucket.is_grantable());
        assert!(NodeKind::Secret.is_grantable());
        assert!(NodeKind::LogSink.is_grantable());
        assert!(!NodeKind::Cluster.is_grantable());
        assert!(!NodeKind::Role.is_grantable());
    }
}
