//! Attribute payloads carried by resource graph nodes.
//!
//! Cross-node references are stored by node name so a serialized plan stays
//! backend-neutral; the graph's edges carry the same relationships by id.

use crate::error::{Result, VandelayError};
use crate::types::{AccessLevel, LaunchCompatibility, NodeKind, RemovalPolicy, SubnetVisibility};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const WILDCARD: &str = "*";

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    Network(Network),
    Cluster(Cluster),
    Role(Role),
    Secret(Secret),
    Bucket(Bucket),
    LogSink(LogSink),
    TaskDefinition(TaskDefinition),
    Workload(Workload),
}

impl Resource {
    pub fn kind(&self) -> NodeKind {
        match self {
            Resource::Network(_) => NodeKind::Network,
            Resource::Cluster(_) => NodeKind::Cluster,
            Resource::Role(_) => NodeKind::Role,
            Resource::Secret(_) => NodeKind::Secret,
            Resource::Bucket(_) => NodeKind::Bucket,
            Resource::LogSink(_) => NodeKind::LogSink,
            Resource::TaskDefinition(_) => NodeKind::TaskDefinition,
            Resource::Workload(_) => NodeKind::Workload,
        }
    }

    pub fn as_network(&self) -> Option<&Network> {
        match self {
            Resource::Network(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_cluster(&self) -> Option<&Cluster> {
        match self {
            Resource::Cluster(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_role(&self) -> Option<&Role> {
        match self {
            Resource::Role(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_task_definition(&self) -> Option<&TaskDefinition> {
        match self {
            Resource::TaskDefinition(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_workload(&self) -> Option<&Workload> {
        match self {
            Resource::Workload(w) => Some(w),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub visibility: SubnetVisibility,
    pub zone: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub max_azs: u32,
    pub subnets: Vec<Subnet>,
}

impl Network {
    /// One subnet per zone for each enabled visibility, public first.
    pub fn with_zones(name: &str, max_azs: u32, public: bool, private: bool) -> Self {
        let mut subnets = Vec::new();
        for (enabled, visibility) in [
            (public, SubnetVisibility::Public),
            (private, SubnetVisibility::Private),
        ] {
            if !enabled {
                continue;
            }
            for zone in 1..=max_azs {
                subnets.push(Subnet {
                    id: format!("{name}-{visibility}-{zone}"),
                    visibility,
                    zone,
                });
            }
        }
        Self { max_azs, subnets }
    }

    pub fn has_visibility(&self, visibility: SubnetVisibility) -> bool {
        self.subnets.iter().any(|s| s.visibility == visibility)
    }

    pub fn first_subnet(&self, visibility: SubnetVisibility) -> Option<&Subnet> {
        self.subnets.iter().find(|s| s.visibility == visibility)
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capacity {
    pub instance_class: String,
    pub accelerator_type: String,
    pub accelerators_per_instance: u32,
    pub min_count: u32,
    pub max_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub network: String,
    #[serde(default)]
    pub capacity: Vec<Capacity>,
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPrincipal {
    /// A platform service allowed to assume the role.
    Service(String),
    /// An external identity (user or role ARN), e.g. an operator.
    Arn(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionStatement {
    pub resource: String,
    pub access: AccessLevel,
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub privileged: bool,
}

impl PermissionStatement {
    pub fn new(resource: impl Into<String>, access: AccessLevel, actions: &[&str]) -> Self {
        Self {
            resource: resource.into(),
            access,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            privileged: false,
        }
    }

    /// A statement on every resource. Only accepted when marked privileged.
    pub fn privileged_wildcard(actions: &[&str]) -> Self {
        Self {
            privileged: true,
            ..Self::new(WILDCARD, AccessLevel::ReadWrite, actions)
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.resource == WILDCARD
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub trusted_by: Vec<TrustPrincipal>,
    #[serde(default)]
    pub statements: Vec<PermissionStatement>,
}

impl Role {
    pub fn assumable_by(principal: TrustPrincipal) -> Self {
        Self {
            trusted_by: vec![principal],
            statements: Vec::new(),
        }
    }

    pub fn trust(&mut self, principal: TrustPrincipal) {
        if !self.trusted_by.contains(&principal) {
            self.trusted_by.push(principal);
        }
    }

    /// Append a statement unless an identical one is already present.
    /// Returns true if the statement was added.
    pub fn add_statement(&mut self, role_name: &str, statement: PermissionStatement) -> Result<bool> {
        if statement.is_wildcard() && !statement.privileged {
            return Err(VandelayError::WildcardNotPrivileged(role_name.to_string()));
        }
        if self.statements.contains(&statement) {
            return Ok(false);
        }
        self.statements.push(statement);
        Ok(true)
    }

    pub fn statements_on<'a>(
        &'a self,
        resource: &'a str,
    ) -> impl Iterator<Item = &'a PermissionStatement> + 'a {
        self.statements.iter().filter(move |s| s.resource == resource)
    }
}

// ---------------------------------------------------------------------------
// Secret / Bucket / LogSink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    /// Name of the secret in the external secret store.
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub bucket_name: String,
    pub removal: RemovalPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSink {
    pub stream_prefix: String,
}

// ---------------------------------------------------------------------------
// TaskDefinition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub cluster: String,
    pub compatibility: LaunchCompatibility,
    pub memory_mib: u32,
    pub cpu_units: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator_count: Option<u32>,
    pub image: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Env var name -> secret node name.
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    pub log_sink: String,
    pub execution_role: String,
    pub task_role: String,
}

// ---------------------------------------------------------------------------
// Workload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSelection {
    pub visibility: SubnetVisibility,
    pub assign_public_ip: bool,
}

impl SubnetSelection {
    pub fn public() -> Self {
        Self {
            visibility: SubnetVisibility::Public,
            assign_public_ip: true,
        }
    }

    pub fn private() -> Self {
        Self {
            visibility: SubnetVisibility::Private,
            assign_public_ip: false,
        }
    }

    pub fn of(visibility: SubnetVisibility) -> Self {
        match visibility {
            SubnetVisibility::Public => Self::public(),
            SubnetVisibility::Private => Self::private(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Workload {
    ScheduledTask {
        task_definition: String,
        schedule: String,
        subnets: SubnetSelection,
        manual_trigger: bool,
    },
    Service {
        task_definition: String,
        desired_count: u32,
        subnets: SubnetSelection,
        manual_trigger: bool,
    },
}

impl Workload {
    pub fn task_definition(&self) -> &str {
        match self {
            Workload::ScheduledTask { task_definition, .. }
            | Workload::Service { task_definition, .. } => task_definition,
        }
    }

    pub fn subnets(&self) -> SubnetSelection {
        match self {
            Workload::ScheduledTask { subnets, .. } | Workload::Service { subnets, .. } => *subnets,
        }
    }

    pub fn manual_trigger(&self) -> bool {
        match self {
            Workload::ScheduledTask { manual_trigger, .. }
            | Workload::Service { manual_trigger, .. } => *manual_trigger,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_subnets_per_zone() {
        let net = Network::with_zones("vpc", 2, true, true);
        let ids: Vec<&str> = net.subnets.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            ["vpc-public-1", "vpc-public-2", "vpc-private-1", "vpc-private-2"]
        );
        assert_eq!(
            net.first_subnet(SubnetVisibility::Public).unwrap().id,
            "vpc-public-1"
        );
    }

    #[test]
    fn network_without_public_subnets() {
        let net = Network::with_zones("vpc", 2, false, true);
        assert!(!net.has_visibility(SubnetVisibility::Public));
        assert!(net.first_subnet(SubnetVisibility::Public).is_none());
    }

    #[test]
    fn role_deduplicates_statements() {
        let mut role = Role::assumable_by(TrustPrincipal::Service("ecs-tasks.amazonaws.com".into()));
        let stmt = PermissionStatement::new("bucket", AccessLevel::Read, &["s3:GetObject*"]);
        assert!(role.add_statement("task-role", stmt.clone()).unwrap());
        assert!(!role.add_statement("task-role", stmt).unwrap());
        assert_eq!(role.statements.len(), 1);
    }

    #[test]
    fn role_rejects_unprivileged_wildcard() {
        let mut role = Role::assumable_by(TrustPrincipal::Service("ecs-tasks.amazonaws.com".into()));
        let stmt = PermissionStatement::new(WILDCARD, AccessLevel::Read, &["ecr:BatchGetImage"]);
        let err = role.add_statement("execution-role", stmt).unwrap_err();
        assert!(matches!(err, VandelayError::WildcardNotPrivileged(ref r) if r == "execution-role"));

        let ok = PermissionStatement::privileged_wildcard(&["ecr:BatchGetImage"]);
        assert!(role.add_statement("execution-role", ok).unwrap());
    }

    #[test]
    fn trust_is_deduplicated() {
        let mut role = Role::assumable_by(TrustPrincipal::Service("ecs-tasks.amazonaws.com".into()));
        role.trust(TrustPrincipal::Arn("arn:aws:iam::1:user/op".into()));
        role.trust(TrustPrincipal::Arn("arn:aws:iam::1:user/op".into()));
        assert_eq!(role.trusted_by.len(), 2);
    }

    #[test]
    fn workload_serializes_with_kind_and_type_tags() {
        let resource = Resource::Workload(Workload::Service {
            task_definition: "task-def".into(),
            desired_count: 1,
            subnets: SubnetSelection::private(),
            manual_trigger: true,
        });
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["kind"], "workload");
        assert_eq!(json["type"], "service");
        assert_eq!(json["desired_count"], 1);
    }
}
