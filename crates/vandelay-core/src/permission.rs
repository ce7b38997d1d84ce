//! Permission resolution: turns (role, resource, access) requests into the
//! minimal deduplicated statement list on each role.
//!
//! Requests are recorded by node name and may be recorded before the
//! resources they mention are declared. Nothing touches the graph until
//! [`PermissionResolver::resolve`], which checks every request first and only
//! then mutates, so a failed resolution leaves the graph as it was.

use crate::error::{Result, VandelayError};
use crate::graph::{NodeId, ResourceGraph};
use crate::resource::PermissionStatement;
use crate::types::{AccessLevel, NodeKind, Relation, Warning};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

const BUCKET_READ: &[&str] = &["s3:GetObject*", "s3:GetBucket*", "s3:List*"];
const BUCKET_WRITE: &[&str] = &[
    "s3:DeleteObject*",
    "s3:PutObject",
    "s3:PutObjectLegalHold",
    "s3:PutObjectRetention",
    "s3:PutObjectTagging",
    "s3:PutObjectVersionTagging",
    "s3:Abort*",
];
const SECRET_READ: &[&str] = &["secretsmanager:GetSecretValue", "secretsmanager:DescribeSecret"];
const SECRET_WRITE: &[&str] = &["secretsmanager:PutSecretValue", "secretsmanager:UpdateSecret"];
const LOG_READ: &[&str] = &["logs:GetLogEvents", "logs:DescribeLogStreams"];
const LOG_WRITE: &[&str] = &["logs:CreateLogStream", "logs:PutLogEvents"];

/// Actions the execution identity needs to pull images and ship logs.
/// These target every resource and are therefore marked privileged.
pub const EXECUTION_BASELINE: &[&str] = &[
    "ecr:GetAuthorizationToken",
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
];

// ---------------------------------------------------------------------------
// PermissionRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub role: String,
    pub resource: String,
    pub access: AccessLevel,
}

/// Statements granting `level` on `resource`, one per access class.
/// A read-write level yields a read statement followed by a write statement.
pub fn statements_for(kind: NodeKind, resource: &str, level: AccessLevel) -> Vec<PermissionStatement> {
    let (read, write) = match kind {
        NodeKind::Bucket => (BUCKET_READ, BUCKET_WRITE),
        NodeKind::Secret => (SECRET_READ, SECRET_WRITE),
        NodeKind::LogSink => (LOG_READ, LOG_WRITE),
        _ => return Vec::new(),
    };
    let mut out = Vec::with_capacity(2);
    if level.includes_read() {
        out.push(PermissionStatement::new(resource, AccessLevel::Read, read));
    }
    if level.includes_write() {
        out.push(PermissionStatement::new(resource, AccessLevel::Write, write));
    }
    out
}

// ---------------------------------------------------------------------------
// PermissionResolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PermissionResolver {
    requests: Vec<PermissionRequest>,
}

impl PermissionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, role: impl Into<String>, resource: impl Into<String>, access: AccessLevel) {
        self.requests.push(PermissionRequest {
            role: role.into(),
            resource: resource.into(),
            access,
        });
    }

    pub fn grant_read(&mut self, role: impl Into<String>, resource: impl Into<String>) {
        self.grant(role, resource, AccessLevel::Read);
    }

    pub fn grant_write(&mut self, role: impl Into<String>, resource: impl Into<String>) {
        self.grant(role, resource, AccessLevel::Write);
    }

    pub fn grant_read_write(&mut self, role: impl Into<String>, resource: impl Into<String>) {
        self.grant(role, resource, AccessLevel::ReadWrite);
    }

    /// Annotate every role in `graph` with its statements and add the grant
    /// and trust edges. Safe to call again after more requests are recorded:
    /// statements and edges already present are not duplicated.
    pub fn resolve(&self, graph: &mut ResourceGraph) -> Result<Vec<Warning>> {
        // Role -> [(resource, merged level)], roles in declaration order,
        // resources in first-request order.
        let mut merged: BTreeMap<NodeId, Vec<(NodeId, AccessLevel)>> = BTreeMap::new();

        for req in &self.requests {
            let role_id = graph
                .lookup(&req.role)
                .filter(|id| graph.role(*id).is_some())
                .ok_or_else(|| VandelayError::UndeclaredResource {
                    resource: req.role.clone(),
                    referenced_by: format!("permission request on '{}'", req.resource),
                })?;
            let resource_id = graph.lookup(&req.resource).ok_or_else(|| {
                VandelayError::UndeclaredResource {
                    resource: req.resource.clone(),
                    referenced_by: format!("role '{}'", req.role),
                }
            })?;
            let kind = node_kind(graph, resource_id);
            if !kind.is_grantable() {
                return Err(VandelayError::InvalidGrant {
                    role: req.role.clone(),
                    resource: req.resource.clone(),
                    kind: kind.to_string(),
                });
            }

            let grants = merged.entry(role_id).or_default();
            match grants.iter_mut().find(|(id, _)| *id == resource_id) {
                Some((_, level)) => *level = level.merge(req.access),
                None => grants.push((resource_id, req.access)),
            }
        }

        for (role_id, grants) in &merged {
            let role_name = node_name(graph, *role_id);
            for (resource_id, level) in grants {
                let kind = node_kind(graph, *resource_id);
                let resource_name = node_name(graph, *resource_id);
                for statement in statements_for(kind, &resource_name, *level) {
                    if let Some(role) = graph.role_mut(*role_id) {
                        role.add_statement(&role_name, statement)?;
                    }
                }
                graph.add_edge(*role_id, *resource_id, Relation::GrantsAccess)?;
                if kind == NodeKind::Secret && level.includes_read() {
                    graph.add_edge(*role_id, *resource_id, Relation::Trust)?;
                }
                tracing::debug!(role = %role_name, resource = %resource_name, access = %level, "grant");
            }
        }

        let requested: HashSet<NodeId> = merged.keys().copied().collect();
        let warnings: Vec<Warning> = graph
            .nodes_of(NodeKind::Role)
            .filter(|n| !requested.contains(&n.id))
            .map(|n| {
                Warning::warning(format!(
                    "role '{}' has no resolved permission requests",
                    n.name
                ))
            })
            .collect();
        for w in &warnings {
            tracing::warn!("{}", w.message);
        }

        Ok(warnings)
    }
}

fn node_kind(graph: &ResourceGraph, id: NodeId) -> NodeKind {
    graph
        .node(id)
        .map(|n| n.kind())
        .unwrap_or(NodeKind::Workload)
}

fn node_name(graph: &ResourceGraph, id: NodeId) -> String {
    graph.node(id).map(|n| n.name.clone()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
