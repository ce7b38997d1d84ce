use crate::error::{Result, VandelayError};
use crate::graph::{NodeId, ResourceGraph};
use crate::permission::statements_for;
use crate::resource::{Resource, Secret};
use crate::types::{AccessLevel, NodeKind, Relation};
use regex::Regex;
use std::sync::OnceLock;

static ENV_VAR_RE: OnceLock<Regex> = OnceLock::new();

fn env_var_re() -> &'static Regex {
    ENV_VAR_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// Declare a secret held in the external store under `reference`.
pub fn declare(graph: &mut ResourceGraph, name: &str, reference: &str) -> Result<NodeId> {
    graph.add_node(
        name,
        Resource::Secret(Secret {
            reference: reference.to_string(),
        }),
    )
}

/// Inject secret `secret` into `task_definition` as env var `env_var`.
///
/// The task definition's execution role receives read access to the secret
/// and a trust edge to it, since that identity fetches the value when the
/// container starts. Binding the same pair twice is a no-op.
pub fn bind(graph: &mut ResourceGraph, task_definition: NodeId, env_var: &str, secret: &str) -> Result<()> {
    let secret_id = graph
        .lookup(secret)
        .filter(|id| graph.node(*id).map(|n| n.kind()) == Some(NodeKind::Secret))
        .ok_or_else(|| VandelayError::UnknownSecret(secret.to_string()))?;

    let task_name = graph
        .node(task_definition)
        .map(|n| n.name.clone())
        .unwrap_or_else(|| format!("node #{}", task_definition.index()));
    let invalid = |reason: &str| VandelayError::InvalidBinding {
        task_definition: task_name.clone(),
        env_var: env_var.to_string(),
        reason: reason.to_string(),
    };

    let task = graph
        .task_definition(task_definition)
        .ok_or_else(|| invalid("target is not a task definition"))?;
    if !env_var_re().is_match(env_var) {
        return Err(invalid("not a valid environment variable name"));
    }
    match task.secrets.get(env_var) {
        Some(bound) if bound == secret => return Ok(()),
        Some(bound) => {
            return Err(invalid(&format!("already bound to secret '{bound}'")));
        }
        None => {}
    }
    if task.environment.contains_key(env_var) {
        return Err(invalid("already set as a plain environment variable"));
    }

    let role_name = task.execution_role.clone();
    let role_id = graph
        .lookup(&role_name)
        .filter(|id| graph.role(*id).is_some())
        .ok_or_else(|| VandelayError::UndeclaredResource {
            resource: role_name.clone(),
            referenced_by: format!("task definition '{task_name}'"),
        })?;

    if let Some(role) = graph.role_mut(role_id) {
        for statement in statements_for(NodeKind::Secret, secret, AccessLevel::Read) {
            role.add_statement(&role_name, statement)?;
        }
    }
    graph.add_edge(role_id, secret_id, Relation::Trust)?;
    graph.add_edge(task_definition, secret_id, Relation::DependsOn)?;
    if let Some(task) = graph.task_definition_mut(task_definition) {
        task.secrets.insert(env_var.to_string(), secret.to_string());
    }

    tracing::debug!(task = %task_name, env_var, secret, "secret bound");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
