//! Resource graph: typed nodes joined by dependency, grant and trust edges.
//!
//! An edge `from -> to` means `from` needs `to` to exist first. The graph
//! refuses any edge that would close a cycle, and `resolve` produces the
//! materialization order (Kahn's algorithm, ties broken by declaration order).

use crate::error::{Result, VandelayError};
use crate::paths;
use crate::resource::{Resource, Role, TaskDefinition};
use crate::types::{NodeKind, Relation};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

// ---------------------------------------------------------------------------
// Node / Edge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub resource: Resource,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.resource.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub relation: Relation,
}

// ---------------------------------------------------------------------------
// ResourceGraph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<String, NodeId>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>, resource: Resource) -> Result<NodeId> {
        let name = name.into();
        paths::validate_name(&name)?;
        if self.index.contains_key(&name) {
            return Err(VandelayError::DuplicateNode(name));
        }
        let id = NodeId(self.nodes.len());
        tracing::debug!(node = %name, kind = %resource.kind(), "add node");
        self.index.insert(name.clone(), id);
        self.nodes.push(Node { id, name, resource });
        Ok(id)
    }

    /// Add `from -> to`. Returns false if the identical edge already exists.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, relation: Relation) -> Result<bool> {
        let from_name = self.name_of(from)?.to_string();
        let to_name = self.name_of(to)?.to_string();

        if self.has_edge(from, to, relation) {
            return Ok(false);
        }
        if from == to || self.reaches(to, from) {
            return Err(VandelayError::Cycle {
                from: from_name,
                to: to_name,
            });
        }
        self.edges.push(Edge { from, to, relation });
        Ok(true)
    }

    pub fn has_edge(&self, from: NodeId, to: NodeId, relation: Relation) -> bool {
        self.edges
            .iter()
            .any(|e| e.from == from && e.to == to && e.relation == relation)
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn nodes_of(&self, kind: NodeKind) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(move |n| n.kind() == kind)
    }

    pub fn edges_from(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.from == id)
    }

    /// Distinct targets of `id`'s outgoing edges, in edge insertion order.
    pub fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.edges_from(id)
            .filter(|e| seen.insert(e.to))
            .map(|e| e.to)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn role(&self, id: NodeId) -> Option<&Role> {
        self.node(id).and_then(|n| n.resource.as_role())
    }

    pub(crate) fn role_mut(&mut self, id: NodeId) -> Option<&mut Role> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.resource) {
            Some(Resource::Role(r)) => Some(r),
            _ => None,
        }
    }

    pub fn task_definition(&self, id: NodeId) -> Option<&TaskDefinition> {
        self.node(id).and_then(|n| n.resource.as_task_definition())
    }

    pub(crate) fn task_definition_mut(&mut self, id: NodeId) -> Option<&mut TaskDefinition> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.resource) {
            Some(Resource::TaskDefinition(t)) => Some(t),
            _ => None,
        }
    }

    fn name_of(&self, id: NodeId) -> Result<&str> {
        self.node(id)
            .map(|n| n.name.as_str())
            .ok_or_else(|| VandelayError::UndeclaredResource {
                resource: format!("node #{}", id.0),
                referenced_by: "edge".to_string(),
            })
    }

    fn reaches(&self, start: NodeId, goal: NodeId) -> bool {
        let mut stack = vec![start];
        let mut visited = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == goal {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.extend(self.edges_from(id).map(|e| e.to));
        }
        false
    }

    // -----------------------------------------------------------------------
    // Topological resolution
    // -----------------------------------------------------------------------

    /// Materialization order: every node appears after all of its edge
    /// targets. Among ready nodes the earliest declared goes first.
    pub fn resolve(&self) -> Result<Vec<NodeId>> {
        // Adjacency: target -> dependents; in_degree counts unmet edges.
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        let mut in_degree: Vec<usize> = vec![0; self.nodes.len()];
        for edge in &self.edges {
            dependents[edge.to.0].push(edge.from.0);
            in_degree[edge.from.0] += 1;
        }

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(i)) = ready.pop() {
            order.push(NodeId(i));
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() < self.nodes.len() {
            let processed: HashSet<NodeId> = order.iter().copied().collect();
            let stuck: Vec<&Edge> = self
                .edges
                .iter()
                .filter(|e| !processed.contains(&e.from) && !processed.contains(&e.to))
                .collect();
            let (from, to) = stuck
                .first()
                .map(|e| (self.nodes[e.from.0].name.clone(), self.nodes[e.to.0].name.clone()))
                .unwrap_or_default();
            return Err(VandelayError::Cycle { from, to });
        }

        Ok(order)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Bucket, Secret, TrustPrincipal};
    use crate::types::RemovalPolicy;

    fn secret(reference: &str) -> Resource {
        Resource::Secret(Secret {
            reference: reference.to_string(),
        })
    }

    fn bucket(name: &str) -> Resource {
        Resource::Bucket(Bucket {
            bucket_name: name.to_string(),
            removal: RemovalPolicy::Retain,
        })
    }

    fn role() -> Resource {
        Resource::Role(Role::assumable_by(TrustPrincipal::Service(
            "ecs-tasks.amazonaws.com".to_string(),
        )))
    }

    #[test]
    fn add_and_lookup() {
        let mut g = ResourceGraph::new();
        let id = g.add_node("met-api-key", secret("MET_API_KEY")).unwrap();
        assert_eq!(g.lookup("met-api-key"), Some(id));
        assert_eq!(g.node(id).unwrap().kind(), NodeKind::Secret);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut g = ResourceGraph::new();
        g.add_node("data", bucket("a")).unwrap();
        let err = g.add_node("data", bucket("b")).unwrap_err();
        assert!(matches!(err, VandelayError::DuplicateNode(ref n) if n == "data"));
    }

    #[test]
    fn invalid_name_rejected() {
        let mut g = ResourceGraph::new();
        assert!(matches!(
            g.add_node("Not Valid", bucket("a")),
            Err(VandelayError::InvalidName(_))
        ));
        assert!(g.is_empty());
    }

    #[test]
    fn identical_edge_is_noop() {
        let mut g = ResourceGraph::new();
        let r = g.add_node("task-role", role()).unwrap();
        let s = g.add_node("met-api-key", secret("MET_API_KEY")).unwrap();
        assert!(g.add_edge(r, s, Relation::Trust).unwrap());
        assert!(!g.add_edge(r, s, Relation::Trust).unwrap());
        assert!(g.add_edge(r, s, Relation::GrantsAccess).unwrap());
        assert_eq!(g.edges().len(), 2);
        assert_eq!(g.dependencies(r), vec![s]);
    }

    #[test]
    fn self_edge_is_cycle() {
        let mut g = ResourceGraph::new();
        let a = g.add_node("a", bucket("a")).unwrap();
        let err = g.add_edge(a, a, Relation::DependsOn).unwrap_err();
        assert!(matches!(err, VandelayError::Cycle { .. }));
    }

    #[test]
    fn closing_edge_is_cycle() {
        let mut g = ResourceGraph::new();
        let a = g.add_node("a", bucket("a")).unwrap();
        let b = g.add_node("b", bucket("b")).unwrap();
        let c = g.add_node("c", bucket("c")).unwrap();
        g.add_edge(a, b, Relation::DependsOn).unwrap();
        g.add_edge(b, c, Relation::DependsOn).unwrap();
        let err = g.add_edge(c, a, Relation::GrantsAccess).unwrap_err();
        match err {
            VandelayError::Cycle { from, to } => {
                assert_eq!(from, "c");
                assert_eq!(to, "a");
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        // Graph unchanged by the rejected edge
        assert_eq!(g.edges().len(), 2);
        assert!(g.resolve().is_ok());
    }

    #[test]
    fn edge_to_unknown_node_rejected() {
        let mut g = ResourceGraph::new();
        let a = g.add_node("a", bucket("a")).unwrap();
        let err = g.add_edge(a, NodeId(7), Relation::DependsOn).unwrap_err();
        assert!(matches!(err, VandelayError::UndeclaredResource { .. }));
    }

    #[test]
    fn resolve_orders_dependencies_first() {
        let mut g = ResourceGraph::new();
        let role_id = g.add_node("task-role", role()).unwrap();
        let bucket_id = g.add_node("data", bucket("art")).unwrap();
        let secret_id = g.add_node("key", secret("KEY")).unwrap();
        g.add_edge(role_id, bucket_id, Relation::GrantsAccess).unwrap();
        g.add_edge(role_id, secret_id, Relation::Trust).unwrap();

        let order = g.resolve().unwrap();
        assert_eq!(order, vec![bucket_id, secret_id, role_id]);
    }

    #[test]
    fn resolve_ties_follow_declaration_order() {
        let mut g = ResourceGraph::new();
        let ids: Vec<NodeId> = ["e", "d", "c", "b", "a"]
            .iter()
            .map(|n| g.add_node(*n, bucket(n)).unwrap())
            .collect();
        assert_eq!(g.resolve().unwrap(), ids);
    }

    #[test]
    fn resolve_is_stable_across_calls() {
        let mut g = ResourceGraph::new();
        let a = g.add_node("a", bucket("a")).unwrap();
        let b = g.add_node("b", bucket("b")).unwrap();
        let c = g.add_node("c", bucket("c")).unwrap();
        g.add_edge(a, c, Relation::DependsOn).unwrap();
        g.add_edge(b, c, Relation::DependsOn).unwrap();
        let first = g.resolve().unwrap();
        let second = g.resolve().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec![c, a, b]);
    }

    #[test]
    fn empty_graph_resolves_empty() {
        let g = ResourceGraph::new();
        assert!(g.resolve().unwrap().is_empty());
    }
}
