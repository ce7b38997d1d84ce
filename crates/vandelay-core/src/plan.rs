//! Plan emission: the resolved graph as an ordered, backend-neutral list of
//! resources plus ad-hoc invocation commands.

use crate::error::{Result, VandelayError};
use crate::graph::{Node, ResourceGraph};
use crate::resource::{Resource, Workload};
use crate::types::{LaunchCompatibility, NodeKind};
use serde::{Deserialize, Serialize};

const RUN_TASK_TEMPLATE: &str = "aws ecs run-task \\
  --cluster {cluster} \\
  --launch-type {launch_type} \\
  --network-configuration \"awsvpcConfiguration={subnets=[{subnet}],securityGroups=[],assignPublicIp={public_ip}}\" \\
  --task-definition {task_definition}";

const UPDATE_SERVICE_TEMPLATE: &str = "aws ecs update-service \\
  --cluster {cluster} \\
  --service {service} \\
  --force-new-deployment";

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedResource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub attributes: Resource,
}

impl PlannedResource {
    pub fn kind(&self) -> NodeKind {
        self.attributes.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOutput {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub stack: String,
    pub resources: Vec<PlannedResource>,
    #[serde(default)]
    pub outputs: Vec<PlanOutput>,
}

impl Plan {
    pub fn resources_of(&self, kind: NodeKind) -> impl Iterator<Item = &PlannedResource> + '_ {
        self.resources.iter().filter(move |r| r.kind() == kind)
    }

    pub fn resource(&self, name: &str) -> Option<&PlannedResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Emission
// ---------------------------------------------------------------------------

/// Emit `graph` in dependency order. Equal graphs produce equal plans.
pub fn emit(graph: &ResourceGraph, stack: &str) -> Result<Plan> {
    let order = graph.resolve()?;

    let mut resources = Vec::with_capacity(order.len());
    let mut outputs = Vec::new();
    for id in order {
        let Some(node) = graph.node(id) else {
            continue;
        };
        let depends_on = graph
            .dependencies(id)
            .into_iter()
            .filter_map(|dep| graph.node(dep).map(|n| n.name.clone()))
            .collect();
        resources.push(PlannedResource {
            name: node.name.clone(),
            depends_on,
            attributes: node.resource.clone(),
        });

        if let Some(workload) = node.resource.as_workload() {
            if workload.manual_trigger() {
                outputs.push(PlanOutput {
                    name: format!("{}-adhoc-command", node.name),
                    value: adhoc_command(graph, node, workload)?,
                });
            }
        }
    }

    Ok(Plan {
        stack: stack.to_string(),
        resources,
        outputs,
    })
}

fn lookup_node<'g>(graph: &'g ResourceGraph, name: &str, referenced_by: &str) -> Result<&'g Node> {
    graph
        .lookup(name)
        .and_then(|id| graph.node(id))
        .ok_or_else(|| VandelayError::UndeclaredResource {
            resource: name.to_string(),
            referenced_by: referenced_by.to_string(),
        })
}

fn adhoc_command(graph: &ResourceGraph, node: &Node, workload: &Workload) -> Result<String> {
    let referenced_by = format!("workload '{}'", node.name);
    let task_node = lookup_node(graph, workload.task_definition(), &referenced_by)?;
    let task = task_node
        .resource
        .as_task_definition()
        .ok_or_else(|| VandelayError::UndeclaredResource {
            resource: task_node.name.clone(),
            referenced_by: referenced_by.clone(),
        })?;

    match workload {
        Workload::ScheduledTask { subnets, .. } => {
            let cluster_node = lookup_node(graph, &task.cluster, &referenced_by)?;
            let network_name = match &cluster_node.resource {
                Resource::Cluster(c) => c.network.as_str(),
                _ => "",
            };
            let network = lookup_node(graph, network_name, &referenced_by)?
                .resource
                .as_network()
                .ok_or_else(|| VandelayError::UndeclaredResource {
                    resource: network_name.to_string(),
                    referenced_by: referenced_by.clone(),
                })?;
            let subnet = network.first_subnet(subnets.visibility).ok_or_else(|| {
                VandelayError::NoPublicSubnet {
                    workload: node.name.clone(),
                    network: network_name.to_string(),
                }
            })?;
            let launch_type = match task.compatibility {
                LaunchCompatibility::Fargate => "FARGATE",
                LaunchCompatibility::Ec2 => "EC2",
            };
            let public_ip = if subnets.assign_public_ip {
                "ENABLED"
            } else {
                "DISABLED"
            };
            Ok(RUN_TASK_TEMPLATE
                .replace("{cluster}", &task.cluster)
                .replace("{launch_type}", launch_type)
                .replace("{subnet}", &subnet.id)
                .replace("{public_ip}", public_ip)
                .replace("{task_definition}", &task_node.name))
        }
        Workload::Service { .. } => Ok(UPDATE_SERVICE_TEMPLATE
            .replace("{cluster}", &task.cluster)
            .replace("{service}", &node.name)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
