//! Workload mode selection.
//!
//! The mode flag picks one of two shapes. Each shape knows how to attach its
//! Cluster, TaskDefinition and Workload nodes; [`validate_mode`] re-checks
//! the finished graph so accelerator attributes appear exactly when the mode
//! is persistent-accelerated.

use crate::config::Config;
use crate::error::{Result, VandelayError};
use crate::graph::{NodeId, ResourceGraph};
use crate::resource::{
    Capacity, Cluster, Resource, SubnetSelection, TaskDefinition, Workload,
};
use crate::schedule;
use crate::types::{LaunchCompatibility, NodeKind, Relation, SubnetVisibility, WorkloadMode};
use std::collections::BTreeMap;

/// Container sizing for the task definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskProfile {
    pub memory_mib: u32,
    pub cpu_units: u32,
    pub accelerator_count: Option<u32>,
}

impl TaskProfile {
    pub const SERVERLESS: TaskProfile = TaskProfile {
        memory_mib: 512,
        cpu_units: 256,
        accelerator_count: None,
    };

    pub const ACCELERATED: TaskProfile = TaskProfile {
        memory_mib: 4096,
        cpu_units: 1024,
        accelerator_count: Some(1),
    };
}

// ---------------------------------------------------------------------------
// WorkloadShape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum WorkloadShape {
    ScheduledServerless {
        schedule: String,
        subnet: SubnetVisibility,
        profile: TaskProfile,
    },
    PersistentAccelerated {
        capacity: Capacity,
        desired_count: u32,
        subnet: SubnetVisibility,
        profile: TaskProfile,
    },
}

fn mode_violation(node: &str, reason: impl Into<String>) -> VandelayError {
    VandelayError::ModeInvariant {
        node: node.to_string(),
        reason: reason.into(),
    }
}

impl WorkloadShape {
    pub fn scheduled_serverless(config: &Config) -> Result<Self> {
        if config.capacity.is_some() {
            return Err(mode_violation(
                "capacity",
                "capacity is only valid in persistent_accelerated mode",
            ));
        }
        if let Some(n) = config.task.accelerator_count {
            return Err(mode_violation(
                "task",
                format!("accelerator_count={n} is only valid in persistent_accelerated mode"),
            ));
        }
        let sched = config.schedule_or_default();
        schedule::validate(&sched.expression)?;
        Ok(WorkloadShape::ScheduledServerless {
            schedule: sched.expression,
            subnet: sched.subnet,
            profile: TaskProfile {
                memory_mib: config
                    .task
                    .memory_mib
                    .unwrap_or(TaskProfile::SERVERLESS.memory_mib),
                cpu_units: config
                    .task
                    .cpu_units
                    .unwrap_or(TaskProfile::SERVERLESS.cpu_units),
                accelerator_count: None,
            },
        })
    }

    pub fn persistent_accelerated(config: &Config) -> Result<Self> {
        let cap = config.capacity_or_default();
        if cap.min_count < 1 {
            return Err(mode_violation("capacity", "min_count must be at least 1"));
        }
        if cap.max_count < cap.min_count {
            return Err(mode_violation(
                "capacity",
                format!("max_count={} is below min_count={}", cap.max_count, cap.min_count),
            ));
        }
        if cap.accelerators_per_instance < 1 {
            return Err(mode_violation(
                "capacity",
                "accelerators_per_instance must be at least 1",
            ));
        }
        let accelerators = config
            .task
            .accelerator_count
            .or(TaskProfile::ACCELERATED.accelerator_count)
            .unwrap_or(1);
        if accelerators < 1 {
            return Err(mode_violation("task", "accelerator_count must be at least 1"));
        }
        if accelerators > cap.accelerators_per_instance {
            return Err(mode_violation(
                "task",
                format!(
                    "accelerator_count={accelerators} exceeds the {} available per '{}' instance",
                    cap.accelerators_per_instance, cap.instance_class
                ),
            ));
        }
        let service = config.service_or_default();
        if service.desired_count < 1 {
            return Err(mode_violation("service", "desired_count must be at least 1"));
        }
        Ok(WorkloadShape::PersistentAccelerated {
            capacity: Capacity {
                instance_class: cap.instance_class,
                accelerator_type: cap.accelerator_type,
                accelerators_per_instance: cap.accelerators_per_instance,
                min_count: cap.min_count,
                max_count: cap.max_count,
            },
            desired_count: service.desired_count,
            subnet: service.subnet,
            profile: TaskProfile {
                memory_mib: config
                    .task
                    .memory_mib
                    .unwrap_or(TaskProfile::ACCELERATED.memory_mib),
                cpu_units: config
                    .task
                    .cpu_units
                    .unwrap_or(TaskProfile::ACCELERATED.cpu_units),
                accelerator_count: Some(accelerators),
            },
        })
    }

    /// Select the shape named by the config's mode flag.
    pub fn select(config: &Config) -> Result<Self> {
        match config.mode {
            WorkloadMode::ScheduledServerless => Self::scheduled_serverless(config),
            WorkloadMode::PersistentAccelerated => Self::persistent_accelerated(config),
        }
    }

    pub fn mode(&self) -> WorkloadMode {
        match self {
            WorkloadShape::ScheduledServerless { .. } => WorkloadMode::ScheduledServerless,
            WorkloadShape::PersistentAccelerated { .. } => WorkloadMode::PersistentAccelerated,
        }
    }

    fn subnet(&self) -> SubnetVisibility {
        match self {
            WorkloadShape::ScheduledServerless { subnet, .. }
            | WorkloadShape::PersistentAccelerated { subnet, .. } => *subnet,
        }
    }

    fn profile(&self) -> TaskProfile {
        match self {
            WorkloadShape::ScheduledServerless { profile, .. }
            | WorkloadShape::PersistentAccelerated { profile, .. } => *profile,
        }
    }

    /// Add Cluster, TaskDefinition and Workload nodes wired to `inputs`.
    pub fn attach(&self, graph: &mut ResourceGraph, inputs: &WorkloadInputs) -> Result<AttachedWorkload> {
        let network_name = name_of(graph, inputs.network)?;
        let selection = SubnetSelection::of(self.subnet());
        let network = graph
            .node(inputs.network)
            .and_then(|n| n.resource.as_network())
            .ok_or_else(|| VandelayError::UndeclaredResource {
                resource: network_name.clone(),
                referenced_by: format!("workload '{}'", inputs.names.workload),
            })?;
        if !network.has_visibility(selection.visibility) {
            if selection.assign_public_ip {
                return Err(VandelayError::NoPublicSubnet {
                    workload: inputs.names.workload.clone(),
                    network: network_name,
                });
            }
            return Err(VandelayError::InvalidValue {
                field: "subnet selection".to_string(),
                value: format!("{} (network '{network_name}' has none)", selection.visibility),
            });
        }

        let capacity = match self {
            WorkloadShape::ScheduledServerless { .. } => Vec::new(),
            WorkloadShape::PersistentAccelerated { capacity, .. } => vec![capacity.clone()],
        };
        let cluster = graph.add_node(
            inputs.names.cluster.clone(),
            Resource::Cluster(Cluster {
                network: network_name,
                capacity,
            }),
        )?;
        graph.add_edge(cluster, inputs.network, Relation::DependsOn)?;

        let profile = self.profile();
        let compatibility = match self {
            WorkloadShape::ScheduledServerless { .. } => LaunchCompatibility::Fargate,
            WorkloadShape::PersistentAccelerated { .. } => LaunchCompatibility::Ec2,
        };
        let task_definition = graph.add_node(
            inputs.names.task_definition.clone(),
            Resource::TaskDefinition(TaskDefinition {
                cluster: inputs.names.cluster.clone(),
                compatibility,
                memory_mib: profile.memory_mib,
                cpu_units: profile.cpu_units,
                accelerator_count: profile.accelerator_count,
                image: inputs.image.clone(),
                environment: inputs.environment.clone(),
                secrets: BTreeMap::new(),
                log_sink: name_of(graph, inputs.log_sink)?,
                execution_role: name_of(graph, inputs.execution_role)?,
                task_role: name_of(graph, inputs.task_role)?,
            }),
        )?;
        for target in [cluster, inputs.execution_role, inputs.task_role, inputs.log_sink] {
            graph.add_edge(task_definition, target, Relation::DependsOn)?;
        }

        let workload = match self {
            WorkloadShape::ScheduledServerless { schedule, .. } => Workload::ScheduledTask {
                task_definition: inputs.names.task_definition.clone(),
                schedule: schedule.clone(),
                subnets: selection,
                manual_trigger: inputs.manual_trigger,
            },
            WorkloadShape::PersistentAccelerated { desired_count, .. } => Workload::Service {
                task_definition: inputs.names.task_definition.clone(),
                desired_count: *desired_count,
                subnets: selection,
                manual_trigger: inputs.manual_trigger,
            },
        };
        let workload = graph.add_node(inputs.names.workload.clone(), Resource::Workload(workload))?;
        graph.add_edge(workload, task_definition, Relation::DependsOn)?;
        graph.add_edge(workload, inputs.network, Relation::DependsOn)?;

        tracing::debug!(mode = %self.mode(), workload = %inputs.names.workload, "workload attached");

        Ok(AttachedWorkload {
            cluster,
            task_definition,
            workload,
        })
    }
}

fn name_of(graph: &ResourceGraph, id: NodeId) -> Result<String> {
    graph
        .node(id)
        .map(|n| n.name.clone())
        .ok_or_else(|| VandelayError::UndeclaredResource {
            resource: format!("node #{}", id.index()),
            referenced_by: "workload".to_string(),
        })
}

// ---------------------------------------------------------------------------
// Inputs / outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WorkloadNames {
    pub cluster: String,
    pub task_definition: String,
    pub workload: String,
}

#[derive(Debug, Clone)]
pub struct WorkloadInputs {
    pub names: WorkloadNames,
    pub network: NodeId,
    pub execution_role: NodeId,
    pub task_role: NodeId,
    pub log_sink: NodeId,
    pub image: String,
    pub environment: BTreeMap<String, String>,
    pub manual_trigger: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct AttachedWorkload {
    pub cluster: NodeId,
    pub task_definition: NodeId,
    pub workload: NodeId,
}

// ---------------------------------------------------------------------------
// Graph-level validation
// ---------------------------------------------------------------------------

/// Check every Cluster, TaskDefinition and Workload against `mode`.
pub fn validate_mode(graph: &ResourceGraph, mode: WorkloadMode) -> Result<()> {
    let accelerated = mode.is_accelerated();

    for node in graph.nodes_of(NodeKind::Cluster) {
        let Some(cluster) = node.resource.as_cluster() else {
            continue;
        };
        match (accelerated, cluster.capacity.as_slice()) {
            (false, []) => {}
            (false, _) => {
                return Err(mode_violation(&node.name, "capacity declared in scheduled_serverless mode"))
            }
            (true, [cap]) => {
                if cap.accelerators_per_instance < 1 || cap.min_count < 1 {
                    return Err(mode_violation(
                        &node.name,
                        "capacity needs at least one accelerator and one instance",
                    ));
                }
            }
            (true, caps) => {
                return Err(mode_violation(
                    &node.name,
                    format!("expected exactly one capacity entry, found {}", caps.len()),
                ))
            }
        }
    }

    for node in graph.nodes_of(NodeKind::TaskDefinition) {
        let Some(task) = node.resource.as_task_definition() else {
            continue;
        };
        match (accelerated, task.accelerator_count) {
            (false, None) => {}
            (false, Some(_)) => {
                return Err(mode_violation(
                    &node.name,
                    "accelerator_count set in scheduled_serverless mode",
                ))
            }
            (true, Some(n)) if n >= 1 => {}
            (true, _) => {
                return Err(mode_violation(
                    &node.name,
                    "accelerator_count must be at least 1 in persistent_accelerated mode",
                ))
            }
        }
    }

    for node in graph.nodes_of(NodeKind::Workload) {
        let Some(workload) = node.resource.as_workload() else {
            continue;
        };
        let matches_mode = match workload {
            Workload::ScheduledTask { .. } => !accelerated,
            Workload::Service { .. } => accelerated,
        };
        if !matches_mode {
            return Err(mode_violation(
                &node.name,
                format!("workload type does not match {mode} mode"),
            ));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
