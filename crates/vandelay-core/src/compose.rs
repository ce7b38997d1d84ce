//! Single-pass composition: configuration in, populated graph and plan out.
//!
//! Order: required inputs, graph population, permission resolution, workload
//! attachment, secret binding, mode validation, emission. Required inputs
//! are checked before the graph is touched, so a missing value leaves the
//! caller's graph as it was.

use crate::config::{Config, BUCKET_ENV_VAR};
use crate::error::Result;
use crate::graph::ResourceGraph;
use crate::mode::{self, WorkloadInputs, WorkloadNames, WorkloadShape};
use crate::paths;
use crate::permission::{PermissionResolver, EXECUTION_BASELINE};
use crate::plan::{self, Plan};
use crate::resource::{Bucket, LogSink, Network, PermissionStatement, Resource, Role, TrustPrincipal};
use crate::secret;
use crate::types::{WarnLevel, Warning, WorkloadMode};

/// Service principal the container platform uses to assume task roles.
pub const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

#[derive(Debug, Clone)]
pub struct Composition {
    pub graph: ResourceGraph,
    pub plan: Plan,
    pub warnings: Vec<Warning>,
}

/// Node names derived from the stack name.
#[derive(Debug, Clone)]
pub struct StackNames {
    pub network: String,
    pub bucket: String,
    pub log_sink: String,
    pub execution_role: String,
    pub task_role: String,
    pub cluster: String,
    pub task_definition: String,
    pub workload: String,
}

impl StackNames {
    pub fn new(stack: &str, mode: WorkloadMode) -> Self {
        let workload = match mode {
            WorkloadMode::ScheduledServerless => "scheduled-task",
            WorkloadMode::PersistentAccelerated => "service",
        };
        Self {
            network: format!("{stack}-vpc"),
            bucket: format!("{stack}-bucket"),
            log_sink: format!("{stack}-logs"),
            execution_role: format!("{stack}-execution-role"),
            task_role: format!("{stack}-task-role"),
            cluster: format!("{stack}-cluster"),
            task_definition: format!("{stack}-task-def"),
            workload: format!("{stack}-{workload}"),
        }
    }
}

pub fn compose(config: &Config) -> Result<Composition> {
    let mut graph = ResourceGraph::new();
    let (plan, warnings) = compose_into(&mut graph, config)?;
    Ok(Composition {
        graph,
        plan,
        warnings,
    })
}

pub fn compose_into(graph: &mut ResourceGraph, config: &Config) -> Result<(Plan, Vec<Warning>)> {
    // 1. Required inputs
    let iam_user_arn = config.iam_user_arn()?.to_string();
    let bucket_name = config.bucket_name()?;
    let image = config.image_reference()?;
    let max_azs = config.max_azs()?;
    let mut environment = config.environment()?.clone();
    let shape = WorkloadShape::select(config)?;
    let stack = config.stack.name.as_str();
    paths::validate_name(stack)?;

    let names = StackNames::new(stack, shape.mode());
    let mut warnings: Vec<Warning> = config
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Warning)
        .collect();

    // 2. Network, secrets, storage, logging
    let network = graph.add_node(
        names.network.clone(),
        Resource::Network(Network::with_zones(
            &names.network,
            max_azs,
            config.network.public_subnets,
            config.network.private_subnets,
        )),
    )?;
    for s in &config.secrets {
        secret::declare(graph, &s.name, &s.reference)?;
    }
    graph.add_node(
        names.bucket.clone(),
        Resource::Bucket(Bucket {
            bucket_name: bucket_name.clone(),
            removal: config.bucket.removal,
        }),
    )?;
    let log_sink = graph.add_node(
        names.log_sink.clone(),
        Resource::LogSink(LogSink {
            stream_prefix: config
                .task
                .log_stream_prefix
                .clone()
                .unwrap_or_else(|| stack.to_string()),
        }),
    )?;

    // 3. Identities
    let mut execution = Role::assumable_by(TrustPrincipal::Service(ECS_TASKS_PRINCIPAL.to_string()));
    execution.add_statement(
        &names.execution_role,
        PermissionStatement::privileged_wildcard(EXECUTION_BASELINE),
    )?;
    let execution_role = graph.add_node(names.execution_role.clone(), Resource::Role(execution))?;

    let mut task = Role::assumable_by(TrustPrincipal::Service(ECS_TASKS_PRINCIPAL.to_string()));
    task.trust(TrustPrincipal::Arn(iam_user_arn));
    let task_role = graph.add_node(names.task_role.clone(), Resource::Role(task))?;

    // 4. Grants
    let mut resolver = PermissionResolver::new();
    resolver.grant_read_write(&names.task_role, &names.bucket);
    for s in &config.secrets {
        resolver.grant_read(&names.task_role, &s.name);
    }
    resolver.grant_write(&names.execution_role, &names.log_sink);
    warnings.extend(resolver.resolve(graph)?);

    // 5. Workload
    environment.insert(BUCKET_ENV_VAR.to_string(), bucket_name);
    let inputs = WorkloadInputs {
        names: WorkloadNames {
            cluster: names.cluster.clone(),
            task_definition: names.task_definition.clone(),
            workload: names.workload.clone(),
        },
        network,
        execution_role,
        task_role,
        log_sink,
        image,
        environment,
        manual_trigger: config.manual_trigger,
    };
    let attached = shape.attach(graph, &inputs)?;

    // 6. Secret injection
    for s in &config.secrets {
        secret::bind(graph, attached.task_definition, s.env_var(), &s.name)?;
    }

    // 7. Mode check over the finished graph, then emit
    mode::validate_mode(graph, shape.mode())?;
    let plan = plan::emit(graph, stack)?;

    tracing::info!(
        stack,
        mode = %shape.mode(),
        resources = plan.resources.len(),
        outputs = plan.outputs.len(),
        warnings = warnings.len(),
        "composition complete"
    );

    Ok((plan, warnings))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
