use crate::error::{Result, VandelayError};
use crate::schedule;
use crate::types::{RemovalPolicy, SubnetVisibility, Warning, WarnLevel, WorkloadMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_BUCKET_NAME: &str = "art-vandelay";

/// Container env var carrying the bucket name. Set by composition only.
pub const BUCKET_ENV_VAR: &str = "S3_BUCKET";

/// Upper bound on availability zones per network.
pub const MAX_AZS: u32 = 6;

// ---------------------------------------------------------------------------
// StackConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default = "default_stack_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

fn default_stack_name() -> String {
    "art-vandelay".to_string()
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            name: default_stack_name(),
            account: None,
            region: None,
        }
    }
}

// ---------------------------------------------------------------------------
// NetworkConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_max_azs")]
    pub max_azs: u32,
    #[serde(default = "default_true")]
    pub public_subnets: bool,
    #[serde(default = "default_true")]
    pub private_subnets: bool,
}

fn default_max_azs() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_azs: default_max_azs(),
            public_subnets: true,
            private_subnets: true,
        }
    }
}

// ---------------------------------------------------------------------------
// BucketConfig
// ---------------------------------------------------------------------------

/// How a missing bucket name is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketNamePolicy {
    /// Fall back to the default name for scheduled-serverless; require an
    /// explicit name for persistent-accelerated.
    #[default]
    PerMode,
    /// Always fall back to the default name.
    AlwaysDefault,
    /// Never fall back.
    Required,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub name_policy: BucketNamePolicy,
    #[serde(default = "default_removal")]
    pub removal: RemovalPolicy,
}

fn default_removal() -> RemovalPolicy {
    RemovalPolicy::DestroyWithContents
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            name: None,
            name_policy: BucketNamePolicy::default(),
            removal: default_removal(),
        }
    }
}

// ---------------------------------------------------------------------------
// TaskConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default = "default_tag")]
    pub tag: String,
}

fn default_repository() -> String {
    "art-vandelay".to_string()
}

fn default_tag() -> String {
    "latest".to_string()
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            tag: default_tag(),
        }
    }
}

/// Container sizing and runtime settings. Sizes left unset take the
/// selected mode's profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mib: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_units: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator_count: Option<u32>,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_stream_prefix: Option<String>,
}

// ---------------------------------------------------------------------------
// Mode-specific sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_expression")]
    pub expression: String,
    #[serde(default = "default_schedule_subnet")]
    pub subnet: SubnetVisibility,
}

fn default_schedule_expression() -> String {
    schedule::DEFAULT_SCHEDULE.to_string()
}

fn default_schedule_subnet() -> SubnetVisibility {
    SubnetVisibility::Public
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            expression: default_schedule_expression(),
            subnet: default_schedule_subnet(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityConfig {
    #[serde(default = "default_instance_class")]
    pub instance_class: String,
    #[serde(default = "default_accelerator_type")]
    pub accelerator_type: String,
    #[serde(default = "default_one")]
    pub accelerators_per_instance: u32,
    #[serde(default = "default_one")]
    pub min_count: u32,
    #[serde(default = "default_one")]
    pub max_count: u32,
}

fn default_instance_class() -> String {
    "g4dn.xlarge".to_string()
}

fn default_accelerator_type() -> String {
    "nvidia-t4".to_string()
}

fn default_one() -> u32 {
    1
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            instance_class: default_instance_class(),
            accelerator_type: default_accelerator_type(),
            accelerators_per_instance: 1,
            min_count: 1,
            max_count: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_one")]
    pub desired_count: u32,
    #[serde(default = "default_service_subnet")]
    pub subnet: SubnetVisibility,
}

fn default_service_subnet() -> SubnetVisibility {
    SubnetVisibility::Private
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            desired_count: 1,
            subnet: default_service_subnet(),
        }
    }
}

// ---------------------------------------------------------------------------
// SecretConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretConfig {
    /// Node name of the secret in the graph.
    pub name: String,
    /// Name in the external secret store.
    pub reference: String,
    /// Container env var; defaults to `reference`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

impl SecretConfig {
    pub fn env_var(&self) -> &str {
        self.env_var.as_deref().unwrap_or(&self.reference)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub stack: StackConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_user_arn: Option<String>,
    pub mode: WorkloadMode,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub bucket: BucketConfig,
    #[serde(default)]
    pub task: TaskConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<CapacityConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<SecretConfig>,
    #[serde(default = "default_true")]
    pub manual_trigger: bool,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(mode: WorkloadMode) -> Self {
        Self {
            version: 1,
            stack: StackConfig::default(),
            iam_user_arn: None,
            mode,
            network: NetworkConfig::default(),
            bucket: BucketConfig::default(),
            task: TaskConfig::default(),
            schedule: None,
            capacity: None,
            service: None,
            secrets: Vec::new(),
            manual_trigger: true,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VandelayError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// Overlay values from the process environment (or any lookup).
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(arn) = get("AWS_IAM_ARN") {
            self.iam_user_arn = Some(arn);
        }
        if let Some(bucket) = get("S3_BUCKET") {
            self.bucket.name = Some(bucket);
        }
        if let Some(account) = get("AWS_ACCOUNT_ID") {
            self.stack.account = Some(account);
        }
        if let Some(region) = get("AWS_REGION") {
            self.stack.region = Some(region);
        }
    }

    // -----------------------------------------------------------------------
    // Required inputs
    // -----------------------------------------------------------------------

    pub fn iam_user_arn(&self) -> Result<&str> {
        self.iam_user_arn
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VandelayError::MissingConfig("iam_user_arn (AWS_IAM_ARN)".to_string()))
    }

    pub fn account(&self) -> Result<&str> {
        self.stack
            .account
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VandelayError::MissingConfig("stack.account (AWS_ACCOUNT_ID)".to_string()))
    }

    pub fn region(&self) -> Result<&str> {
        self.stack
            .region
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VandelayError::MissingConfig("stack.region (AWS_REGION)".to_string()))
    }

    /// The bucket name after applying the name policy.
    pub fn bucket_name(&self) -> Result<String> {
        if let Some(name) = self.bucket.name.as_deref().filter(|s| !s.trim().is_empty()) {
            return Ok(name.to_string());
        }
        let use_default = match self.bucket.name_policy {
            BucketNamePolicy::AlwaysDefault => true,
            BucketNamePolicy::Required => false,
            BucketNamePolicy::PerMode => !self.mode.is_accelerated(),
        };
        if use_default {
            Ok(DEFAULT_BUCKET_NAME.to_string())
        } else {
            Err(VandelayError::MissingConfig(format!(
                "bucket.name (S3_BUCKET) is required in {} mode",
                self.mode
            )))
        }
    }

    pub fn image_reference(&self) -> Result<String> {
        Ok(format!(
            "{}.dkr.ecr.{}.amazonaws.com/{}:{}",
            self.account()?,
            self.region()?,
            self.task.image.repository,
            self.task.image.tag
        ))
    }

    pub fn max_azs(&self) -> Result<u32> {
        let n = self.network.max_azs;
        if (1..=MAX_AZS).contains(&n) {
            Ok(n)
        } else {
            Err(VandelayError::InvalidValue {
                field: format!("network.max_azs (1..={MAX_AZS})"),
                value: n.to_string(),
            })
        }
    }

    /// Plain environment for the container. `S3_BUCKET` is reserved.
    pub fn environment(&self) -> Result<&BTreeMap<String, String>> {
        match self.task.environment.get(BUCKET_ENV_VAR) {
            Some(value) => Err(VandelayError::InvalidValue {
                field: format!("task.environment.{BUCKET_ENV_VAR} (reserved, set from bucket.name)"),
                value: value.clone(),
            }),
            None => Ok(&self.task.environment),
        }
    }

    pub fn schedule_or_default(&self) -> ScheduleConfig {
        self.schedule.clone().unwrap_or_default()
    }

    pub fn capacity_or_default(&self) -> CapacityConfig {
        self.capacity.clone().unwrap_or_default()
    }

    pub fn service_or_default(&self) -> ServiceConfig {
        self.service.clone().unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Non-fatal findings. Fatal problems surface from composition itself.
    pub fn validate(&self) -> Vec<Warning> {
        let mut warnings = Vec::new();

        // 1. Required inputs and hard limits, reported here so `validate` shows all of them
        for missing in [
            self.iam_user_arn().err(),
            self.account().err(),
            self.region().err(),
            self.bucket_name().err(),
            self.max_azs().err(),
            self.environment().err(),
        ]
        .into_iter()
        .flatten()
        {
            warnings.push(Warning::error(missing.to_string()));
        }

        // 2. Sections that the selected mode ignores
        match self.mode {
            WorkloadMode::ScheduledServerless => {
                if self.service.is_some() {
                    warnings.push(Warning::warning(
                        "'service' section is ignored in scheduled_serverless mode",
                    ));
                }
                if self.capacity.is_some() || self.task.accelerator_count.is_some() {
                    warnings.push(Warning::error(
                        "accelerator settings ('capacity', 'task.accelerator_count') \
                         are only valid in persistent_accelerated mode",
                    ));
                }
            }
            WorkloadMode::PersistentAccelerated => {
                if self.schedule.is_some() {
                    warnings.push(Warning::warning(
                        "'schedule' section is ignored in persistent_accelerated mode",
                    ));
                }
            }
        }

        // 3. Schedule syntax
        if let Some(sched) = &self.schedule {
            if let Err(e) = schedule::validate(&sched.expression) {
                warnings.push(Warning::error(e.to_string()));
            }
        }

        // 4. Mutable image tag
        if self.task.image.tag == "latest" {
            warnings.push(Warning::warning(format!(
                "image '{}' uses the mutable 'latest' tag",
                self.task.image.repository
            )));
        }

        // 5. Empty environment values
        for (key, value) in &self.task.environment {
            if value.is_empty() {
                warnings.push(Warning::warning(format!(
                    "environment variable '{key}' has an empty value"
                )));
            }
        }

        // 6. Secret env vars colliding with plain environment
        for secret in &self.secrets {
            if self.task.environment.contains_key(secret.env_var()) {
                warnings.push(Warning::error(format!(
                    "secret '{}' and task.environment both define '{}'",
                    secret.name,
                    secret.env_var()
                )));
            }
        }

        warnings
    }

    pub fn has_errors(warnings: &[Warning]) -> bool {
        warnings.iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
