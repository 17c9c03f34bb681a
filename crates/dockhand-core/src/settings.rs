use crate::error::Result;
use crate::permissions::PermissionMatrix;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_DIR: &str = "settings";
pub const SETTINGS_FILE: &str = "settings.json";

pub fn settings_path(root: &Path) -> PathBuf {
    root.join(SETTINGS_DIR).join(SETTINGS_FILE)
}

// ---------------------------------------------------------------------------
// ConfigWarning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    pub message: String,
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// How long to keep re-checking runtime state after a mutating call.
///
/// The total wait is `max_attempts × interval`, counted in attempts rather
/// than wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, interval_seconds: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

// ---------------------------------------------------------------------------
// DockerSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DockerSettings {
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_time_before_retry")]
    pub time_before_retry: u64,
    #[serde(default = "default_containers_per_message")]
    pub containers_per_message: usize,
    /// Engine socket; `None` uses the platform's local Docker defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,
}

fn default_bot_name() -> String {
    "dockhand".to_string()
}

fn default_retries() -> u32 {
    12
}

fn default_time_before_retry() -> u64 {
    5
}

fn default_containers_per_message() -> usize {
    30
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            retries: default_retries(),
            time_before_retry: default_time_before_retry(),
            containers_per_message: default_containers_per_message(),
            socket_path: None,
        }
    }
}

impl DockerSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, self.time_before_retry)
    }
}

// ---------------------------------------------------------------------------
// RemediationSettings
// ---------------------------------------------------------------------------

/// The dependency group restarted by the remediation workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemediationSettings {
    #[serde(default = "default_remediation_name")]
    pub name: String,
    #[serde(default = "default_primary")]
    pub primary: String,
    /// Started in this order once the primary is running.
    #[serde(default = "default_dependents")]
    pub dependents: Vec<String>,
    #[serde(default = "default_warmup_seconds")]
    pub warmup_seconds: u64,
    #[serde(default = "default_verify_delay_seconds")]
    pub verify_delay_seconds: u64,
}

fn default_remediation_name() -> String {
    "jfFix".to_string()
}

fn default_primary() -> String {
    "jellyfin".to_string()
}

fn default_dependents() -> Vec<String> {
    vec!["jellystat-db".to_string(), "jellystat".to_string()]
}

fn default_warmup_seconds() -> u64 {
    10
}

fn default_verify_delay_seconds() -> u64 {
    5
}

impl Default for RemediationSettings {
    fn default() -> Self {
        Self {
            name: default_remediation_name(),
            primary: default_primary(),
            dependents: default_dependents(),
            warmup_seconds: default_warmup_seconds(),
            verify_delay_seconds: default_verify_delay_seconds(),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    /// Admins and grants live in the bot's `DiscordSettings` block.
    #[serde(default, rename = "DiscordSettings", alias = "PermissionSettings")]
    pub permission_settings: PermissionMatrix,
    #[serde(default)]
    pub docker_settings: DockerSettings,
    #[serde(default)]
    pub remediation_settings: RemediationSettings,
    /// Top-level sections such as `LanguageSettings`, kept verbatim.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl Settings {
    pub fn from_json(data: &str) -> Result<Self> {
        let mut settings: Settings = serde_json::from_str(data)?;
        settings.permission_settings.prune_empty();
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let docker = &self.docker_settings;
        let fix = &self.remediation_settings;

        if docker.retries == 0 {
            warnings.push(ConfigWarning {
                message: "DockerSettings.Retries is 0; at least one attempt is always made"
                    .to_string(),
            });
        }
        if docker.containers_per_message == 0 {
            warnings.push(ConfigWarning {
                message: "DockerSettings.ContainersPerMessage is 0; listings show one container per chunk"
                    .to_string(),
            });
        }
        if fix.primary.trim().is_empty() {
            warnings.push(ConfigWarning {
                message: "RemediationSettings.Primary is empty".to_string(),
            });
        }
        if fix.dependents.contains(&fix.primary) {
            warnings.push(ConfigWarning {
                message: format!(
                    "RemediationSettings.Dependents lists the primary '{}'",
                    fix.primary
                ),
            });
        }
        for (i, name) in fix.dependents.iter().enumerate() {
            if fix.dependents[..i].contains(name) {
                warnings.push(ConfigWarning {
                    message: format!("RemediationSettings.Dependents lists '{name}' twice"),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// SettingsStore
// ---------------------------------------------------------------------------

/// Read/write contract of the settings collaborator. Errors propagate.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings>;

    fn save(&self, settings: &Settings) -> Result<()>;

    fn load_permission_matrix(&self) -> Result<PermissionMatrix> {
        Ok(self.load()?.permission_settings)
    }

    fn save_permission_matrix(&self, matrix: &PermissionMatrix) -> Result<()> {
        let mut settings = self.load()?;
        settings.permission_settings = matrix.clone();
        self.save(&settings)
    }
}

/// Settings kept in `<root>/settings/settings.json`.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    root: PathBuf,
}

impl FileSettingsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> PathBuf {
        settings_path(&self.root)
    }

    /// Write a default settings file if none exists. Returns true if written.
    pub fn ensure(&self) -> Result<bool> {
        let path = self.path();
        if path.exists() {
            return Ok(false);
        }
        let data = Settings::default().to_json()?;
        crate::io::atomic_write(&path, data.as_bytes())?;
        tracing::info!(path = %path.display(), "created default settings file");
        Ok(true)
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<Settings> {
        self.ensure()?;
        let data = std::fs::read_to_string(self.path())?;
        Settings::from_json(&data)
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let data = settings.to_json()?;
        crate::io::atomic_write(&self.path(), data.as_bytes())
    }
}
