//! Payload records carried inside response messages.

use serde::{Deserialize, Serialize};

use crate::identifiers::{ProjectName, ServerName};
use crate::types::Timestamp;

/// A name/value pair, used for credentials and build parameter values.
///
/// Serialised as an element whose `name` attribute carries the key and whose
/// text content carries the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValuePair {
    /// Key of the pair.
    #[serde(rename = "@name")]
    pub name: String,
    /// Value of the pair.
    #[serde(rename = "$text", default)]
    pub value: String,
}

impl NameValuePair {
    /// Creates a new pair.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Project status
// ---------------------------------------------------------------------------

/// What a project is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectActivity {
    /// Waiting for the next trigger.
    Sleeping,
    /// Polling source control for modifications.
    CheckingModifications,
    /// Running an integration.
    Building,
    /// Queued behind another integration.
    Pending,
}

impl Default for ProjectActivity {
    fn default() -> Self {
        Self::Sleeping
    }
}

/// Outcome of a project's most recent integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationStatus {
    /// The integration completed successfully.
    Success,
    /// The integration completed with a build failure.
    Failure,
    /// The integration terminated abnormally.
    Exception,
    /// The integration was cancelled before it completed.
    Cancelled,
    /// No integration has completed yet.
    Unknown,
}

impl Default for IntegrationStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Whether a project's integrator is accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectState {
    /// The integrator is running and accepting triggers.
    Running,
    /// A stop has been requested; the current activity is finishing.
    Stopping,
    /// The integrator is stopped.
    Stopped,
    /// The state could not be determined.
    Unknown,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self::Unknown
    }
}

/// The status of a single project as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "projectStatus")]
pub struct ProjectStatus {
    /// Project name.
    #[serde(rename = "@name")]
    pub name: ProjectName,
    /// Grouping category, when configured.
    #[serde(rename = "@category", skip_serializing_if = "Option::is_none", default)]
    pub category: Option<String>,
    /// Current activity of the project.
    #[serde(rename = "@activity", default)]
    pub activity: ProjectActivity,
    /// Outcome of the most recent integration.
    #[serde(rename = "@status", default)]
    pub build_status: IntegrationStatus,
    /// Whether the project's integrator is running.
    #[serde(rename = "@state", default)]
    pub state: ProjectState,
    /// Dashboard URL for the project, when configured.
    #[serde(rename = "@webUrl", skip_serializing_if = "Option::is_none", default)]
    pub web_url: Option<String>,
    /// When the last integration finished.
    #[serde(rename = "@lastBuildDate", skip_serializing_if = "Option::is_none", default)]
    pub last_build_date: Option<Timestamp>,
    /// Label of the last integration.
    #[serde(rename = "@lastBuildLabel", skip_serializing_if = "Option::is_none", default)]
    pub last_build_label: Option<String>,
    /// Label of the last successful integration.
    #[serde(
        rename = "@lastSuccessfulBuildLabel",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub last_successful_build_label: Option<String>,
    /// When the next integration is scheduled.
    #[serde(rename = "@nextBuildTime", skip_serializing_if = "Option::is_none", default)]
    pub next_build_time: Option<Timestamp>,
    /// Progress detail for the running build stage, when one is active.
    #[serde(rename = "@buildStage", skip_serializing_if = "Option::is_none", default)]
    pub build_stage: Option<String>,
    /// Queue the project integrates on.
    #[serde(rename = "@queue", skip_serializing_if = "Option::is_none", default)]
    pub queue: Option<String>,
    /// Priority within the queue; zero means unprioritised.
    #[serde(rename = "@queuePriority", default)]
    pub queue_priority: i32,
    /// Human-readable project description.
    #[serde(rename = "@description", skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    /// Logical server the status was reported by.
    #[serde(rename = "@server", skip_serializing_if = "Option::is_none", default)]
    pub server_name: Option<ServerName>,
}

// ---------------------------------------------------------------------------
// Server snapshot
// ---------------------------------------------------------------------------

/// One request waiting on an integration queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    /// Project the request belongs to.
    #[serde(rename = "@project")]
    pub project_name: ProjectName,
    /// Activity the request is queued for.
    #[serde(rename = "@activity", default)]
    pub activity: ProjectActivity,
}

/// The contents of one integration queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Queue name.
    #[serde(rename = "@name")]
    pub name: String,
    /// Requests currently on the queue, in order.
    #[serde(rename = "request", default, skip_serializing_if = "Vec::is_empty")]
    pub requests: Vec<QueuedRequest>,
}

/// A point-in-time picture of every project and queue on the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    /// Status of each configured project.
    #[serde(rename = "projectStatus", default, skip_serializing_if = "Vec::is_empty")]
    pub project_statuses: Vec<ProjectStatus>,
    /// Contents of each integration queue.
    #[serde(rename = "queue", default, skip_serializing_if = "Vec::is_empty")]
    pub queues: Vec<QueueSnapshot>,
}

// ---------------------------------------------------------------------------
// Links, users, security
// ---------------------------------------------------------------------------

/// A link to an external site associated with a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    /// Display name of the link.
    #[serde(rename = "@name")]
    pub name: String,
    /// Target URL.
    #[serde(rename = "@url")]
    pub url: String,
}

/// A user account known to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    /// Login name.
    #[serde(rename = "@userName")]
    pub user_name: String,
    /// Display name, when one is configured.
    #[serde(rename = "@displayName", skip_serializing_if = "Option::is_none", default)]
    pub display_name: Option<String>,
}

/// The outcome of checking one permission for one user on one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDiagnostics {
    /// User the check was run for.
    #[serde(rename = "@user")]
    pub user_name: String,
    /// Project the permission applies to; empty for server-level permissions.
    #[serde(rename = "@project", default)]
    pub project_name: String,
    /// Permission that was checked.
    #[serde(rename = "@permission")]
    pub permission: String,
    /// Whether the permission is granted.
    #[serde(rename = "@allowed", default)]
    pub allowed: bool,
}

/// One entry from the server's security audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// When the event occurred.
    #[serde(rename = "@timestamp")]
    pub time_of_event: Timestamp,
    /// Project the event relates to, when project-scoped.
    #[serde(rename = "@project", skip_serializing_if = "Option::is_none", default)]
    pub project_name: Option<String>,
    /// User that triggered the event.
    #[serde(rename = "@user", skip_serializing_if = "Option::is_none", default)]
    pub user_name: Option<String>,
    /// Kind of event (login, force build, configuration change, ...).
    #[serde(rename = "@eventType", default)]
    pub event_type: String,
    /// Security right the event exercised.
    #[serde(rename = "@eventRight", default)]
    pub security_right: String,
    /// Free-form detail recorded with the event.
    #[serde(rename = "$text", default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Build parameters
// ---------------------------------------------------------------------------

/// Describes one parameter a project's build accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Parameter name, as passed back in a forced build.
    #[serde(rename = "@name")]
    pub name: String,
    /// Name shown to the user.
    #[serde(rename = "@displayName", skip_serializing_if = "Option::is_none", default)]
    pub display_name: Option<String>,
    /// Parameter kind (text, select, boolean, ...).
    #[serde(rename = "@kind", default)]
    pub kind: String,
    /// Whether a value must be supplied.
    #[serde(rename = "@required", default)]
    pub required: bool,
    /// Value used when the caller supplies none.
    #[serde(rename = "@defaultValue", skip_serializing_if = "Option::is_none", default)]
    pub default_value: Option<String>,
    /// Allowed values, for parameters restricted to a fixed set.
    #[serde(rename = "value", default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
}
