use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use trailkeeper_core::{AppError, AppResult, NonEmptyString, TenantId};
use uuid::Uuid;

/// Functional area an audit event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    /// Login, logout and session lifecycle actions.
    Authentication,
    /// Permission checks and policy decisions.
    Authorization,
    /// Reads and exports of tenant data.
    DataAccess,
    /// Platform and tenant configuration changes.
    Configuration,
    /// Workflow definition and execution actions.
    Workflow,
    /// Third-party integration actions.
    Integration,
    /// Stored credential and secret access.
    Credential,
    /// User and membership administration.
    UserManagement,
    /// Actions initiated by the platform itself.
    System,
}

impl AuditCategory {
    /// Returns a stable storage value for this category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::DataAccess => "data_access",
            Self::Configuration => "configuration",
            Self::Workflow => "workflow",
            Self::Integration => "integration",
            Self::Credential => "credential",
            Self::UserManagement => "user_management",
            Self::System => "system",
        }
    }
}

impl FromStr for AuditCategory {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "authentication" => Ok(Self::Authentication),
            "authorization" => Ok(Self::Authorization),
            "data_access" => Ok(Self::DataAccess),
            "configuration" => Ok(Self::Configuration),
            "workflow" => Ok(Self::Workflow),
            "integration" => Ok(Self::Integration),
            "credential" => Ok(Self::Credential),
            "user_management" => Ok(Self::UserManagement),
            "system" => Ok(Self::System),
            _ => Err(AppError::Validation(format!(
                "unknown audit category '{value}'"
            ))),
        }
    }
}

/// Kind of action an audit event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Resource creation.
    Create,
    /// Resource read.
    Read,
    /// Resource update.
    Update,
    /// Resource deletion.
    Delete,
    /// Workflow or job execution.
    Execute,
    /// Successful or attempted login.
    Login,
    /// Session termination.
    Logout,
    /// Role or permission mutation.
    PermissionChange,
    /// Bulk data export.
    Export,
    /// Bulk data import.
    Import,
    /// Generic resource access.
    Access,
    /// Configuration change.
    Configure,
}

impl AuditEventType {
    /// Returns a stable storage value for this event type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Execute => "execute",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::PermissionChange => "permission_change",
            Self::Export => "export",
            Self::Import => "import",
            Self::Access => "access",
            Self::Configure => "configure",
        }
    }
}

impl FromStr for AuditEventType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "execute" => Ok(Self::Execute),
            "login" => Ok(Self::Login),
            "logout" => Ok(Self::Logout),
            "permission_change" => Ok(Self::PermissionChange),
            "export" => Ok(Self::Export),
            "import" => Ok(Self::Import),
            "access" => Ok(Self::Access),
            "configure" => Ok(Self::Configure),
            _ => Err(AppError::Validation(format!(
                "unknown audit event type '{value}'"
            ))),
        }
    }
}

/// Operational significance of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    /// Routine activity.
    Info,
    /// Suspicious or degraded activity.
    Warning,
    /// Failed operation.
    Error,
    /// Security-relevant failure or policy breach.
    Critical,
}

impl AuditSeverity {
    /// Returns a stable storage value for this severity.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for AuditSeverity {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            _ => Err(AppError::Validation(format!(
                "unknown audit severity '{value}'"
            ))),
        }
    }
}

/// Outcome of the audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Action completed.
    Success,
    /// Action failed.
    Failure,
    /// Action partially completed.
    Partial,
}

impl AuditStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Partial => "partial",
        }
    }
}

impl FromStr for AuditStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "partial" => Ok(Self::Partial),
            _ => Err(AppError::Validation(format!(
                "unknown audit status '{value}'"
            ))),
        }
    }
}

/// Identity and request context captured by the producing middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    /// Tenant scope resolved for the request.
    pub tenant_id: TenantId,
    /// Acting user identifier, when authenticated.
    pub user_id: Option<String>,
    /// Acting user email, when known.
    pub user_email: Option<String>,
    /// Session identifier, when a session exists.
    pub session_id: Option<String>,
    /// Client network address.
    pub ip_address: Option<String>,
    /// Client user agent string.
    pub user_agent: Option<String>,
}

/// Unvalidated audit event payload supplied by producers.
///
/// Required fields are optional here so that validation happens exactly once,
/// in [`AuditEvent::new`].
#[derive(Debug, Clone, Default)]
pub struct AuditEventInput {
    /// Event identifier; generated when absent.
    pub id: Option<Uuid>,
    /// Tenant scope for the event.
    pub tenant_id: Option<TenantId>,
    /// Acting user identifier.
    pub user_id: Option<String>,
    /// Acting user email.
    pub user_email: Option<String>,
    /// Functional area of the action.
    pub category: Option<AuditCategory>,
    /// Kind of action performed.
    pub event_type: Option<AuditEventType>,
    /// Free-text action label.
    pub action: String,
    /// Type of the affected resource.
    pub resource_type: Option<String>,
    /// Identifier of the affected resource.
    pub resource_id: Option<String>,
    /// Display name of the affected resource.
    pub resource_name: Option<String>,
    /// Client network address.
    pub ip_address: Option<String>,
    /// Client user agent string.
    pub user_agent: Option<String>,
    /// Operational significance.
    pub severity: Option<AuditSeverity>,
    /// Outcome of the action.
    pub status: Option<AuditStatus>,
    /// Error message for failed actions.
    pub error_message: Option<String>,
    /// Free-form metadata attached to the event.
    pub metadata: Map<String, Value>,
    /// Creation timestamp; defaults to now when absent.
    pub created_at: Option<DateTime<Utc>>,
}

impl AuditEventInput {
    /// Fills unset identity and origin fields from middleware context.
    #[must_use]
    pub fn with_context(mut self, context: &UserContext) -> Self {
        self.tenant_id = self.tenant_id.or(Some(context.tenant_id));
        self.user_id = self.user_id.or_else(|| context.user_id.clone());
        self.user_email = self.user_email.or_else(|| context.user_email.clone());
        self.ip_address = self.ip_address.or_else(|| context.ip_address.clone());
        self.user_agent = self.user_agent.or_else(|| context.user_agent.clone());

        if let Some(session_id) = &context.session_id
            && !self.metadata.contains_key("session_id")
        {
            self.metadata
                .insert("session_id".to_owned(), Value::String(session_id.clone()));
        }

        self
    }
}

/// One immutable record of a tenant-scoped action.
///
/// Constructed only through [`AuditEvent::new`]; a value of this type has
/// already passed boundary validation and is never re-validated downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub id: Uuid,
    /// Tenant scope for the event.
    pub tenant_id: TenantId,
    /// Acting user identifier.
    pub user_id: Option<String>,
    /// Acting user email.
    pub user_email: Option<String>,
    /// Functional area of the action.
    pub category: AuditCategory,
    /// Kind of action performed.
    pub event_type: AuditEventType,
    /// Free-text action label.
    pub action: NonEmptyString,
    /// Type of the affected resource.
    pub resource_type: Option<String>,
    /// Identifier of the affected resource.
    pub resource_id: Option<String>,
    /// Display name of the affected resource.
    pub resource_name: Option<String>,
    /// Client network address.
    pub ip_address: Option<String>,
    /// Client user agent string.
    pub user_agent: Option<String>,
    /// Operational significance.
    pub severity: AuditSeverity,
    /// Outcome of the action.
    pub status: AuditStatus,
    /// Error message for failed actions.
    pub error_message: Option<String>,
    /// Free-form metadata; keys serialize in sorted order.
    pub metadata: Map<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Validates producer input and fills generated defaults.
    pub fn new(input: AuditEventInput) -> AppResult<Self> {
        let tenant_id = input
            .tenant_id
            .ok_or_else(|| AppError::Validation("tenant_id is required".to_owned()))?;
        let category = input
            .category
            .ok_or_else(|| AppError::Validation("category is required".to_owned()))?;
        let event_type = input
            .event_type
            .ok_or_else(|| AppError::Validation("event_type is required".to_owned()))?;
        let severity = input
            .severity
            .ok_or_else(|| AppError::Validation("severity is required".to_owned()))?;
        let status = input
            .status
            .ok_or_else(|| AppError::Validation("status is required".to_owned()))?;
        let action = NonEmptyString::new(input.action)
            .map_err(|_| AppError::Validation("action must not be empty".to_owned()))?;

        Ok(Self {
            id: input.id.unwrap_or_else(Uuid::new_v4),
            tenant_id,
            user_id: input.user_id,
            user_email: input.user_email,
            category,
            event_type,
            action,
            resource_type: input.resource_type,
            resource_id: input.resource_id,
            resource_name: input.resource_name,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            severity,
            status,
            error_message: input.error_message,
            metadata: input.metadata,
            created_at: input.created_at.unwrap_or_else(Utc::now),
        })
    }

    /// Returns the canonical JSON bytes used for hashing and archival.
    ///
    /// Field order follows the struct declaration and metadata keys are
    /// sorted, so equal events always produce identical bytes.
    pub fn canonical_bytes(&self) -> AppResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize audit event '{}': {error}",
                self.id
            ))
        })
    }
}
