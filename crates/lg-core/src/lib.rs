//! Core model for the lead grid
//!
//! This crate holds the record model, the remote data source contract and
//! the ambient surfaces (session, notifications, settings) shared by the
//! data sources and the grid itself.

pub mod auth;
pub mod data;
pub mod lead;
pub mod notify;
pub mod record;
pub mod settings;
pub mod value;

use thiserror::Error;

// Re-export commonly used types
pub use auth::{AuthProvider, Session, StaticAuth};
pub use data::{
    ChangeEvent, ChangeFeed, ChangeKind, Filter, Page, Query, Repository, Search, SortDirection,
    TenantScope,
};
pub use lead::{CallStatus, Lead, LeadField, NewLead};
pub use notify::{Notification, NotificationLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use record::{FieldKey, Patch, Record};
pub use settings::{GridSettings, SettingsError};
pub use value::Value;

/// Identifier of a single record
pub type RecordId = uuid::Uuid;

/// Identifier of a tenant organization
pub type OrgId = uuid::Uuid;

/// Identifier of a user
pub type UserId = uuid::Uuid;

/// A field value that failed a schema check
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field}: invalid value '{value}' ({reason})")]
    Invalid {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("{field} cannot be changed after creation")]
    Immutable { field: &'static str },

    #[error("{field} is not editable")]
    NotEditable { field: &'static str },
}

impl ValidationError {
    /// Name of the offending field
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Required { field }
            | ValidationError::Invalid { field, .. }
            | ValidationError::Immutable { field }
            | ValidationError::NotEditable { field } => field,
        }
    }
}

/// Failure of a call against the remote data source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("record {0} not found")]
    NotFound(RecordId),

    #[error("rejected by data source: {0}")]
    Rejected(#[from] ValidationError),

    #[error("server error: {0}")]
    Server(String),
}
