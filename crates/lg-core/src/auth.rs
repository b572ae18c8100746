//! Identity of the signed-in user

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::data::TenantScope;
use crate::{OrgId, RemoteError, UserId};

/// The signed-in user and the organization they act for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub organization_id: OrgId,
    pub email: String,
}

impl Session {
    pub fn scope(&self) -> TenantScope {
        TenantScope {
            organization_id: self.organization_id,
        }
    }
}

/// Source of the current session
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_session(&self) -> Result<Session, RemoteError>;
}

/// Provider with a fixed session, or none when signed out
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    session: Option<Session>,
}

impl StaticAuth {
    pub fn signed_in(session: Session) -> Self {
        Self { session: Some(session) }
    }

    pub fn signed_out() -> Self {
        Self { session: None }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current_session(&self) -> Result<Session, RemoteError> {
        self.session
            .clone()
            .ok_or_else(|| RemoteError::Unauthorized("no active session".to_string()))
    }
}
