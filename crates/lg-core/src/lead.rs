//! Leads: the contacts a sales team calls through
//!
//! A lead belongs to exactly one organization and one owning user. Its
//! identifier and organization never change after creation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{normalize_header, FieldKey, Record};
use crate::{OrgId, RecordId, UserId, ValidationError, Value};

/// Where a lead stands in the calling workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    Pending,
    Calling,
    NoAnswer,
    Scheduled,
    NotInterested,
}

impl CallStatus {
    pub const ALL: [CallStatus; 5] = [
        CallStatus::Pending,
        CallStatus::Calling,
        CallStatus::NoAnswer,
        CallStatus::Scheduled,
        CallStatus::NotInterested,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Pending => "pending",
            CallStatus::Calling => "calling",
            CallStatus::NoAnswer => "no_answer",
            CallStatus::Scheduled => "scheduled",
            CallStatus::NotInterested => "not_interested",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            CallStatus::Pending => "Pending",
            CallStatus::Calling => "Calling",
            CallStatus::NoAnswer => "No Answer",
            CallStatus::Scheduled => "Scheduled",
            CallStatus::NotInterested => "Bad Lead",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_header(s);
        CallStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| ValidationError::Invalid {
                field: LeadField::CallStatus.name(),
                value: s.to_string(),
                reason: "unknown call status",
            })
    }
}

impl From<CallStatus> for Value {
    fn from(status: CallStatus) -> Self {
        Value::Text(status.as_str().to_string())
    }
}

/// A lead row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: RecordId,
    pub organization_id: OrgId,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub timezone: Option<String>,
    pub call_status: CallStatus,
    pub call_attempts: i64,
    pub notes: Option<String>,
    pub source: Option<String>,
    pub last_called_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Columns of the `leads` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LeadField {
    Id,
    OrganizationId,
    UserId,
    FirstName,
    LastName,
    Email,
    Phone,
    CompanyName,
    Timezone,
    CallStatus,
    CallAttempts,
    Notes,
    Source,
    LastCalledAt,
    CreatedAt,
    UpdatedAt,
}

impl LeadField {
    pub const ALL: [LeadField; 16] = [
        LeadField::Id,
        LeadField::OrganizationId,
        LeadField::UserId,
        LeadField::FirstName,
        LeadField::LastName,
        LeadField::Email,
        LeadField::Phone,
        LeadField::CompanyName,
        LeadField::Timezone,
        LeadField::CallStatus,
        LeadField::CallAttempts,
        LeadField::Notes,
        LeadField::Source,
        LeadField::LastCalledAt,
        LeadField::CreatedAt,
        LeadField::UpdatedAt,
    ];

    /// Inline-editable columns in Tab order
    pub const EDITABLE: [LeadField; 8] = [
        LeadField::FirstName,
        LeadField::LastName,
        LeadField::Email,
        LeadField::Phone,
        LeadField::CompanyName,
        LeadField::Timezone,
        LeadField::CallStatus,
        LeadField::Notes,
    ];

    const IMMUTABLE: [LeadField; 3] = [LeadField::Id, LeadField::OrganizationId, LeadField::CreatedAt];

    const REQUIRED: [LeadField; 3] = [LeadField::FirstName, LeadField::LastName, LeadField::Phone];

    /// Column header shown above the grid
    pub fn title(&self) -> &'static str {
        match self {
            LeadField::Id => "ID",
            LeadField::OrganizationId => "Organization",
            LeadField::UserId => "Owner",
            LeadField::FirstName => "First Name",
            LeadField::LastName => "Last Name",
            LeadField::Email => "Email",
            LeadField::Phone => "Phone",
            LeadField::CompanyName => "Company",
            LeadField::Timezone => "Timezone",
            LeadField::CallStatus => "Status",
            LeadField::CallAttempts => "Attempts",
            LeadField::Notes => "Notes",
            LeadField::Source => "Source",
            LeadField::LastCalledAt => "Last Called",
            LeadField::CreatedAt => "Created",
            LeadField::UpdatedAt => "Updated",
        }
    }
}

impl fmt::Display for LeadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FieldKey for LeadField {
    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn name(&self) -> &'static str {
        match self {
            LeadField::Id => "id",
            LeadField::OrganizationId => "organization_id",
            LeadField::UserId => "user_id",
            LeadField::FirstName => "first_name",
            LeadField::LastName => "last_name",
            LeadField::Email => "email",
            LeadField::Phone => "phone",
            LeadField::CompanyName => "company_name",
            LeadField::Timezone => "timezone",
            LeadField::CallStatus => "call_status",
            LeadField::CallAttempts => "call_attempts",
            LeadField::Notes => "notes",
            LeadField::Source => "source",
            LeadField::LastCalledAt => "last_called_at",
            LeadField::CreatedAt => "created_at",
            LeadField::UpdatedAt => "updated_at",
        }
    }

    fn from_header(header: &str) -> Option<Self> {
        let normalized = normalize_header(header);
        let field = match normalized.as_str() {
            "firstname" | "first" | "given_name" => LeadField::FirstName,
            "lastname" | "last" | "surname" | "family_name" => LeadField::LastName,
            "e_mail" | "email_address" | "mail" => LeadField::Email,
            "phone_number" | "telephone" | "mobile" | "tel" => LeadField::Phone,
            "company" | "organization" | "organisation" | "business" => LeadField::CompanyName,
            "tz" | "time_zone" => LeadField::Timezone,
            "status" => LeadField::CallStatus,
            "note" | "comments" => LeadField::Notes,
            other => return Self::from_name(other),
        };
        Some(field)
    }
}

/// Insert payload for a lead
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewLead {
    pub user_id: Option<UserId>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub timezone: Option<String>,
    pub call_status: CallStatus,
    pub notes: Option<String>,
    pub source: Option<String>,
}

impl NewLead {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company_name = Some(company.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

fn text_or_null(value: Option<&String>) -> Value {
    value.cloned().into()
}

fn expect_text(field: LeadField, value: Value) -> Result<Option<String>, ValidationError> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(ValidationError::Invalid {
            field: field.name(),
            value: other.to_string(),
            reason: "expected text",
        }),
    }
}

fn expect_required_text(field: LeadField, value: Value) -> Result<String, ValidationError> {
    match expect_text(field, value)? {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ValidationError::Required { field: field.name() }),
    }
}

fn expect_uuid(field: LeadField, value: Value) -> Result<Uuid, ValidationError> {
    let raw = expect_required_text(field, value)?;
    Uuid::parse_str(&raw).map_err(|_| ValidationError::Invalid {
        field: field.name(),
        value: raw,
        reason: "expected a UUID",
    })
}

fn expect_timestamp(field: LeadField, value: Value) -> Result<Option<DateTime<Utc>>, ValidationError> {
    match value {
        Value::Null => Ok(None),
        Value::Timestamp(ts) => Ok(Some(ts)),
        Value::Text(raw) => parse_timestamp(field, &raw).map(Some),
        other => Err(ValidationError::Invalid {
            field: field.name(),
            value: other.to_string(),
            reason: "expected a timestamp",
        }),
    }
}

fn parse_timestamp(field: LeadField, raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ValidationError::Invalid {
            field: field.name(),
            value: raw.to_string(),
            reason: "expected an RFC 3339 timestamp",
        })
}

fn check_email(raw: &str) -> Result<(), ValidationError> {
    let valid = match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ValidationError::Invalid {
            field: LeadField::Email.name(),
            value: raw.to_string(),
            reason: "not an email address",
        })
    }
}

fn check_phone(raw: &str) -> Result<(), ValidationError> {
    let allowed = raw
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')' | '.'));
    let digits = raw.chars().filter(|c| c.is_ascii_digit()).count();
    if allowed && digits >= 7 {
        Ok(())
    } else {
        Err(ValidationError::Invalid {
            field: LeadField::Phone.name(),
            value: raw.to_string(),
            reason: "not a phone number",
        })
    }
}

impl Record for Lead {
    type Field = LeadField;
    type Draft = NewLead;

    const TABLE: &'static str = "leads";
    const NOUN: &'static str = "lead";

    fn id(&self) -> RecordId {
        self.id
    }

    fn organization_id(&self) -> OrgId {
        self.organization_id
    }

    fn value(&self, field: LeadField) -> Value {
        match field {
            LeadField::Id => Value::Text(self.id.to_string()),
            LeadField::OrganizationId => Value::Text(self.organization_id.to_string()),
            LeadField::UserId => Value::Text(self.user_id.to_string()),
            LeadField::FirstName => Value::Text(self.first_name.clone()),
            LeadField::LastName => Value::Text(self.last_name.clone()),
            LeadField::Email => text_or_null(self.email.as_ref()),
            LeadField::Phone => text_or_null(self.phone.as_ref()),
            LeadField::CompanyName => text_or_null(self.company_name.as_ref()),
            LeadField::Timezone => text_or_null(self.timezone.as_ref()),
            LeadField::CallStatus => self.call_status.into(),
            LeadField::CallAttempts => Value::Int(self.call_attempts),
            LeadField::Notes => text_or_null(self.notes.as_ref()),
            LeadField::Source => text_or_null(self.source.as_ref()),
            LeadField::LastCalledAt => self.last_called_at.into(),
            LeadField::CreatedAt => Value::Timestamp(self.created_at),
            LeadField::UpdatedAt => Value::Timestamp(self.updated_at),
        }
    }

    fn set_value(&mut self, field: LeadField, value: Value) -> Result<(), ValidationError> {
        match field {
            LeadField::Id => self.id = expect_uuid(field, value)?,
            LeadField::OrganizationId => self.organization_id = expect_uuid(field, value)?,
            LeadField::UserId => self.user_id = expect_uuid(field, value)?,
            LeadField::FirstName => self.first_name = expect_required_text(field, value)?,
            LeadField::LastName => self.last_name = expect_required_text(field, value)?,
            LeadField::Email => self.email = expect_text(field, value)?,
            LeadField::Phone => self.phone = expect_text(field, value)?,
            LeadField::CompanyName => self.company_name = expect_text(field, value)?,
            LeadField::Timezone => self.timezone = expect_text(field, value)?,
            LeadField::CallStatus => {
                self.call_status = expect_required_text(field, value)?.parse()?;
            }
            LeadField::CallAttempts => {
                self.call_attempts = match value {
                    Value::Int(v) if v >= 0 => v,
                    other => {
                        return Err(ValidationError::Invalid {
                            field: field.name(),
                            value: other.to_string(),
                            reason: "expected a non-negative integer",
                        })
                    }
                };
            }
            LeadField::Notes => self.notes = expect_text(field, value)?,
            LeadField::Source => self.source = expect_text(field, value)?,
            LeadField::LastCalledAt => self.last_called_at = expect_timestamp(field, value)?,
            LeadField::CreatedAt => {
                self.created_at = expect_timestamp(field, value)?
                    .ok_or(ValidationError::Required { field: field.name() })?;
            }
            LeadField::UpdatedAt => {
                self.updated_at = expect_timestamp(field, value)?
                    .ok_or(ValidationError::Required { field: field.name() })?;
            }
        }
        Ok(())
    }

    fn editable_fields() -> &'static [LeadField] {
        &LeadField::EDITABLE
    }

    fn immutable_fields() -> &'static [LeadField] {
        &LeadField::IMMUTABLE
    }

    fn required_fields() -> &'static [LeadField] {
        &LeadField::REQUIRED
    }

    fn search_field() -> LeadField {
        LeadField::LastName
    }

    fn parse_value(field: LeadField, raw: &str) -> Result<Value, ValidationError> {
        let trimmed = raw.trim();
        match field {
            LeadField::FirstName | LeadField::LastName => {
                if trimmed.is_empty() {
                    Err(ValidationError::Required { field: field.name() })
                } else {
                    Ok(Value::from(trimmed))
                }
            }
            _ if trimmed.is_empty() => Ok(Value::Null),
            LeadField::Email => check_email(trimmed).map(|_| Value::from(trimmed)),
            LeadField::Phone => check_phone(trimmed).map(|_| Value::from(trimmed)),
            LeadField::CallStatus => trimmed.parse::<CallStatus>().map(Value::from),
            LeadField::CallAttempts => match trimmed.parse::<i64>() {
                Ok(v) if v >= 0 => Ok(Value::Int(v)),
                _ => Err(ValidationError::Invalid {
                    field: field.name(),
                    value: raw.to_string(),
                    reason: "expected a non-negative integer",
                }),
            },
            LeadField::LastCalledAt | LeadField::CreatedAt | LeadField::UpdatedAt => {
                parse_timestamp(field, trimmed).map(Value::Timestamp)
            }
            LeadField::Id | LeadField::OrganizationId | LeadField::UserId => Uuid::parse_str(trimmed)
                .map(|id| Value::Text(id.to_string()))
                .map_err(|_| ValidationError::Invalid {
                    field: field.name(),
                    value: raw.to_string(),
                    reason: "expected a UUID",
                }),
            LeadField::CompanyName | LeadField::Timezone | LeadField::Notes | LeadField::Source => {
                Ok(Value::from(trimmed))
            }
        }
    }

    fn draft_from(values: &[(LeadField, Value)]) -> Result<NewLead, ValidationError> {
        let mut draft = NewLead::default();
        for (field, value) in values {
            let value = value.clone();
            match field {
                LeadField::FirstName => draft.first_name = expect_text(*field, value)?.unwrap_or_default(),
                LeadField::LastName => draft.last_name = expect_text(*field, value)?.unwrap_or_default(),
                LeadField::Email => draft.email = expect_text(*field, value)?,
                LeadField::Phone => draft.phone = expect_text(*field, value)?,
                LeadField::CompanyName => draft.company_name = expect_text(*field, value)?,
                LeadField::Timezone => draft.timezone = expect_text(*field, value)?,
                LeadField::CallStatus => {
                    if let Some(raw) = expect_text(*field, value)? {
                        draft.call_status = raw.parse()?;
                    }
                }
                LeadField::Notes => draft.notes = expect_text(*field, value)?,
                LeadField::Source => draft.source = expect_text(*field, value)?,
                // Identity, tenant, counters and timestamps are assigned by the store
                _ => {}
            }
        }

        if draft.first_name.trim().is_empty() {
            return Err(ValidationError::Required { field: LeadField::FirstName.name() });
        }
        if draft.last_name.trim().is_empty() {
            return Err(ValidationError::Required { field: LeadField::LastName.name() });
        }
        if draft.phone.is_none() {
            return Err(ValidationError::Required { field: LeadField::Phone.name() });
        }
        Ok(draft)
    }

    fn stamp_owner(draft: &mut NewLead, user_id: UserId) {
        draft.user_id = Some(user_id);
    }

    fn from_draft(id: RecordId, organization_id: OrgId, draft: NewLead, now: DateTime<Utc>) -> Self {
        Lead {
            id,
            organization_id,
            user_id: draft.user_id.unwrap_or_else(Uuid::nil),
            first_name: draft.first_name,
            last_name: draft.last_name,
            email: draft.email,
            phone: draft.phone,
            company_name: draft.company_name,
            timezone: draft.timezone,
            call_status: draft.call_status,
            call_attempts: 0,
            notes: draft.notes,
            source: draft.source,
            last_called_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
