use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ExternalId;

/// Lifecycle status of a program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramStatus {
    #[default]
    Active,
    OnHold,
    Completed,
    Archived,
}

/// Top-level container for a body of planned work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: Uuid,
    pub external_id: ExternalId,
    pub name: String,
    pub status: ProgramStatus,
    /// Derived from the earliest planned start across the program's items.
    pub baseline_start: Option<NaiveDate>,
    /// Derived from the latest planned end across the program's items.
    pub baseline_end: Option<NaiveDate>,
    pub pm_resource_id: Option<Uuid>,
    pub secondary_pm_resource_id: Option<Uuid>,
}

impl Program {
    #[must_use]
    pub fn new(external_id: ExternalId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id,
            name: name.into(),
            status: ProgramStatus::Active,
            baseline_start: None,
            baseline_end: None,
            pm_resource_id: None,
            secondary_pm_resource_id: None,
        }
    }
}

/// A project inside a program. Unique per `(program_id, external_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub external_id: ExternalId,
    pub program_id: Uuid,
    pub name: String,
}

impl Project {
    #[must_use]
    pub fn new(program_id: Uuid, external_id: ExternalId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id,
            program_id,
            name: name.into(),
        }
    }
}

/// A phase inside a project. Unique per `(project_id, external_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: Uuid,
    pub external_id: ExternalId,
    pub project_id: Uuid,
    pub name: String,
    pub sequence: i32,
}

impl Phase {
    #[must_use]
    pub fn new(
        project_id: Uuid,
        external_id: ExternalId,
        name: impl Into<String>,
        sequence: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id,
            project_id,
            name: name.into(),
            sequence,
        }
    }
}
