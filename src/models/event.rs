use crate::models::{Address, ContentKind, EntityId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Kind of change reported by the object-store layer
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
    Shared,
}

/// A content-change event consumed by the index agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Event identifier
    pub id: Uuid,

    /// Owning entity
    pub entity: EntityId,

    /// Kind of change
    pub change_type: ChangeType,

    /// Content kind of the referenced object
    pub content_kind: ContentKind,

    /// Address of the referenced object
    pub address: Address,

    /// Time the change was observed
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(
        entity: EntityId,
        change_type: ChangeType,
        content_kind: ContentKind,
        address: impl Into<Address>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity,
            change_type,
            content_kind,
            address: address.into(),
            occurred_at: Utc::now(),
        }
    }
}
