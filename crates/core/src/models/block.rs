//! Administrative furniture blocks

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FurnitureId;

/// Why furniture is held back from sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Maintenance,
    VipHold,
    Event,
    Other,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Maintenance => "maintenance",
            BlockType::VipHold => "vip_hold",
            BlockType::Event => "event",
            BlockType::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "maintenance" => Some(BlockType::Maintenance),
            "vip_hold" => Some(BlockType::VipHold),
            "event" => Some(BlockType::Event),
            "other" => Some(BlockType::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A block over an inclusive date range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FurnitureBlock {
    pub id: Uuid,
    pub furniture_id: FurnitureId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub block_type: BlockType,
    pub reason: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FurnitureBlock {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Request to block furniture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFurnitureBlock {
    pub furniture_id: FurnitureId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub block_type: BlockType,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl NewFurnitureBlock {
    pub fn new(
        furniture_id: FurnitureId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        block_type: BlockType,
    ) -> Self {
        Self {
            furniture_id,
            start_date,
            end_date,
            block_type,
            reason: None,
            created_by: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }
}
