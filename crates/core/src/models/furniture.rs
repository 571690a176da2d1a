//! Furniture model - the bookable unit on the beach

use serde::{Deserialize, Serialize};

/// Furniture identity (row id in the `furniture` table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FurnitureId(pub i64);

impl std::fmt::Display for FurnitureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "furniture #{}", self.0)
    }
}

impl From<i64> for FurnitureId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A piece of beach furniture (sunbed, umbrella, balinese bed...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Furniture {
    pub id: FurnitureId,
    /// Human label painted on the item, unique across the beach
    pub number: String,
    pub zone: String,
    pub furniture_type: String,
    /// Number of guests the item seats
    pub capacity: u32,
    pub active: bool,
}

/// Furniture to insert into the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFurniture {
    pub number: String,
    pub zone: String,
    pub furniture_type: String,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl NewFurniture {
    pub fn new(number: impl Into<String>, zone: impl Into<String>, furniture_type: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            zone: zone.into(),
            furniture_type: furniture_type.into(),
            capacity: default_capacity(),
            active: true,
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

fn default_capacity() -> u32 {
    2
}

fn default_active() -> bool {
    true
}
