use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn label(self) -> &'static str {
        match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        }
    }
}

impl std::str::FromStr for Orientation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "horizontal" | "h" => Ok(Orientation::Horizontal),
            "vertical" | "v" => Ok(Orientation::Vertical),
            other => Err(anyhow::anyhow!("invalid orientation: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Screen {
    pub id: Uuid,

    pub name: String,

    pub slug: String,

    pub orientation: Orientation,

    pub created: DateTime<Utc>,
}

impl Screen {
    pub fn new(name: String, slug: String, orientation: Orientation, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            slug,
            orientation,
            created: now,
        }
    }
}

// Timestamps stay as the raw persisted strings here; parsing happens at the
// projection boundary so one bad record cannot take down a whole view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub id: Uuid,

    pub name: String,

    #[serde(default)]
    pub location: String,

    pub start_date_time: String,

    pub end_date_time: String,

    #[serde(default)]
    pub screen_ids: Vec<Uuid>,

    #[serde(default)]
    pub tags: Vec<String>,

    pub created: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(
        name: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            location: String::new(),
            start_date_time: start.to_rfc3339(),
            end_date_time: end.to_rfc3339(),
            screen_ids: vec![],
            tags: vec![],
            created: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub screen_ids: BTreeSet<Uuid>,
    pub tags: Vec<String>,
}
