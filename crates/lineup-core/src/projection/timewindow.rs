use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Upcoming,
    Active,
    Past,
}

impl EventStatus {
    pub fn label(self) -> &'static str {
        match self {
            EventStatus::Upcoming => "upcoming",
            EventStatus::Active => "active",
            EventStatus::Past => "past",
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upcoming" => Ok(EventStatus::Upcoming),
            "active" => Ok(EventStatus::Active),
            "past" => Ok(EventStatus::Past),
            other => Err(anyhow::anyhow!("invalid status: {other}")),
        }
    }
}

// Active is inclusive on both ends. A window with end <= start is degenerate
// and is never Active: Upcoming before its start, Past from the start on.
#[must_use]
pub fn classify(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> EventStatus {
    if end <= start {
        return if now < start {
            EventStatus::Upcoming
        } else {
            EventStatus::Past
        };
    }

    if now < start {
        EventStatus::Upcoming
    } else if now <= end {
        EventStatus::Active
    } else {
        EventStatus::Past
    }
}

// Half-open interval overlap: back-to-back windows do not overlap. Degenerate
// windows collapse to their start instant.
#[must_use]
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    let a_end = a_end.max(a_start);
    let b_end = b_end.max(b_start);
    a_start < b_end && b_start < a_end
}
