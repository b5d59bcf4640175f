pub mod agenda;
pub mod bucket;
pub mod grid;
pub mod overflow;
pub mod screen;
pub mod timewindow;

use std::collections::BTreeSet;

use anyhow::{anyhow, bail};
use chrono::Weekday;
use chrono_tz::Tz;
use tracing::warn;
use uuid::Uuid;

use crate::datetime::{self, WeekStart};
use crate::model::{Event, EventRecord};

// Per-call projection configuration; the engine never reads ambient state.
#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    pub timezone: Tz,
    pub week_start: WeekStart,
    pub max_visible: usize,
    pub included_weekdays: Vec<Weekday>,
    pub retain_current_week: bool,
}

impl ProjectionConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_visible == 0 {
            bail!("calendar.max_visible must be a positive integer");
        }
        if self.included_weekdays.is_empty() {
            bail!("agenda.weekdays must include at least one weekday");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEvent {
    pub id: Uuid,
    pub name: String,
    pub field: &'static str,
    pub raw: String,
    pub error: String,
}

// Parses persisted records into engine events. Records whose timestamps do
// not parse are excluded from every projection and reported back instead of
// failing the whole call; inverted windows are kept and degrade during
// classification.
#[tracing::instrument(skip(records))]
pub fn normalize_events(records: &[EventRecord]) -> (Vec<Event>, Vec<MalformedEvent>) {
    let mut events = Vec::with_capacity(records.len());
    let mut malformed = Vec::new();

    for record in records {
        match normalize_one(record) {
            Ok(event) => events.push(event),
            Err(bad) => {
                warn!(
                    id = %bad.id,
                    field = bad.field,
                    raw = %bad.raw,
                    error = %bad.error,
                    "excluding malformed event from projection"
                );
                malformed.push(bad);
            }
        }
    }

    (events, malformed)
}

fn normalize_one(record: &EventRecord) -> Result<Event, MalformedEvent> {
    let start = datetime::parse_instant(&record.start_date_time).map_err(|err| MalformedEvent {
        id: record.id,
        name: record.name.clone(),
        field: "start_date_time",
        raw: record.start_date_time.clone(),
        error: format!("{err:#}"),
    })?;
    let end = datetime::parse_instant(&record.end_date_time).map_err(|err| MalformedEvent {
        id: record.id,
        name: record.name.clone(),
        field: "end_date_time",
        raw: record.end_date_time.clone(),
        error: format!("{err:#}"),
    })?;

    Ok(Event {
        id: record.id,
        name: record.name.clone(),
        location: record.location.clone(),
        start,
        end,
        screen_ids: record.screen_ids.iter().copied().collect::<BTreeSet<_>>(),
        tags: record.tags.clone(),
    })
}

pub fn find_record<'a>(
    records: &'a [EventRecord],
    token: &str,
) -> anyhow::Result<&'a EventRecord> {
    let needle = token.trim().to_ascii_lowercase();
    if needle.is_empty() {
        bail!("event id is required");
    }

    let mut matches = records
        .iter()
        .filter(|record| record.id.to_string().starts_with(&needle));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no event matches id: {token}"))?;
    if matches.next().is_some() {
        bail!("event id is ambiguous: {token}");
    }
    Ok(first)
}
