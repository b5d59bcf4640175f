use anyhow::bail;
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};

use crate::datetime::{start_of_week, venue_date};
use crate::model::Event;
use crate::projection::ProjectionConfig;
use crate::projection::bucket;

#[derive(Debug, Clone, PartialEq)]
pub struct AgendaColumn {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub is_today: bool,
    pub events: Vec<Event>,
}

// One column per included weekday of the venue-local week containing
// `reference`. Columns are never slot-capped; scrolling a long day is the
// presentation layer's problem.
#[tracing::instrument(skip(events, cfg))]
pub fn build(
    events: &[Event],
    reference: DateTime<Utc>,
    cfg: &ProjectionConfig,
) -> anyhow::Result<Vec<AgendaColumn>> {
    if cfg.included_weekdays.is_empty() {
        bail!("agenda requires at least one included weekday");
    }

    let today = venue_date(reference, cfg.timezone);
    let week_start = start_of_week(today, cfg.week_start);
    let week_end = week_start.checked_add_days(Days::new(6)).unwrap_or(week_start);
    let buckets = bucket::by_weekday(events, week_start, week_end, cfg.timezone);

    let mut columns = Vec::new();
    for offset in 0..7 {
        let Some(date) = week_start.checked_add_days(Days::new(offset)) else {
            continue;
        };
        let weekday = date.weekday();
        if !cfg.included_weekdays.contains(&weekday) {
            continue;
        }
        let index = weekday.num_days_from_sunday();
        columns.push(AgendaColumn {
            date,
            weekday,
            is_today: date == today,
            events: buckets.get(&index).cloned().unwrap_or_default(),
        });
    }

    Ok(columns)
}
