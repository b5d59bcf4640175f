use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;

use crate::datetime::venue_date;
use crate::model::Event;

// Buckets are keyed by the venue-local calendar date of each event's start.
#[must_use]
pub fn by_calendar_day(events: &[Event], tz: Tz) -> BTreeMap<NaiveDate, Vec<Event>> {
    let mut buckets: BTreeMap<NaiveDate, Vec<Event>> = BTreeMap::new();

    for event in events {
        let day = venue_date(event.start, tz);
        buckets.entry(day).or_default().push(event.clone());
    }

    for day_events in buckets.values_mut() {
        sort_by_start(day_events);
    }

    buckets
}

// Weekday index is days-from-Sunday (0 = Sun .. 6 = Sat). Events whose
// venue-local start date falls outside the inclusive window are excluded.
#[must_use]
pub fn by_weekday(
    events: &[Event],
    week_start: NaiveDate,
    week_end: NaiveDate,
    tz: Tz,
) -> BTreeMap<u32, Vec<Event>> {
    let mut buckets: BTreeMap<u32, Vec<Event>> = BTreeMap::new();

    for event in events {
        let day = venue_date(event.start, tz);
        if day < week_start || day > week_end {
            continue;
        }
        let index = day.weekday().num_days_from_sunday();
        buckets.entry(index).or_default().push(event.clone());
    }

    for day_events in buckets.values_mut() {
        sort_by_start(day_events);
    }

    buckets
}

// Ascending by start instant, ties broken by id so ordering is stable across
// recomputations.
pub fn sort_by_start(events: &mut [Event]) {
    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{NaiveDate, TimeZone, Utc};
    use chrono_tz::America::Sao_Paulo;
    use uuid::Uuid;

    use super::{by_calendar_day, by_weekday};
    use crate::model::Event;

    fn event(name: &str, start: chrono::DateTime<Utc>) -> Event {
        Event {
            id: Uuid::new_v4(),
            name: name.to_string(),
            location: String::new(),
            start,
            end: start + chrono::Duration::hours(1),
            screen_ids: BTreeSet::new(),
            tags: vec![],
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn buckets_use_venue_local_dates() {
        // 2026-03-10 01:30 UTC is 22:30 on 2026-03-09 in Sao Paulo.
        let late = event(
            "late",
            Utc.with_ymd_and_hms(2026, 3, 10, 1, 30, 0)
                .single()
                .expect("valid instant"),
        );
        let morning = event(
            "morning",
            Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0)
                .single()
                .expect("valid instant"),
        );

        let buckets = by_calendar_day(&[late.clone(), morning.clone()], Sao_Paulo);
        assert_eq!(buckets.len(), 1);
        let day = buckets.get(&date(2026, 3, 9)).expect("one bucket");
        assert_eq!(day.len(), 2);
        assert_eq!(day[0].name, "morning");
        assert_eq!(day[1].name, "late");
    }

    #[test]
    fn ties_break_by_id() {
        let start = Utc
            .with_ymd_and_hms(2026, 3, 9, 12, 0, 0)
            .single()
            .expect("valid instant");
        let a = event("a", start);
        let b = event("b", start);

        let forward = by_calendar_day(&[a.clone(), b.clone()], Sao_Paulo);
        let reversed = by_calendar_day(&[b.clone(), a.clone()], Sao_Paulo);
        assert_eq!(forward, reversed);

        let day = forward.get(&date(2026, 3, 9)).expect("bucket");
        assert!(day[0].id < day[1].id);
    }

    #[test]
    fn weekday_buckets_respect_window() {
        let monday = event(
            "in week",
            Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0)
                .single()
                .expect("valid instant"),
        );
        let next_monday = event(
            "next week",
            Utc.with_ymd_and_hms(2026, 3, 16, 12, 0, 0)
                .single()
                .expect("valid instant"),
        );

        let buckets = by_weekday(
            &[monday.clone(), next_monday],
            date(2026, 3, 8),
            date(2026, 3, 14),
            Sao_Paulo,
        );

        let mondays = buckets.get(&1).expect("monday bucket");
        assert_eq!(mondays.len(), 1);
        assert_eq!(mondays[0].name, "in week");
    }
}
