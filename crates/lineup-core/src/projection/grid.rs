use anyhow::anyhow;
use chrono::{Datelike, NaiveDate};

use crate::datetime::{end_of_week, first_of_month, last_of_month, start_of_week};
use crate::model::Event;
use crate::projection::ProjectionConfig;
use crate::projection::bucket;

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub in_reference_month: bool,
    pub visible_events: Vec<Event>,
    pub hidden_count: usize,
}

// Builds the month grid spanning whole weeks, from the week containing the
// 1st through the week containing the last day. Cells outside the reference
// month are populated like any other so the grid stays rectangular. Overflow
// capping is a separate pass (overflow::apply_to_cells); cells leave with
// every event visible and hidden_count 0.
#[tracing::instrument(skip(events, cfg, reference_month), fields(reference = %reference_month))]
pub fn build(
    events: &[Event],
    reference_month: NaiveDate,
    cfg: &ProjectionConfig,
) -> anyhow::Result<Vec<CalendarCell>> {
    let first = first_of_month(reference_month)?;
    let last = last_of_month(reference_month)?;
    let grid_start = start_of_week(first, cfg.week_start);
    let grid_end = end_of_week(last, cfg.week_start);

    let mut buckets = bucket::by_calendar_day(events, cfg.timezone);

    let mut cells = Vec::new();
    let mut day = grid_start;
    while day <= grid_end {
        let in_reference_month =
            day.year() == reference_month.year() && day.month() == reference_month.month();
        cells.push(CalendarCell {
            date: day,
            in_reference_month,
            visible_events: buckets.remove(&day).unwrap_or_default(),
            hidden_count: 0,
        });
        day = day
            .succ_opt()
            .ok_or_else(|| anyhow!("calendar overflow past {day}"))?;
    }

    Ok(cells)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Datelike, NaiveDate, TimeZone, Utc};
    use chrono_tz::America::Sao_Paulo;
    use uuid::Uuid;

    use super::build;
    use crate::datetime::WeekStart;
    use crate::model::Event;
    use crate::projection::ProjectionConfig;

    fn cfg(week_start: WeekStart) -> ProjectionConfig {
        ProjectionConfig {
            timezone: Sao_Paulo,
            week_start,
            max_visible: 3,
            included_weekdays: vec![chrono::Weekday::Mon],
            retain_current_week: true,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn event_on(day: NaiveDate, hour: u32) -> Event {
        let start = Sao_Paulo
            .with_ymd_and_hms(day.year(), day.month(), day.day(), hour, 0, 0)
            .single()
            .expect("valid local instant")
            .with_timezone(&Utc);
        Event {
            id: Uuid::new_v4(),
            name: format!("event {day} {hour}h"),
            location: String::new(),
            start,
            end: start + chrono::Duration::hours(1),
            screen_ids: BTreeSet::new(),
            tags: vec![],
        }
    }

    #[test]
    fn grid_is_always_whole_weeks() {
        let months = [
            date(2026, 1, 1),
            date(2026, 2, 1),
            date(2026, 3, 15),
            date(2026, 5, 31),
            date(2024, 2, 10),
            date(2026, 12, 1),
        ];
        for month in months {
            for week_start in [WeekStart::Sunday, WeekStart::Monday] {
                let cells = build(&[], month, &cfg(week_start)).expect("grid");
                assert_eq!(
                    cells.len() % 7,
                    0,
                    "month {month} start {} produced {} cells",
                    week_start.label(),
                    cells.len()
                );
                assert!(cells.iter().all(|cell| cell.hidden_count == 0));
            }
        }
    }

    #[test]
    fn short_month_aligned_to_week_start_is_four_rows() {
        // Feb 2026 starts on a Sunday and has exactly 28 days.
        let cells = build(&[], date(2026, 2, 1), &cfg(WeekStart::Sunday)).expect("grid");
        assert_eq!(cells.len(), 28);
        assert!(cells.iter().all(|cell| cell.in_reference_month));

        // Monday-first shifts the same month to six partial weeks.
        let cells = build(&[], date(2026, 2, 1), &cfg(WeekStart::Monday)).expect("grid");
        assert_eq!(cells.len(), 35);
        assert!(!cells[0].in_reference_month);
    }

    #[test]
    fn out_of_month_cells_still_carry_events() {
        // March 2026, Sunday-first: the grid starts on Sunday 2026-03-01 and
        // ends on Saturday 2026-04-04.
        let april_event = event_on(date(2026, 4, 2), 10);
        let cells = build(
            &[april_event.clone()],
            date(2026, 3, 1),
            &cfg(WeekStart::Sunday),
        )
        .expect("grid");

        let cell = cells
            .iter()
            .find(|cell| cell.date == date(2026, 4, 2))
            .expect("trailing cell");
        assert!(!cell.in_reference_month);
        assert_eq!(cell.visible_events, vec![april_event]);
    }

    #[test]
    fn every_event_in_range_lands_in_exactly_one_cell() {
        let events = vec![
            event_on(date(2026, 3, 2), 9),
            event_on(date(2026, 3, 2), 11),
            event_on(date(2026, 3, 17), 14),
            event_on(date(2026, 3, 31), 20),
            // Outside the March grid entirely.
            event_on(date(2026, 5, 10), 9),
        ];

        let cells = build(&events, date(2026, 3, 1), &cfg(WeekStart::Sunday)).expect("grid");

        let mut seen = Vec::new();
        for cell in &cells {
            for event in &cell.visible_events {
                assert!(!seen.contains(&event.id), "event duplicated across cells");
                seen.push(event.id);
            }
        }
        assert_eq!(seen.len(), 4);

        let rebuilt = build(&events, date(2026, 3, 1), &cfg(WeekStart::Sunday)).expect("grid");
        assert_eq!(cells, rebuilt);
    }
}
