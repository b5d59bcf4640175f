use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::datetime::{venue_date, week_bounds};
use crate::model::Event;
use crate::projection::ProjectionConfig;
use crate::projection::bucket;

// Projects the full event set down to one screen. An event is kept iff the
// screen is targeted and it has not ended yet — or, with retain_current_week,
// it started somewhere in the venue-local week containing `now`, so a signage
// screen keeps showing the week's earlier events until the week rolls over.
#[tracing::instrument(skip(events, cfg, screen_id), fields(screen = %screen_id))]
pub fn for_screen(
    events: &[Event],
    screen_id: Uuid,
    now: DateTime<Utc>,
    cfg: &ProjectionConfig,
) -> Vec<Event> {
    let (week_start, week_end) = week_bounds(venue_date(now, cfg.timezone), cfg.week_start);

    let mut kept: Vec<Event> = events
        .iter()
        .filter(|event| {
            if !event.screen_ids.contains(&screen_id) {
                return false;
            }
            if event.end >= now {
                return true;
            }
            if !cfg.retain_current_week {
                return false;
            }
            let start_day = venue_date(event.start, cfg.timezone);
            start_day >= week_start && start_day <= week_end
        })
        .cloned()
        .collect();

    bucket::sort_by_start(&mut kept);
    kept
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Duration, TimeZone, Utc, Weekday};
    use chrono_tz::America::Sao_Paulo;
    use uuid::Uuid;

    use super::for_screen;
    use crate::datetime::WeekStart;
    use crate::model::Event;
    use crate::projection::ProjectionConfig;
    use crate::projection::timewindow::{EventStatus, classify};

    fn cfg(retain: bool) -> ProjectionConfig {
        ProjectionConfig {
            timezone: Sao_Paulo,
            week_start: WeekStart::Sunday,
            max_visible: 3,
            included_weekdays: vec![Weekday::Mon, Weekday::Tue],
            retain_current_week: retain,
        }
    }

    fn venue_instant(day: u32, hour: u32, minute: u32) -> chrono::DateTime<Utc> {
        Sao_Paulo
            .with_ymd_and_hms(2026, 3, day, hour, minute, 0)
            .single()
            .expect("valid local instant")
            .with_timezone(&Utc)
    }

    fn event(name: &str, start: chrono::DateTime<Utc>, hours: i64, screens: &[Uuid]) -> Event {
        Event {
            id: Uuid::new_v4(),
            name: name.to_string(),
            location: String::new(),
            start,
            end: start + Duration::hours(hours),
            screen_ids: screens.iter().copied().collect::<BTreeSet<_>>(),
            tags: vec![],
        }
    }

    #[test]
    fn retention_keeps_this_weeks_finished_events() {
        let screen = Uuid::new_v4();
        // Wednesday 2026-03-11; the event ended Tuesday.
        let now = venue_instant(11, 12, 0);
        let ended_yesterday = event("ended", venue_instant(10, 9, 0), 1, &[screen]);
        // Ended the previous Friday, outside the current week.
        let last_week = event("stale", venue_instant(6, 9, 0), 1, &[screen]);

        let retained = for_screen(
            &[ended_yesterday.clone(), last_week.clone()],
            screen,
            now,
            &cfg(true),
        );
        assert_eq!(retained, vec![ended_yesterday]);

        let strict = for_screen(&[last_week], screen, now, &cfg(false));
        assert!(strict.is_empty());
    }

    #[test]
    fn untargeted_events_never_appear() {
        let screen = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = venue_instant(9, 9, 45);

        let unassigned = event("unassigned", venue_instant(9, 10, 0), 1, &[]);
        let elsewhere = event("elsewhere", venue_instant(9, 10, 0), 1, &[other]);

        assert!(for_screen(&[unassigned, elsewhere], screen, now, &cfg(true)).is_empty());
    }

    #[test]
    fn shared_scenario_splits_by_screen() {
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();

        // Monday 2026-03-09.
        let e1 = event("e1", venue_instant(9, 9, 0), 1, &[s1]);
        let e2 = event("e2", venue_instant(9, 9, 30), 2, &[s1, s2]);
        // Tuesday 2026-03-10.
        let e3 = event("e3", venue_instant(10, 14, 0), 1, &[s2]);
        let all = vec![e3.clone(), e1.clone(), e2.clone()];

        let now = venue_instant(9, 9, 45);

        let first = for_screen(&all, s1, now, &cfg(true));
        assert_eq!(first, vec![e1.clone(), e2.clone()]);
        assert!(first
            .iter()
            .all(|e| classify(now, e.start, e.end) == EventStatus::Active));

        let second = for_screen(&all, s2, now, &cfg(true));
        assert_eq!(second, vec![e2, e3]);
    }
}
