use crate::model::Event;
use crate::projection::grid::CalendarCell;

// Caps a day's event list at max_visible slots. The input is already in
// bucket order; the policy takes the prefix and never re-sorts.
#[must_use]
pub fn apply(day_events: &[Event], max_visible: usize) -> (Vec<Event>, usize) {
    let visible: Vec<Event> = day_events.iter().take(max_visible).cloned().collect();
    let hidden = day_events.len().saturating_sub(max_visible);
    (visible, hidden)
}

#[must_use]
pub fn apply_to_cells(cells: Vec<CalendarCell>, max_visible: usize) -> Vec<CalendarCell> {
    cells
        .into_iter()
        .map(|cell| {
            let (visible_events, hidden) = apply(&cell.visible_events, max_visible);
            CalendarCell {
                hidden_count: cell.hidden_count + hidden,
                visible_events,
                ..cell
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::{apply, apply_to_cells};
    use crate::model::Event;
    use crate::projection::grid::CalendarCell;

    fn events(count: usize) -> Vec<Event> {
        let base = Utc
            .with_ymd_and_hms(2026, 3, 9, 9, 0, 0)
            .single()
            .expect("valid instant");
        (0..count)
            .map(|offset| {
                let start = base + Duration::minutes(offset as i64 * 30);
                Event {
                    id: Uuid::new_v4(),
                    name: format!("event {offset}"),
                    location: String::new(),
                    start,
                    end: start + Duration::hours(1),
                    screen_ids: BTreeSet::new(),
                    tags: vec![],
                }
            })
            .collect()
    }

    #[test]
    fn five_events_with_three_slots_hides_two() {
        let day = events(5);
        let (visible, hidden) = apply(&day, 3);
        assert_eq!(visible, day[..3].to_vec());
        assert_eq!(hidden, 2);
    }

    #[test]
    fn conservation_holds_for_any_limit() {
        let day = events(4);
        for max_visible in 0..=6 {
            let (visible, hidden) = apply(&day, max_visible);
            assert_eq!(visible.len() + hidden, day.len());
            // Visible is always a prefix of the bucket order.
            assert_eq!(visible.as_slice(), &day[..visible.len()]);
        }
    }

    #[test]
    fn caps_whole_grids() {
        let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 9).expect("valid date");
        let cells = vec![
            CalendarCell {
                date,
                in_reference_month: true,
                visible_events: events(5),
                hidden_count: 0,
            },
            CalendarCell {
                date: date.succ_opt().expect("valid date"),
                in_reference_month: true,
                visible_events: vec![],
                hidden_count: 0,
            },
        ];

        let capped = apply_to_cells(cells, 3);
        assert_eq!(capped[0].visible_events.len(), 3);
        assert_eq!(capped[0].hidden_count, 2);
        assert_eq!(capped[1].visible_events.len(), 0);
        assert_eq!(capped[1].hidden_count, 0);
    }
}
