use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::datetime::{parse_datetime_expr, venue_date};
use crate::model::{Event, Screen};
use crate::projection::timewindow::{EventStatus, classify};

#[derive(Debug, Clone)]
pub enum Pred {
    Id(Uuid),
    TagInclude(String),
    TagExclude(String),
    ScreenSlug(String),
    StatusEq(EventStatus),
    OnDate(NaiveDate),
    TextContains(String),
}

// Filters are conjunctive: every predicate must hold. Tokens that look like
// nothing in particular become case-insensitive text search over name and
// location, matching how the admin panel search box behaved.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    preds: Vec<Pred>,
}

impl Filter {
    #[tracing::instrument(skip(terms, now))]
    pub fn parse(terms: &[String], now: DateTime<Utc>, tz: Tz) -> anyhow::Result<Self> {
        let mut preds = Vec::with_capacity(terms.len());
        for term in terms {
            if term.trim().is_empty() {
                continue;
            }
            preds.push(parse_atom(term, now, tz)?);
        }
        Ok(Self { preds })
    }

    pub fn is_empty(&self) -> bool {
        self.preds.is_empty()
    }

    pub fn matches(&self, event: &Event, screens: &[Screen], now: DateTime<Utc>, tz: Tz) -> bool {
        self.preds
            .iter()
            .all(|pred| eval_pred(pred, event, screens, now, tz))
    }
}

fn parse_atom(term: &str, now: DateTime<Utc>, tz: Tz) -> anyhow::Result<Pred> {
    if let Some(tag) = term.strip_prefix('+') {
        return Ok(Pred::TagInclude(tag.to_string()));
    }
    if let Some(tag) = term.strip_prefix('-') {
        return Ok(Pred::TagExclude(tag.to_string()));
    }
    if let Ok(uuid) = Uuid::parse_str(term) {
        return Ok(Pred::Id(uuid));
    }

    if let Some(slug) = term.strip_prefix("screen:") {
        return Ok(Pred::ScreenSlug(slug.to_string()));
    }

    if let Some(status_text) = term.strip_prefix("status:") {
        return match status_text.parse::<EventStatus>() {
            Ok(status) => Ok(Pred::StatusEq(status)),
            Err(_) => Ok(Pred::TextContains(term.to_string())),
        };
    }

    if let Some(value) = term.strip_prefix("on:") {
        let instant = parse_datetime_expr(value, now, tz)?;
        return Ok(Pred::OnDate(venue_date(instant, tz)));
    }

    Ok(Pred::TextContains(term.to_string()))
}

fn eval_pred(pred: &Pred, event: &Event, screens: &[Screen], now: DateTime<Utc>, tz: Tz) -> bool {
    match pred {
        Pred::Id(id) => event.id == *id,
        Pred::TagInclude(tag) => event.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)),
        Pred::TagExclude(tag) => event.tags.iter().all(|t| !t.eq_ignore_ascii_case(tag)),
        Pred::ScreenSlug(slug) => screens
            .iter()
            .find(|screen| &screen.slug == slug)
            .is_some_and(|screen| event.screen_ids.contains(&screen.id)),
        Pred::StatusEq(status) => classify(now, event.start, event.end) == *status,
        Pred::OnDate(date) => venue_date(event.start, tz) == *date,
        Pred::TextContains(text) => {
            let needle = text.to_lowercase();
            event.name.to_lowercase().contains(&needle)
                || event.location.to_lowercase().contains(&needle)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Duration, TimeZone, Utc};
    use chrono_tz::America::Sao_Paulo;
    use uuid::Uuid;

    use super::Filter;
    use crate::model::{Event, Orientation, Screen};

    fn screen(slug: &str) -> Screen {
        Screen::new(
            slug.to_string(),
            slug.to_string(),
            Orientation::Horizontal,
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0)
                .single()
                .expect("valid now"),
        )
    }

    fn event(name: &str, location: &str, tags: &[&str], screens: &[Uuid]) -> Event {
        let start = Utc
            .with_ymd_and_hms(2026, 3, 9, 12, 0, 0)
            .single()
            .expect("valid instant");
        Event {
            id: Uuid::new_v4(),
            name: name.to_string(),
            location: location.to_string(),
            start,
            end: start + Duration::hours(1),
            screen_ids: screens.iter().copied().collect::<BTreeSet<_>>(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn terms(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn tags_text_and_screen_predicates() {
        let lobby = screen("lobby");
        let screens = vec![lobby.clone(), screen("cafe")];
        let workshop = event("Rust Workshop", "Hall A", &["workshop"], &[lobby.id]);
        let talk = event("Opening Talk", "Auditorium", &["talk"], &[]);

        let now = workshop.start;

        let by_tag = Filter::parse(&terms(&["+workshop"]), now, Sao_Paulo).expect("parse");
        assert!(by_tag.matches(&workshop, &screens, now, Sao_Paulo));
        assert!(!by_tag.matches(&talk, &screens, now, Sao_Paulo));

        let not_tag = Filter::parse(&terms(&["-workshop"]), now, Sao_Paulo).expect("parse");
        assert!(!not_tag.matches(&workshop, &screens, now, Sao_Paulo));
        assert!(not_tag.matches(&talk, &screens, now, Sao_Paulo));

        let by_screen = Filter::parse(&terms(&["screen:lobby"]), now, Sao_Paulo).expect("parse");
        assert!(by_screen.matches(&workshop, &screens, now, Sao_Paulo));
        assert!(!by_screen.matches(&talk, &screens, now, Sao_Paulo));

        let by_text = Filter::parse(&terms(&["auditorium"]), now, Sao_Paulo).expect("parse");
        assert!(by_text.matches(&talk, &screens, now, Sao_Paulo));
        assert!(!by_text.matches(&workshop, &screens, now, Sao_Paulo));
    }

    #[test]
    fn status_and_date_predicates() {
        let screens = vec![];
        let workshop = event("Workshop", "Hall A", &[], &[]);

        let during = workshop.start + chrono::Duration::minutes(30);
        let after = workshop.end + chrono::Duration::hours(1);

        let active = Filter::parse(&terms(&["status:active"]), during, Sao_Paulo).expect("parse");
        assert!(active.matches(&workshop, &screens, during, Sao_Paulo));
        assert!(!active.matches(&workshop, &screens, after, Sao_Paulo));

        let on_day = Filter::parse(&terms(&["on:2026-03-09"]), during, Sao_Paulo).expect("parse");
        assert!(on_day.matches(&workshop, &screens, during, Sao_Paulo));

        let other_day =
            Filter::parse(&terms(&["on:2026-03-10"]), during, Sao_Paulo).expect("parse");
        assert!(!other_day.matches(&workshop, &screens, during, Sao_Paulo));
    }

    #[test]
    fn conjunction_requires_every_predicate() {
        let lobby = screen("lobby");
        let screens = vec![lobby.clone()];
        let workshop = event("Rust Workshop", "Hall A", &["workshop"], &[lobby.id]);
        let now = workshop.start;

        let both =
            Filter::parse(&terms(&["+workshop", "screen:lobby"]), now, Sao_Paulo).expect("parse");
        assert!(both.matches(&workshop, &screens, now, Sao_Paulo));

        let mismatch =
            Filter::parse(&terms(&["+workshop", "screen:cafe"]), now, Sao_Paulo).expect("parse");
        assert!(!mismatch.matches(&workshop, &screens, now, Sao_Paulo));
    }
}
