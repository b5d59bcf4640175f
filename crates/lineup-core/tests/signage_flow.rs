use chrono::{TimeZone, Utc, Weekday};
use chrono_tz::America::Sao_Paulo;
use lineup_core::datastore::DataStore;
use lineup_core::datetime::WeekStart;
use lineup_core::model::{EventRecord, Orientation, Screen};
use lineup_core::projection::{self, ProjectionConfig, agenda, screen as screen_filter};
use tempfile::tempdir;

fn projection_cfg() -> ProjectionConfig {
    ProjectionConfig {
        timezone: Sao_Paulo,
        week_start: WeekStart::Sunday,
        max_visible: 3,
        included_weekdays: vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ],
        retain_current_week: true,
    }
}

fn venue_instant(day: u32, hour: u32, minute: u32) -> chrono::DateTime<Utc> {
    Sao_Paulo
        .with_ymd_and_hms(2026, 3, day, hour, minute, 0)
        .single()
        .expect("valid local instant")
        .with_timezone(&Utc)
}

#[test]
fn datastore_roundtrip_to_signage_agenda() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");

    let now = venue_instant(9, 9, 45);

    let lobby = Screen::new(
        "Lobby".to_string(),
        "lobby".to_string(),
        Orientation::Horizontal,
        now,
    );
    let cafe = Screen::new(
        "Cafe".to_string(),
        "cafe".to_string(),
        Orientation::Vertical,
        now,
    );
    store.add_screen(lobby.clone()).expect("add lobby");
    store.add_screen(cafe.clone()).expect("add cafe");

    // Slug uniqueness is enforced by the store.
    let dup = Screen::new(
        "Second Lobby".to_string(),
        "lobby".to_string(),
        Orientation::Horizontal,
        now,
    );
    assert!(store.add_screen(dup).is_err());

    // Monday 09:00-10:00 on the lobby screen only.
    let mut opening = EventRecord::new(
        "Opening Talk".to_string(),
        venue_instant(9, 9, 0),
        venue_instant(9, 10, 0),
        now,
    );
    opening.location = "Auditorium".to_string();
    opening.screen_ids = vec![lobby.id];

    // Monday 09:30-11:00 on both screens.
    let mut workshop = EventRecord::new(
        "Rust Workshop".to_string(),
        venue_instant(9, 9, 30),
        venue_instant(9, 11, 0),
        now,
    );
    workshop.screen_ids = vec![lobby.id, cafe.id];

    // Tuesday 14:00-15:00 on the cafe screen.
    let mut demo = EventRecord::new(
        "Product Demo".to_string(),
        venue_instant(10, 14, 0),
        venue_instant(10, 15, 0),
        now,
    );
    demo.screen_ids = vec![cafe.id];

    // A stray record with a broken timestamp must not poison the projection.
    let mut broken = EventRecord::new(
        "Broken".to_string(),
        venue_instant(11, 9, 0),
        venue_instant(11, 10, 0),
        now,
    );
    broken.start_date_time = "next tuesday-ish".to_string();
    broken.screen_ids = vec![lobby.id];

    for record in [&opening, &workshop, &demo, &broken] {
        store.upsert_event((*record).clone()).expect("upsert event");
    }
    assert_eq!(store.load_events().expect("load events").len(), 4);

    let records = store.load_events().expect("load events");
    let (events, malformed) = projection::normalize_events(&records);
    assert_eq!(events.len(), 3);
    assert_eq!(malformed.len(), 1);
    assert_eq!(malformed[0].name, "Broken");

    let cfg = projection_cfg();

    let lobby_events = screen_filter::for_screen(&events, lobby.id, now, &cfg);
    assert_eq!(
        lobby_events
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>(),
        vec!["Opening Talk", "Rust Workshop"]
    );

    let cafe_events = screen_filter::for_screen(&events, cafe.id, now, &cfg);
    assert_eq!(
        cafe_events
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>(),
        vec!["Rust Workshop", "Product Demo"]
    );

    let columns = agenda::build(&lobby_events, now, &cfg).expect("agenda");
    assert_eq!(columns.len(), 5);
    assert!(columns[0].is_today);
    assert_eq!(
        columns[0]
            .events
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>(),
        vec!["Opening Talk", "Rust Workshop"]
    );
    assert!(columns[1..].iter().all(|c| c.events.is_empty()));
}

#[test]
fn removing_a_screen_detaches_its_events() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");

    let now = venue_instant(9, 8, 0);
    let lobby = Screen::new(
        "Lobby".to_string(),
        "lobby".to_string(),
        Orientation::Horizontal,
        now,
    );
    store.add_screen(lobby.clone()).expect("add screen");

    let mut event = EventRecord::new(
        "Opening Talk".to_string(),
        venue_instant(9, 9, 0),
        venue_instant(9, 10, 0),
        now,
    );
    event.screen_ids = vec![lobby.id];
    store.upsert_event(event).expect("upsert event");

    store.remove_screen("lobby").expect("remove screen");
    assert!(store
        .screen_by_slug("lobby")
        .expect("lookup")
        .is_none());

    let records = store.load_events().expect("load events");
    assert_eq!(records.len(), 1);
    assert!(records[0].screen_ids.is_empty());
}
