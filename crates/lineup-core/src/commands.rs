use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read, Write};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::{parse_datetime_expr, parse_month_expr};
use crate::filter::Filter;
use crate::model::{EventRecord, Orientation, Screen};
use crate::projection::{self, agenda, bucket, grid, overflow, screen as screen_filter, timewindow};
use crate::render::{Renderer, short_id};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "modify",
        "delete",
        "info",
        "events",
        "list",
        "calendar",
        "agenda",
        "play",
        "screen",
        "screens",
        "stats",
        "tags",
        "export",
        "import",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv, now))]
pub fn dispatch(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();

    debug!(
        command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        "dispatching command"
    );

    match command {
        "add" => cmd_add(store, cfg, &inv.command_args, now),
        "modify" => cmd_modify(store, cfg, &inv.command_args, now),
        "delete" => cmd_delete(store, &inv.command_args),
        "info" => cmd_info(store, cfg, renderer, &inv.command_args, now),
        "events" | "list" => cmd_events(store, cfg, renderer, &inv.filter_terms, now),
        "calendar" => cmd_calendar(store, cfg, renderer, &inv.command_args, now),
        "agenda" => cmd_agenda(store, cfg, renderer, &inv.command_args, now),
        "play" => cmd_play(store, cfg, renderer, &inv.command_args),
        "screen" => cmd_screen(store, cfg, &inv.command_args, now),
        "screens" => cmd_screens(store, renderer),
        "stats" => cmd_stats(store, cfg, renderer),
        "tags" => cmd_tags(store),
        "export" => cmd_export(store),
        "import" => cmd_import(store),
        "_commands" => cmd_commands(),
        "_show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(store, cfg, args, now))]
fn cmd_add(
    store: &mut DataStore,
    cfg: &Config,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");
    let tz = cfg.projection()?.timezone;

    let (name, mods) = parse_name_and_mods(args, now, tz)?;

    let start = mods
        .iter()
        .find_map(|m| match m {
            Mod::Start(dt) => Some(*dt),
            _ => None,
        })
        .ok_or_else(|| anyhow!("add: start:<expr> is required"))?;
    let end = mods
        .iter()
        .find_map(|m| match m {
            Mod::End(dt) => Some(*dt),
            _ => None,
        })
        .ok_or_else(|| anyhow!("add: end:<expr> is required"))?;
    if end <= start {
        return Err(anyhow!("add: end must be after start"));
    }

    let screens = store.load_screens()?;
    let mut record = EventRecord::new(name, start, end, now);
    apply_mods(&mut record, &mods, &screens)?;

    store.upsert_event(record.clone())?;

    debug!(id = %record.id, "event added");
    println!("Created event {}.", short_id(record.id));
    Ok(())
}

#[instrument(skip(store, cfg, args, now))]
fn cmd_modify(
    store: &mut DataStore,
    cfg: &Config,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command modify");
    let tz = cfg.projection()?.timezone;

    let (id_token, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("modify: event id is required"))?;

    let events = store.load_events()?;
    let mut record = projection::find_record(&events, id_token)?.clone();

    let mods = parse_mods(rest, now, tz)?;
    if mods.is_empty() {
        return Err(anyhow!("modify: no modifications given"));
    }

    let screens = store.load_screens()?;
    apply_mods(&mut record, &mods, &screens)?;

    // Re-validate the window when both timestamps are parseable; a modify
    // that repairs one malformed side must not be rejected for the other.
    if let (Ok(start), Ok(end)) = (
        crate::datetime::parse_instant(&record.start_date_time),
        crate::datetime::parse_instant(&record.end_date_time),
    ) && end <= start
    {
        return Err(anyhow!("modify: end must be after start"));
    }

    store.upsert_event(record.clone())?;
    println!("Modified event {}.", short_id(record.id));
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_delete(store: &mut DataStore, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");

    let id_token = args
        .first()
        .ok_or_else(|| anyhow!("delete: event id is required"))?;

    let events = store.load_events()?;
    let record = projection::find_record(&events, id_token)?.clone();
    let removed = store.remove_event(record.id)?;

    println!("Deleted event {} ({}).", short_id(removed.id), removed.name);
    Ok(())
}

#[instrument(skip(store, cfg, renderer, args, now))]
fn cmd_info(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let tz = cfg.projection()?.timezone;

    let id_token = args
        .first()
        .ok_or_else(|| anyhow!("info: event id is required"))?;

    let records = store.load_events()?;
    let screens = store.load_screens()?;
    let record = projection::find_record(&records, id_token)?;

    // Flag scheduling conflicts: events overlapping this one on a shared
    // screen.
    let (events, _) = projection::normalize_events(&records);
    let conflicts: Vec<crate::model::Event> = events
        .iter()
        .find(|event| event.id == record.id)
        .map(|event| {
            events
                .iter()
                .filter(|other| other.id != event.id)
                .filter(|other| !event.screen_ids.is_disjoint(&other.screen_ids))
                .filter(|other| {
                    timewindow::overlaps(event.start, event.end, other.start, other.end)
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    renderer.print_event_info(record, &screens, &conflicts, now, tz)
}

#[instrument(skip(store, cfg, renderer, filter_terms, now))]
fn cmd_events(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    filter_terms: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command events");
    let tz = cfg.projection()?.timezone;

    let records = store.load_events()?;
    let screens = store.load_screens()?;
    let (events, malformed) = projection::normalize_events(&records);

    let filter = Filter::parse(filter_terms, now, tz)?;
    let mut rows: Vec<_> = events
        .into_iter()
        .filter(|event| filter.matches(event, &screens, now, tz))
        .collect();
    bucket::sort_by_start(&mut rows);

    renderer.print_events_table(&rows, &screens, now, tz)?;
    renderer.print_malformed(&malformed)?;
    Ok(())
}

#[instrument(skip(store, cfg, renderer, args, now))]
fn cmd_calendar(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command calendar");
    let projection_cfg = cfg.projection()?;

    let month_expr = args.first().map(String::as_str).unwrap_or_default();
    let reference_month = parse_month_expr(month_expr, now, projection_cfg.timezone)?;

    let records = store.load_events()?;
    let (events, malformed) = projection::normalize_events(&records);

    let cells = grid::build(&events, reference_month, &projection_cfg)?;
    let cells = overflow::apply_to_cells(cells, projection_cfg.max_visible);

    renderer.print_month_calendar(&cells, reference_month, now, projection_cfg.timezone)?;
    renderer.print_malformed(&malformed)?;
    Ok(())
}

#[instrument(skip(store, cfg, renderer, args, now))]
fn cmd_agenda(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command agenda");

    let slug = args
        .first()
        .ok_or_else(|| anyhow!("agenda: screen slug is required"))?;

    render_agenda_once(store, cfg, renderer, slug, now)
}

#[instrument(skip(store, cfg, renderer, slug, now))]
fn render_agenda_once(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    slug: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let projection_cfg = cfg.projection()?;

    let screen = store
        .screen_by_slug(slug)?
        .ok_or_else(|| anyhow!("unknown screen: {slug}; register it with: lineup screen add"))?;

    let records = store.load_events()?;
    let (events, malformed) = projection::normalize_events(&records);

    let mine = screen_filter::for_screen(&events, screen.id, now, &projection_cfg);
    let columns = agenda::build(&mine, now, &projection_cfg)?;

    renderer.print_agenda(&screen, &columns, projection_cfg.timezone)?;
    renderer.print_malformed(&malformed)?;
    Ok(())
}

// The signage player: re-read the store, sample a fresh clock, recompute the
// whole projection, redraw. Full recomputation per tick is the contract; the
// event volume of one venue makes it cheap.
#[instrument(skip(store, cfg, renderer, args))]
fn cmd_play(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command play");

    let slug = args
        .first()
        .ok_or_else(|| anyhow!("play: screen slug is required"))?;
    let interval = cfg.refresh_interval()?;

    loop {
        print!("\x1b[2J\x1b[1;1H");
        io::stdout().flush()?;

        let now = Utc::now();
        render_agenda_once(store, cfg, renderer, slug, now)?;

        debug!(seconds = interval.as_secs(), "sleeping until next refresh");
        std::thread::sleep(interval);
    }
}

#[instrument(skip(store, cfg, args, now))]
fn cmd_screen(
    store: &mut DataStore,
    cfg: &Config,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let (sub, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("screen: expected add, modify or remove"))?;

    match sub.as_str() {
        "add" => cmd_screen_add(store, rest, now),
        "modify" => cmd_screen_modify(store, rest),
        "remove" => cmd_screen_remove(store, rest),
        other => Err(anyhow!("screen: unknown subcommand: {other}")),
    }
}

#[instrument(skip(store, args, now))]
fn cmd_screen_add(store: &mut DataStore, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command screen add");

    let mut name_parts = Vec::new();
    let mut slug = None;
    let mut orientation = Orientation::Horizontal;

    for arg in args {
        if let Some(value) = arg.strip_prefix("slug:") {
            slug = Some(validate_slug(value)?);
        } else if let Some(value) = arg.strip_prefix("orientation:") {
            orientation = value.parse()?;
        } else {
            name_parts.push(arg.clone());
        }
    }

    if name_parts.is_empty() {
        return Err(anyhow!("screen add: name is required"));
    }
    let name = name_parts.join(" ");
    let slug = match slug {
        Some(slug) => slug,
        None => slugify(&name)?,
    };

    let screen = Screen::new(name, slug.clone(), orientation, now);
    store.add_screen(screen)?;

    println!("Created screen {slug}.");
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_screen_modify(store: &mut DataStore, args: &[String]) -> anyhow::Result<()> {
    info!("command screen modify");

    let (slug, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("screen modify: slug is required"))?;

    let mut screens = store.load_screens()?;
    let idx = screens
        .iter()
        .position(|screen| &screen.slug == slug)
        .ok_or_else(|| anyhow!("unknown screen: {slug}"))?;

    let mut name_parts = Vec::new();
    let mut new_slug = None;
    let mut orientation = None;

    for arg in rest {
        if let Some(value) = arg.strip_prefix("slug:") {
            new_slug = Some(validate_slug(value)?);
        } else if let Some(value) = arg.strip_prefix("orientation:") {
            orientation = Some(value.parse::<Orientation>()?);
        } else {
            name_parts.push(arg.clone());
        }
    }

    if name_parts.is_empty() && new_slug.is_none() && orientation.is_none() {
        return Err(anyhow!("screen modify: no modifications given"));
    }

    if let Some(candidate) = &new_slug
        && screens
            .iter()
            .enumerate()
            .any(|(i, screen)| i != idx && &screen.slug == candidate)
    {
        return Err(anyhow!("slug already in use: {candidate}"));
    }

    let screen = &mut screens[idx];
    if !name_parts.is_empty() {
        screen.name = name_parts.join(" ");
    }
    if let Some(candidate) = new_slug {
        screen.slug = candidate;
    }
    if let Some(value) = orientation {
        screen.orientation = value;
    }
    let final_slug = screen.slug.clone();

    screens.sort_by(|a, b| a.slug.cmp(&b.slug));
    store.save_screens(&screens)?;

    println!("Modified screen {final_slug}.");
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_screen_remove(store: &mut DataStore, args: &[String]) -> anyhow::Result<()> {
    info!("command screen remove");

    let slug = args
        .first()
        .ok_or_else(|| anyhow!("screen remove: slug is required"))?;

    let removed = store.remove_screen(slug)?;
    println!("Removed screen {} ({}).", removed.slug, removed.name);
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_screens(store: &mut DataStore, renderer: &mut Renderer) -> anyhow::Result<()> {
    let screens = store.load_screens()?;
    let records = store.load_events()?;
    renderer.print_screens_table(&screens, &records)
}

#[instrument(skip(store, cfg, renderer))]
fn cmd_stats(store: &mut DataStore, cfg: &Config, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command stats");
    let tz = cfg.projection()?.timezone;

    let records = store.load_events()?;
    let screens = store.load_screens()?;
    let (events, malformed) = projection::normalize_events(&records);

    let mut by_tag: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_location: BTreeMap<String, usize> = BTreeMap::new();
    for event in &events {
        for tag in &event.tags {
            *by_tag.entry(tag.clone()).or_default() += 1;
        }
        if !event.location.is_empty() {
            *by_location.entry(event.location.clone()).or_default() += 1;
        }
    }

    println!("Events by tag");
    renderer.print_table(
        vec!["Tag".to_string(), "Events".to_string()],
        count_rows(by_tag),
    )?;

    println!();
    println!("Events by location");
    renderer.print_table(
        vec!["Location".to_string(), "Events".to_string()],
        count_rows(by_location),
    )?;

    println!();
    println!("Peak hours");
    renderer.print_table(
        vec!["Hour".to_string(), "Events".to_string()],
        peak_hour_rows(&events, tz),
    )?;

    println!();
    println!("Screen occupancy");
    let occupancy: Vec<Vec<String>> = screens
        .iter()
        .map(|screen| {
            let assigned = records
                .iter()
                .filter(|record| record.screen_ids.contains(&screen.id))
                .count();
            vec![screen.slug.clone(), assigned.to_string()]
        })
        .collect();
    renderer.print_table(vec!["Screen".to_string(), "Events".to_string()], occupancy)?;

    renderer.print_malformed(&malformed)?;
    Ok(())
}

fn count_rows(counts: BTreeMap<String, usize>) -> Vec<Vec<String>> {
    let mut rows: Vec<(String, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.into_iter()
        .map(|(name, count)| vec![name, count.to_string()])
        .collect()
}

// Hour histogram over event spans in venue-local time. Spans are walked in
// whole hours and capped at two weeks so one bad record cannot spin the loop.
fn peak_hour_rows(events: &[crate::model::Event], tz: Tz) -> Vec<Vec<String>> {
    const MAX_HOURS_PER_EVENT: i64 = 14 * 24;

    let mut hours = [0usize; 24];
    for event in events {
        if event.end <= event.start {
            continue;
        }
        let mut cursor = event.start;
        let mut walked = 0;
        while cursor < event.end && walked < MAX_HOURS_PER_EVENT {
            let hour = cursor.with_timezone(&tz).hour() as usize;
            hours[hour % 24] += 1;
            cursor = cursor + Duration::hours(1);
            walked += 1;
        }
    }

    hours
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(hour, count)| vec![format!("{hour:02}h"), count.to_string()])
        .collect()
}

#[instrument(skip(store))]
fn cmd_tags(store: &mut DataStore) -> anyhow::Result<()> {
    let records = store.load_events()?;
    let mut set = BTreeSet::new();
    for record in records {
        for tag in record.tags {
            set.insert(tag);
        }
    }

    for tag in set {
        println!("{tag}");
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    screens: Vec<Screen>,
    #[serde(default)]
    events: Vec<EventRecord>,
}

#[instrument(skip(store))]
fn cmd_export(store: &mut DataStore) -> anyhow::Result<()> {
    info!("command export");

    let snapshot = Snapshot {
        screens: store.load_screens()?,
        events: store.load_events()?,
    };

    let out = serde_json::to_string(&snapshot)?;
    println!("{out}");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_import(store: &mut DataStore) -> anyhow::Result<()> {
    info!("command import");

    let mut stdin = String::new();
    io::stdin()
        .read_to_string(&mut stdin)
        .context("failed reading stdin")?;

    let trimmed = stdin.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("import: empty input"));
    }

    let snapshot = parse_import_snapshot(trimmed)?;

    let mut screens = store.load_screens()?;
    let mut screens_upserted = 0_u64;
    for incoming in snapshot.screens {
        screens.retain(|existing| existing.id != incoming.id);
        if screens.iter().any(|existing| existing.slug == incoming.slug) {
            return Err(anyhow!("import: slug already in use: {}", incoming.slug));
        }
        screens.push(incoming);
        screens_upserted += 1;
    }
    screens.sort_by(|a, b| a.slug.cmp(&b.slug));

    let mut events = store.load_events()?;
    let mut upserted = 0_u64;
    for incoming in snapshot.events {
        events.retain(|existing| existing.id != incoming.id);
        events.push(incoming);
        upserted += 1;
    }
    events.sort_by(|a, b| {
        a.start_date_time
            .cmp(&b.start_date_time)
            .then_with(|| a.id.cmp(&b.id))
    });

    store.save_screens(&screens)?;
    store.save_events(&events)?;

    println!("Imported {screens_upserted} screen(s) and {upserted} event(s).");
    Ok(())
}

fn parse_import_snapshot(trimmed: &str) -> anyhow::Result<Snapshot> {
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).context("failed parsing snapshot object");
    }

    // A bare array is taken as events only.
    if trimmed.starts_with('[') {
        let events: Vec<EventRecord> =
            serde_json::from_str(trimmed).context("failed parsing event array")?;
        return Ok(Snapshot {
            screens: vec![],
            events,
        });
    }

    Err(anyhow!("import: expected a JSON object or array"))
}

fn cmd_commands() -> anyhow::Result<()> {
    for command in known_command_names() {
        println!("{command}");
    }
    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        println!("{k}={v}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Implemented commands: add, modify, delete, info, events/list, calendar, agenda, play, \
         screen add/modify/remove, screens, stats, tags, export, import"
    );
    Ok(())
}

#[derive(Debug, Clone)]
enum Mod {
    TagAdd(String),
    TagRemove(String),
    Start(DateTime<Utc>),
    End(DateTime<Utc>),
    Location(String),
    Screens(Vec<String>),
}

#[instrument(skip(args, now))]
fn parse_name_and_mods(
    args: &[String],
    now: DateTime<Utc>,
    tz: Tz,
) -> anyhow::Result<(String, Vec<Mod>)> {
    let mut name_parts = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg, now, tz)? {
            mods.push(one_mod);
            continue;
        }

        name_parts.push(arg.clone());
    }

    if name_parts.is_empty() {
        return Err(anyhow!("add: event name is required"));
    }

    Ok((name_parts.join(" "), mods))
}

#[instrument(skip(args, now))]
fn parse_mods(args: &[String], now: DateTime<Utc>, tz: Tz) -> anyhow::Result<Vec<Mod>> {
    let mut mods = Vec::new();
    for arg in args {
        if let Some(one_mod) = parse_one_mod(arg, now, tz)? {
            mods.push(one_mod);
        } else {
            warn!(arg = %arg, "unrecognized modifier token ignored");
        }
    }
    Ok(mods)
}

fn parse_one_mod(tok: &str, now: DateTime<Utc>, tz: Tz) -> anyhow::Result<Option<Mod>> {
    if let Some(tag) = tok.strip_prefix('+') {
        return Ok(Some(Mod::TagAdd(tag.to_string())));
    }
    if let Some(tag) = tok.strip_prefix('-') {
        return Ok(Some(Mod::TagRemove(tag.to_string())));
    }

    let (key, value) = if let Some((k, v)) = tok.split_once(':') {
        (k, v)
    } else if let Some((k, v)) = tok.split_once('=') {
        (k, v)
    } else {
        return Ok(None);
    };

    let key = key.to_ascii_lowercase();

    match key.as_str() {
        "start" => Ok(Some(Mod::Start(parse_datetime_expr(value, now, tz)?))),
        "end" => Ok(Some(Mod::End(parse_datetime_expr(value, now, tz)?))),
        "at" | "location" => Ok(Some(Mod::Location(value.to_string()))),
        "screen" | "screens" => {
            let slugs = value
                .split(',')
                .map(str::trim)
                .filter(|slug| !slug.is_empty())
                .map(str::to_string)
                .collect();
            Ok(Some(Mod::Screens(slugs)))
        }
        _ => Ok(None),
    }
}

fn apply_mods(record: &mut EventRecord, mods: &[Mod], screens: &[Screen]) -> anyhow::Result<()> {
    for one_mod in mods {
        match one_mod {
            Mod::TagAdd(tag) => {
                if record.tags.iter().all(|existing| existing != tag) {
                    record.tags.push(tag.clone());
                }
            }
            Mod::TagRemove(tag) => {
                record.tags.retain(|existing| existing != tag);
            }
            Mod::Start(dt) => {
                record.start_date_time = dt.to_rfc3339();
            }
            Mod::End(dt) => {
                record.end_date_time = dt.to_rfc3339();
            }
            Mod::Location(location) => {
                record.location = location.clone();
            }
            Mod::Screens(slugs) => {
                let mut ids: Vec<Uuid> = Vec::with_capacity(slugs.len());
                for slug in slugs {
                    let screen = screens
                        .iter()
                        .find(|screen| &screen.slug == slug)
                        .ok_or_else(|| anyhow!("unknown screen: {slug}"))?;
                    if !ids.contains(&screen.id) {
                        ids.push(screen.id);
                    }
                }
                record.screen_ids = ids;
            }
        }
    }

    Ok(())
}

fn validate_slug(raw: &str) -> anyhow::Result<String> {
    let slug_re = regex::Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
    let candidate = raw.trim();
    if !slug_re.is_match(candidate) {
        return Err(anyhow!(
            "invalid slug: {raw} (expected lowercase letters, digits and dashes)"
        ));
    }
    Ok(candidate.to_string())
}

fn slugify(name: &str) -> anyhow::Result<String> {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let out = out.trim_end_matches('-').to_string();
    if out.is_empty() {
        return Err(anyhow!("cannot derive a slug from: {name}"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{expand_command_abbrev, known_command_names, slugify, validate_slug};

    #[test]
    fn abbreviations_expand_when_unambiguous() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("cal", &known), Some("calendar"));
        assert_eq!(expand_command_abbrev("ag", &known), Some("agenda"));
        // "screen" is a prefix of "screens" but matches exactly.
        assert_eq!(expand_command_abbrev("screen", &known), Some("screen"));
        // Ambiguous prefixes do not resolve.
        assert_eq!(expand_command_abbrev("s", &known), None);
    }

    #[test]
    fn slugs_derive_and_validate() {
        assert_eq!(slugify("Hall A — Main Stage").expect("slug"), "hall-a-main-stage");
        assert_eq!(slugify("Lobby").expect("slug"), "lobby");
        assert!(slugify("!!!").is_err());

        assert!(validate_slug("lobby-2").is_ok());
        assert!(validate_slug("Lobby").is_err());
        assert!(validate_slug("a--b").is_err());
    }
}
