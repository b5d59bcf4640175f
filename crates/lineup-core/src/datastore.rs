use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::model::{EventRecord, Screen};

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub screens_path: PathBuf,
    pub events_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let screens_path = data_dir.join("screens.data");
        let events_path = data_dir.join("events.data");

        if !screens_path.exists() {
            fs::write(&screens_path, "")?;
        }
        if !events_path.exists() {
            fs::write(&events_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            screens = %screens_path.display(),
            events = %events_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            screens_path,
            events_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_screens(&self) -> anyhow::Result<Vec<Screen>> {
        load_jsonl(&self.screens_path).context("failed to load screens.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_events(&self) -> anyhow::Result<Vec<EventRecord>> {
        load_jsonl(&self.events_path).context("failed to load events.data")
    }

    #[tracing::instrument(skip(self, screens))]
    pub fn save_screens(&self, screens: &[Screen]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.screens_path, screens).context("failed to save screens.data")
    }

    #[tracing::instrument(skip(self, events))]
    pub fn save_events(&self, events: &[EventRecord]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.events_path, events).context("failed to save events.data")
    }

    // Slug uniqueness is this layer's invariant: the player routes by slug,
    // so two screens must never share one.
    #[tracing::instrument(skip(self, screen), fields(slug = %screen.slug))]
    pub fn add_screen(&self, screen: Screen) -> anyhow::Result<Vec<Screen>> {
        let mut screens = self.load_screens()?;
        if screens.iter().any(|existing| existing.slug == screen.slug) {
            return Err(anyhow!("slug already in use: {}", screen.slug));
        }

        screens.push(screen);
        screens.sort_by(|a, b| a.slug.cmp(&b.slug));
        self.save_screens(&screens)?;
        Ok(screens)
    }

    #[tracing::instrument(skip(self))]
    pub fn screen_by_slug(&self, slug: &str) -> anyhow::Result<Option<Screen>> {
        let screens = self.load_screens()?;
        Ok(screens.into_iter().find(|screen| screen.slug == slug))
    }

    #[tracing::instrument(skip(self), fields(slug = %slug))]
    pub fn remove_screen(&self, slug: &str) -> anyhow::Result<Screen> {
        let mut screens = self.load_screens()?;
        let idx = screens
            .iter()
            .position(|screen| screen.slug == slug)
            .ok_or_else(|| anyhow!("unknown screen: {slug}"))?;
        let removed = screens.remove(idx);

        // Detach the screen from every event that targeted it.
        let mut events = self.load_events()?;
        for event in &mut events {
            event.screen_ids.retain(|id| *id != removed.id);
        }

        self.save_screens(&screens)?;
        self.save_events(&events)?;
        Ok(removed)
    }

    #[tracing::instrument(skip(self, record), fields(id = %record.id))]
    pub fn upsert_event(&self, record: EventRecord) -> anyhow::Result<()> {
        let mut events = self.load_events()?;
        events.retain(|existing| existing.id != record.id);
        events.push(record);
        events.sort_by(|a, b| {
            a.start_date_time
                .cmp(&b.start_date_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        self.save_events(&events)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn remove_event(&self, id: Uuid) -> anyhow::Result<EventRecord> {
        let mut events = self.load_events()?;
        let idx = events
            .iter()
            .position(|event| event.id == id)
            .ok_or_else(|| anyhow!("event not found: {id}"))?;
        let removed = events.remove(idx);
        self.save_events(&events)?;
        Ok(removed)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let row: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(row);
    }

    debug!(count = out.len(), "loaded rows from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, rows))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = rows.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for row in rows {
        let serialized = serde_json::to_string(row)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
