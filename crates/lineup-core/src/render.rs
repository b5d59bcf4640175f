use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use uuid::Uuid;

use crate::config::Config;
use crate::model::{Event, EventRecord, Screen};
use crate::projection::MalformedEvent;
use crate::projection::agenda::AgendaColumn;
use crate::projection::grid::CalendarCell;
use crate::projection::timewindow::{EventStatus, classify};

const CELL_WIDTH: usize = 18;

// Stable identity palette: the same event id always renders in the same
// color across refreshes.
const EVENT_PALETTE: [&str; 8] = ["36", "35", "33", "32", "34", "95", "96", "93"];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, events, screens, now))]
    pub fn print_events_table(
        &mut self,
        events: &[Event],
        screens: &[Screen],
        now: DateTime<Utc>,
        tz: Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "When".to_string(),
            "Name".to_string(),
            "Location".to_string(),
            "Screens".to_string(),
            "Tags".to_string(),
            "Status".to_string(),
        ];

        let mut rows = Vec::with_capacity(events.len());
        for event in events {
            let id = short_id(event.id);
            let id = self.paint(&id, event_color(event.id));

            let local_start = event.start.with_timezone(&tz);
            let local_end = event.end.with_timezone(&tz);
            let when = format!(
                "{} {}\u{2013}{}",
                local_start.format("%Y-%m-%d"),
                local_start.format("%H:%M"),
                local_end.format("%H:%M")
            );

            let slugs = screens
                .iter()
                .filter(|screen| event.screen_ids.contains(&screen.id))
                .map(|screen| screen.slug.clone())
                .collect::<Vec<_>>()
                .join(" ");

            let tags = event
                .tags
                .iter()
                .map(|tag| format!("+{tag}"))
                .collect::<Vec<_>>()
                .join(" ");

            let status = classify(now, event.start, event.end);
            let status = self.paint(status.label(), status_color(status));

            rows.push(vec![
                id,
                when,
                event.name.clone(),
                event.location.clone(),
                slugs,
                tags,
                status,
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, record, screens, conflicts, now))]
    pub fn print_event_info(
        &mut self,
        record: &EventRecord,
        screens: &[Screen],
        conflicts: &[Event],
        now: DateTime<Utc>,
        tz: Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", record.id)?;
        writeln!(out, "name      {}", record.name)?;
        writeln!(out, "location  {}", record.location)?;

        let start = crate::datetime::parse_instant(&record.start_date_time);
        let end = crate::datetime::parse_instant(&record.end_date_time);

        match &start {
            Ok(instant) => writeln!(
                out,
                "start     {}",
                instant.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z")
            )?,
            Err(_) => writeln!(out, "start     {} (malformed)", record.start_date_time)?,
        }
        match &end {
            Ok(instant) => writeln!(
                out,
                "end       {}",
                instant.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z")
            )?,
            Err(_) => writeln!(out, "end       {} (malformed)", record.end_date_time)?,
        }

        let slugs = screens
            .iter()
            .filter(|screen| record.screen_ids.contains(&screen.id))
            .map(|screen| screen.slug.clone())
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "screens   {slugs}")?;
        writeln!(out, "tags      {}", record.tags.join(", "))?;

        if let (Ok(start), Ok(end)) = (start, end) {
            let status = classify(now, start, end);
            writeln!(
                out,
                "status    {}",
                self.paint(status.label(), status_color(status))
            )?;
        }

        if !conflicts.is_empty() {
            let listed = conflicts
                .iter()
                .map(|other| format!("{} ({})", short_id(other.id), other.name))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "conflicts {}", self.paint(&listed, "31"))?;
        }

        writeln!(out, "created   {}", record.created.format("%Y-%m-%dT%H:%M:%SZ"))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, screens, records))]
    pub fn print_screens_table(
        &mut self,
        screens: &[Screen],
        records: &[EventRecord],
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "Slug".to_string(),
            "Name".to_string(),
            "Orientation".to_string(),
            "Events".to_string(),
            "ID".to_string(),
        ];

        let mut rows = Vec::with_capacity(screens.len());
        for screen in screens {
            let assigned = records
                .iter()
                .filter(|record| record.screen_ids.contains(&screen.id))
                .count();
            rows.push(vec![
                self.paint(&screen.slug, "33"),
                screen.name.clone(),
                screen.orientation.label().to_string(),
                assigned.to_string(),
                short_id(screen.id),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, cells, now))]
    pub fn print_month_calendar(
        &mut self,
        cells: &[CalendarCell],
        reference_month: NaiveDate,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let today = crate::datetime::venue_date(now, tz);

        writeln!(out, "{}", reference_month.format("%B %Y"))?;
        writeln!(out)?;

        // The first 7 cells carry the week-start convention.
        let header_week = cells.get(..7).unwrap_or_default();
        for cell in header_week {
            let label = cell.date.format("%a").to_string();
            write!(out, "{:<width$} ", label, width = CELL_WIDTH)?;
        }
        writeln!(out)?;
        for _ in header_week {
            write!(out, "{:-<width$} ", "", width = CELL_WIDTH)?;
        }
        writeln!(out)?;

        for week in cells.chunks(7) {
            let rendered: Vec<Vec<String>> = week
                .iter()
                .map(|cell| self.render_cell(cell, today, tz))
                .collect();
            let height = rendered.iter().map(Vec::len).max().unwrap_or(0);

            for line_idx in 0..height {
                for cell_lines in &rendered {
                    let line = cell_lines
                        .get(line_idx)
                        .map(String::as_str)
                        .unwrap_or_default();
                    let pad = CELL_WIDTH.saturating_sub(visible_width(line));
                    write!(out, "{}{} ", line, " ".repeat(pad))?;
                }
                writeln!(out)?;
            }
            writeln!(out)?;
        }

        Ok(())
    }

    fn render_cell(&self, cell: &CalendarCell, today: NaiveDate, tz: Tz) -> Vec<String> {
        let day_number = cell.date.day().to_string();
        let day_line = if cell.date == today {
            self.paint(&format!("[{day_number}]"), "1;33")
        } else if cell.in_reference_month {
            day_number
        } else {
            self.paint(&day_number, "90")
        };

        let mut lines = vec![day_line];
        for event in &cell.visible_events {
            let label = format!(
                "{} {}",
                event.start.with_timezone(&tz).format("%H:%M"),
                event.name
            );
            let label = truncate_to_width(&label, CELL_WIDTH);
            lines.push(self.paint(&label, event_color(event.id)));
        }
        if cell.hidden_count > 0 {
            lines.push(self.paint(&format!("+ {} more", cell.hidden_count), "90"));
        }

        lines
    }

    #[tracing::instrument(skip(self, screen, columns))]
    pub fn print_agenda(
        &mut self,
        screen: &Screen,
        columns: &[AgendaColumn],
        tz: Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "Agenda: {} ({})", screen.name, screen.slug)?;
        if let (Some(first), Some(last)) = (columns.first(), columns.last()) {
            writeln!(
                out,
                "Week of {} to {}",
                first.date.format("%Y-%m-%d"),
                last.date.format("%Y-%m-%d")
            )?;
        }
        writeln!(out)?;

        for column in columns {
            let mut header = format!(
                "{} {}",
                column.date.format("%a").to_string().to_uppercase(),
                column.date.format("%d/%m")
            );
            if column.is_today {
                header.push_str(" \u{00b7} today");
            }
            let code = if column.is_today { "1;33" } else { "1" };
            writeln!(out, "{}", self.paint(&header, code))?;

            if column.events.is_empty() {
                writeln!(out, "  -")?;
            }
            for event in &column.events {
                let local_start = event.start.with_timezone(&tz);
                let local_end = event.end.with_timezone(&tz);
                let mut line = format!(
                    "  {}\u{2013}{}  {}",
                    local_start.format("%H:%M"),
                    local_end.format("%H:%M"),
                    self.paint(&event.name, event_color(event.id))
                );
                if !event.location.is_empty() {
                    line.push_str(&format!("  @ {}", event.location));
                }
                if !event.tags.is_empty() {
                    line.push_str(&format!("  [{}]", event.tags.join(", ")));
                }
                writeln!(out, "{line}")?;
            }
            writeln!(out)?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, malformed))]
    pub fn print_malformed(&mut self, malformed: &[MalformedEvent]) -> anyhow::Result<()> {
        if malformed.is_empty() {
            return Ok(());
        }

        let mut out = io::stdout().lock();
        for bad in malformed {
            let line = format!(
                "warning: event {} ({}) has unparseable {}: {}",
                short_id(bad.id),
                bad.name,
                bad.field,
                bad.raw
            );
            writeln!(out, "{}", self.paint(&line, "31"))?;
        }
        Ok(())
    }

    pub fn print_table(&mut self, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        write_table(&mut out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn short_id(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

fn status_color(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Upcoming => "36",
        EventStatus::Active => "32",
        EventStatus::Past => "90",
    }
}

fn event_color(id: Uuid) -> &'static str {
    let mut hash: u32 = 0;
    for byte in id.as_bytes() {
        hash = u32::from(*byte).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }
    EVENT_PALETTE[hash as usize % EVENT_PALETTE.len()]
}

fn visible_width(s: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(s).as_str())
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    let mut out = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + ch_width > max_width {
            break;
        }
        width += ch_width;
        out.push(ch);
    }
    out
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(visible_width(cell));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let padding = widths[idx].saturating_sub(visible_width(cell));
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
