use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use tracing::{debug, info, trace, warn};

use crate::projection::ProjectionConfig;

#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Config {
    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config {
            map: HashMap::new(),
            loaded_files: vec![],
        };

        for (key, value) in [
            ("data.location", "~/.lineup"),
            ("default.command", "events"),
            ("color", "on"),
            ("venue.timezone", "America/Sao_Paulo"),
            ("week.start", "sunday"),
            ("calendar.max_visible", "3"),
            ("agenda.weekdays", "mon,tue,wed,thu,fri"),
            ("agenda.retain_week", "on"),
            ("play.refresh", "10"),
        ] {
            cfg.map.insert(key.to_string(), value.to_string());
        }

        let rc_path = resolve_rc_path(rc_override)?;
        if let Some(path) = rc_path {
            info!(lineuprc = %path.display(), "loading lineuprc");
            cfg.load_file(&path)?;
        } else {
            warn!("no lineuprc found; using defaults");
        }

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in overrides {
            let key = k.strip_prefix("rc.").unwrap_or(&k).to_string();
            debug!(key = %key, value = %v, "applying override");
            self.map.insert(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).map(|v| parse_bool(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.map.iter()
    }

    // Assembles the per-call engine configuration, failing fast on anything
    // out of range instead of clamping.
    pub fn projection(&self) -> anyhow::Result<ProjectionConfig> {
        let raw_tz = self
            .get("venue.timezone")
            .ok_or_else(|| anyhow!("venue.timezone is not configured"))?;
        let timezone: Tz = raw_tz
            .trim()
            .parse()
            .map_err(|err| anyhow!("invalid venue.timezone {raw_tz}: {err}"))?;

        let week_start = self
            .get("week.start")
            .ok_or_else(|| anyhow!("week.start is not configured"))?
            .parse()?;

        let raw_max = self
            .get("calendar.max_visible")
            .ok_or_else(|| anyhow!("calendar.max_visible is not configured"))?;
        let max_visible: usize = raw_max
            .trim()
            .parse()
            .with_context(|| format!("invalid calendar.max_visible: {raw_max}"))?;
        if max_visible == 0 {
            return Err(anyhow!("calendar.max_visible must be a positive integer"));
        }

        let raw_weekdays = self
            .get("agenda.weekdays")
            .ok_or_else(|| anyhow!("agenda.weekdays is not configured"))?;
        let included_weekdays = crate::datetime::parse_weekday_list(&raw_weekdays)
            .with_context(|| format!("invalid agenda.weekdays: {raw_weekdays}"))?;
        if included_weekdays.is_empty() {
            return Err(anyhow!("agenda.weekdays must include at least one weekday"));
        }

        let retain_current_week = self.get_bool("agenda.retain_week").unwrap_or(true);

        Ok(ProjectionConfig {
            timezone,
            week_start,
            max_visible,
            included_weekdays,
            retain_current_week,
        })
    }

    pub fn refresh_interval(&self) -> anyhow::Result<Duration> {
        let raw = self
            .get("play.refresh")
            .ok_or_else(|| anyhow!("play.refresh is not configured"))?;
        let seconds: u64 = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid play.refresh: {raw}"))?;
        if seconds == 0 {
            return Err(anyhow!("play.refresh must be a positive number of seconds"));
        }
        Ok(Duration::from_secs(seconds))
    }

    #[tracing::instrument(skip(self))]
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        self.loaded_files.push(path.clone());

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        for (line_num, raw_line) in text.lines().enumerate() {
            let mut line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((before, _)) = line.split_once('#') {
                line = before.trim();
            }

            if line.is_empty() {
                continue;
            }

            if let Some(include_rest) = line.strip_prefix("include ") {
                let include_path = resolve_include_path(&base_dir, include_rest.trim())?;
                debug!(
                    file = %path.display(),
                    include = %include_path.display(),
                    line = line_num + 1,
                    "processing include"
                );

                if include_path.exists() {
                    self.load_file(&include_path)?;
                } else {
                    warn!(include = %include_path.display(), "include file does not exist; skipping");
                }
                continue;
            }

            let (k, v) = line.split_once('=').ok_or_else(|| {
                anyhow!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    line_num + 1,
                    raw_line
                )
            })?;

            let key = k.trim().to_string();
            let value = v.trim().to_string();
            trace!(key = %key, value = %value, "loaded config key");
            self.map.insert(key, value);
        }

        Ok(())
    }
}

#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(path) = override_dir {
        path.to_path_buf()
    } else if let Some(cfg_value) = cfg.get("data.location") {
        expand_tilde(Path::new(&cfg_value))
    } else {
        default_data_dir()?
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

#[tracing::instrument(skip(override_path))]
fn resolve_rc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(rc_env) = std::env::var("LINEUPRC") {
        if rc_env == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(rc_env)));
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    let candidate = home.join(".lineuprc");
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".lineup"))
}

fn resolve_include_path(base_dir: &Path, include: &str) -> anyhow::Result<PathBuf> {
    if include.trim().is_empty() {
        return Err(anyhow!("include path cannot be empty"));
    }

    let raw = PathBuf::from(include);
    let expanded = expand_tilde(&raw);
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base_dir.join(expanded))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "on" | "true"
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::Weekday;

    use super::Config;
    use crate::datetime::WeekStart;

    fn config_with(pairs: &[(&str, &str)]) -> Config {
        let mut cfg = Config::load(Some(std::path::Path::new("/dev/null"))).expect("load");
        cfg.apply_overrides(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        cfg
    }

    #[test]
    fn defaults_assemble_a_valid_projection() {
        let cfg = config_with(&[]);
        let projection = cfg.projection().expect("projection config");
        assert_eq!(projection.week_start, WeekStart::Sunday);
        assert_eq!(projection.max_visible, 3);
        assert_eq!(projection.included_weekdays.len(), 5);
        assert!(projection.retain_current_week);
    }

    #[test]
    fn out_of_range_values_fail_fast() {
        assert!(config_with(&[("calendar.max_visible", "0")])
            .projection()
            .is_err());
        assert!(config_with(&[("agenda.weekdays", "")]).projection().is_err());
        assert!(config_with(&[("week.start", "friday")]).projection().is_err());
        assert!(config_with(&[("venue.timezone", "Mars/Olympus")])
            .projection()
            .is_err());
        assert!(config_with(&[("play.refresh", "0")])
            .refresh_interval()
            .is_err());
    }

    #[test]
    fn rc_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "# lineuprc").expect("write");
        writeln!(file, "week.start=monday").expect("write");
        writeln!(file, "agenda.weekdays=mon-sat  # include saturdays").expect("write");
        file.flush().expect("flush");

        let cfg = Config::load(Some(file.path())).expect("load");
        let projection = cfg.projection().expect("projection config");
        assert_eq!(projection.week_start, WeekStart::Monday);
        assert_eq!(projection.included_weekdays.last(), Some(&Weekday::Sat));
    }
}
