use anyhow::{Context, anyhow};
use chrono::{
    DateTime, Datelike, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc,
    Weekday,
};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekStart {
    Sunday,
    Monday,
}

impl WeekStart {
    pub fn first_weekday(self) -> Weekday {
        match self {
            WeekStart::Sunday => Weekday::Sun,
            WeekStart::Monday => Weekday::Mon,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WeekStart::Sunday => "sunday",
            WeekStart::Monday => "monday",
        }
    }
}

impl std::str::FromStr for WeekStart {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sunday" | "sun" => Ok(WeekStart::Sunday),
            "monday" | "mon" => Ok(WeekStart::Monday),
            other => Err(anyhow!("week.start must be sunday or monday, got: {other}")),
        }
    }
}

#[must_use]
pub fn venue_date(dt: DateTime<Utc>, tz: Tz) -> NaiveDate {
    dt.with_timezone(&tz).date_naive()
}

#[must_use]
pub fn start_of_week(date: NaiveDate, week_start: WeekStart) -> NaiveDate {
    let back = match week_start {
        WeekStart::Sunday => date.weekday().num_days_from_sunday(),
        WeekStart::Monday => date.weekday().num_days_from_monday(),
    };
    date.checked_sub_days(Days::new(u64::from(back)))
        .unwrap_or(date)
}

#[must_use]
pub fn end_of_week(date: NaiveDate, week_start: WeekStart) -> NaiveDate {
    let start = start_of_week(date, week_start);
    start.checked_add_days(Days::new(6)).unwrap_or(start)
}

#[must_use]
pub fn week_bounds(date: NaiveDate, week_start: WeekStart) -> (NaiveDate, NaiveDate) {
    let start = start_of_week(date, week_start);
    (start, start.checked_add_days(Days::new(6)).unwrap_or(start))
}

pub fn first_of_month(date: NaiveDate) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).ok_or_else(|| {
        anyhow!(
            "failed to construct first day of {}-{:02}",
            date.year(),
            date.month()
        )
    })
}

pub fn last_of_month(date: NaiveDate) -> anyhow::Result<NaiveDate> {
    let (next_year, next_month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(|| {
        anyhow!(
            "failed to construct month after {}-{:02}",
            date.year(),
            date.month()
        )
    })?;
    first_of_next
        .pred_opt()
        .ok_or_else(|| anyhow!("failed to step back from {first_of_next}"))
}

// Strict instant parsing for persisted timestamps: RFC3339 or the compact
// UTC form. Everything else is a malformed record.
pub fn parse_instant(input: &str) -> anyhow::Result<DateTime<Utc>> {
    let token = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(token, "%Y%m%dT%H%M%SZ") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }

    Err(anyhow!("not an ISO-8601 instant: {input}"))
}

pub fn to_utc_from_venue_local(
    local_naive: NaiveDateTime,
    tz: Tz,
    context: &str,
) -> anyhow::Result<DateTime<Utc>> {
    match tz.from_local_datetime(&local_naive) {
        LocalResult::Single(local_dt) => Ok(local_dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, second) => {
            tracing::warn!(
                context,
                first = %first,
                second = %second,
                "ambiguous local datetime; using earliest"
            );
            let chosen = if first <= second { first } else { second };
            Ok(chosen.with_timezone(&Utc))
        }
        LocalResult::None => Err(anyhow!(
            "local datetime does not exist in venue timezone {tz}: {context}"
        )),
    }
}

#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_datetime_expr(
    input: &str,
    now: DateTime<Utc>,
    tz: Tz,
) -> anyhow::Result<DateTime<Utc>> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    match lower.as_str() {
        "now" => return Ok(now),
        "today" => {
            let date = venue_date(now, tz);
            let midnight = date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| anyhow!("failed to construct midnight for today"))?;
            return to_utc_from_venue_local(midnight, tz, "today");
        }
        "tomorrow" => {
            let today = parse_datetime_expr("today", now, tz)?;
            return Ok(today + Duration::days(1));
        }
        "yesterday" => {
            let today = parse_datetime_expr("today", now, tz)?;
            return Ok(today - Duration::days(1));
        }
        _ => {}
    }

    if let Some(target_weekday) = parse_weekday_name(&lower) {
        let today = venue_date(now, tz);
        let target_date = next_weekday_date(today, target_weekday);
        let midnight = target_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("failed to construct weekday midnight"))?;
        return to_utc_from_venue_local(midnight, tz, "weekday-name");
    }

    let rel_re = regex::Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dhm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
    if let Some(caps) = rel_re.captures(token) {
        let sign = caps
            .name("sign")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative sign"))?;
        let num: i64 = caps
            .name("num")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative amount"))?
            .parse()
            .context("invalid relative number")?;
        let unit = caps
            .name("unit")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative unit"))?;

        let duration = match unit {
            "d" => Duration::days(num),
            "h" => Duration::hours(num),
            "m" => Duration::minutes(num),
            _ => return Err(anyhow!("unknown relative unit: {unit}")),
        };

        return Ok(if sign == "-" {
            now - duration
        } else {
            now + duration
        });
    }

    if let Ok(instant) = parse_instant(token) {
        return Ok(instant);
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("failed to construct midnight for date"))?;
        return to_utc_from_venue_local(midnight, tz, "date");
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(token, fmt) {
            return to_utc_from_venue_local(ndt, tz, fmt);
        }
    }

    Err(anyhow!("unrecognized date expression: {input}")).with_context(|| {
        "supported formats: now/today/tomorrow/yesterday, weekday names (e.g. monday), \
         +Nd/+Nh/+Nm, RFC3339, YYYYMMDDTHHMMSSZ, YYYY-MM-DD, YYYY-MM-DD HH:MM[:SS]"
    })
}

#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_month_expr(input: &str, now: DateTime<Utc>, tz: Tz) -> anyhow::Result<NaiveDate> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    if token.is_empty() || lower == "this" || lower == "current" {
        return first_of_month(venue_date(now, tz));
    }

    if let Some(month) = parse_month_name(&lower) {
        let year = venue_date(now, tz).year();
        return NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| anyhow!("invalid month value: {month}"));
    }

    let ym_re = regex::Regex::new(r"^(?P<year>\d{4})-(?P<month>\d{1,2})$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
    if let Some(caps) = ym_re.captures(token) {
        let year: i32 = caps
            .name("year")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing year"))?
            .parse()
            .context("invalid year")?;
        let month: u32 = caps
            .name("month")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing month"))?
            .parse()
            .context("invalid month")?;
        return NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| anyhow!("invalid month: {token}"));
    }

    Err(anyhow!("unrecognized month expression: {input}"))
        .with_context(|| "supported formats: YYYY-MM, month names (e.g. march), this/current")
}

pub fn parse_weekday_name(token: &str) -> Option<Weekday> {
    match token.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thur" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

// Accepts "mon,wed,fri" and "mon-fri" range form; ranges walk forward and
// wrap across the weekend, so "sat-mon" is sat,sun,mon.
pub fn parse_weekday_list(raw: &str) -> anyhow::Result<Vec<Weekday>> {
    let mut out: Vec<Weekday> = Vec::new();

    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((from_raw, to_raw)) = part.split_once('-') {
            let from = parse_weekday_name(from_raw)
                .ok_or_else(|| anyhow!("invalid weekday in range: {from_raw}"))?;
            let to = parse_weekday_name(to_raw)
                .ok_or_else(|| anyhow!("invalid weekday in range: {to_raw}"))?;
            let mut day = from;
            loop {
                if !out.contains(&day) {
                    out.push(day);
                }
                if day == to {
                    break;
                }
                day = day.succ();
            }
            continue;
        }

        let day = parse_weekday_name(part).ok_or_else(|| anyhow!("invalid weekday: {part}"))?;
        if !out.contains(&day) {
            out.push(day);
        }
    }

    Ok(out)
}

fn next_weekday_date(from: NaiveDate, target: Weekday) -> NaiveDate {
    let from_idx = from.weekday().num_days_from_monday() as i64;
    let target_idx = target.num_days_from_monday() as i64;
    let mut delta = (7 + target_idx - from_idx) % 7;
    if delta == 0 {
        delta = 7;
    }
    from.checked_add_signed(Duration::days(delta)).unwrap_or(from)
}

fn parse_month_name(token: &str) -> Option<u32> {
    match token.trim() {
        "january" | "jan" => Some(1),
        "february" | "feb" => Some(2),
        "march" | "mar" => Some(3),
        "april" | "apr" => Some(4),
        "may" => Some(5),
        "june" | "jun" => Some(6),
        "july" | "jul" => Some(7),
        "august" | "aug" => Some(8),
        "september" | "sep" | "sept" => Some(9),
        "october" | "oct" => Some(10),
        "november" | "nov" => Some(11),
        "december" | "dec" => Some(12),
        _ => None,
    }
}
