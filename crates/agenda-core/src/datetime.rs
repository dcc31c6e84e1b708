use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "agenda-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "AGENDA_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "AGENDA_TIME_CONFIG";
const DEFAULT_PROJECT_TIMEZONE: Tz =
  chrono_tz::America::Argentina::Buenos_Aires;

/// `agenda-time.toml`. The top-level key
/// wins over the `[calendar]` and `[time]`
/// tables, in that order.
#[derive(Debug, Default, Deserialize)]
struct AgendaTimeFile {
  timezone: Option<String>,
  calendar: Option<TimezoneTable>,
  time:     Option<TimezoneTable>
}

#[derive(Debug, Default, Deserialize)]
struct TimezoneTable {
  timezone: Option<String>
}

impl AgendaTimeFile {
  fn timezone(self) -> Option<String> {
    self
      .timezone
      .or(self.calendar.and_then(|t| t.timezone))
      .or(self.time.and_then(|t| t.timezone))
  }
}

/// Timezone the office works in. Resolved
/// once per process.
pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(|| {
    let tz = timezone_from_env()
      .or_else(timezone_from_file)
      .unwrap_or(DEFAULT_PROJECT_TIMEZONE);
    tracing::info!(timezone = %tz, "calendar timezone");
    tz
  })
}

/// Current calendar date as seen from
/// `timezone`.
#[must_use]
pub fn today_in_timezone(
  timezone: &Tz
) -> NaiveDate {
  Utc::now()
    .with_timezone(timezone)
    .date_naive()
}

fn timezone_from_env() -> Option<Tz> {
  let raw =
    std::env::var(TIMEZONE_ENV_VAR).ok()?;
  parse_timezone(&raw, TIMEZONE_ENV_VAR)
}

fn timezone_from_file() -> Option<Tz> {
  let path = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  )
  .ok()
  .map(|raw| raw.trim().to_string())
  .filter(|raw| !raw.is_empty())
  .map(PathBuf::from)
  .or_else(|| {
    std::env::current_dir()
      .ok()
      .map(|dir| dir.join(TIMEZONE_CONFIG_FILE))
  })?;

  if !path.exists() {
    tracing::debug!(file = %path.display(), "no timezone file");
    return None;
  }

  match read_timezone_file(&path) {
    | Ok(Some(raw)) => parse_timezone(
      &raw,
      &path.display().to_string()
    ),
    | Ok(None) => {
      tracing::warn!(file = %path.display(), "timezone file names no timezone");
      None
    }
    | Err(err) => {
      tracing::error!(file = %path.display(), error = %format!("{err:#}"), "ignoring timezone file");
      None
    }
  }
}

fn read_timezone_file(
  path: &Path
) -> anyhow::Result<Option<String>> {
  let raw = fs::read_to_string(path)
    .with_context(|| {
      format!("failed to read {}", path.display())
    })?;
  timezone_from_toml(&raw).with_context(
    || format!("failed to parse {}", path.display())
  )
}

fn timezone_from_toml(
  raw: &str
) -> anyhow::Result<Option<String>> {
  let file: AgendaTimeFile =
    toml::from_str(raw)?;
  Ok(file.timezone())
}

/// Parses an IANA zone name; `source`
/// only labels the log line.
pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  match trimmed.parse::<Tz>() {
    | Ok(tz) => Some(tz),
    | Err(err) => {
      tracing::warn!(
        source,
        timezone = %trimmed,
        error = %err,
        "unknown timezone"
      );
      None
    }
  }
}

pub fn parse_week_start(
  raw: &str
) -> Option<Weekday> {
  parse_weekday_name(
    &raw.trim().to_lowercase()
  )
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

/// Number of days in `month`: the day
/// number of the day before the first
/// of the following month.
pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

/// `None` when the result falls outside
/// the representable date range.
pub fn checked_add_days(
  date: NaiveDate,
  days: i64
) -> Option<NaiveDate> {
  Duration::try_days(days).and_then(
    |delta| date.checked_add_signed(delta)
  )
}

/// Saturates to `date` itself when the
/// offset is out of range.
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  checked_add_days(date, days)
    .unwrap_or(date)
}

/// Moves `date` by whole months, carrying
/// the year in both directions. The day
/// of month is clamped to the length of
/// the target month, so Mar 31 minus one
/// month lands on the last day of
/// February.
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let zero_based = date.year() * 12
    + date.month0() as i32
    + months;
  let year = zero_based.div_euclid(12);
  let month =
    zero_based.rem_euclid(12) as u32 + 1;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

/// Column of `day` in a week that begins
/// on `week_start` (0..=6).
pub fn weekday_index(
  day: NaiveDate,
  week_start: Weekday
) -> u32 {
  let day_idx =
    day.weekday().num_days_from_monday();
  let start_idx =
    week_start.num_days_from_monday();
  (7 + day_idx - start_idx) % 7
}

pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  add_days(
    day,
    -i64::from(weekday_index(
      day, week_start
    ))
  )
}

pub fn is_same_calendar_day<A, B>(
  a: &A,
  b: &B
) -> bool
where
  A: Datelike,
  B: Datelike
{
  a.year() == b.year()
    && a.month() == b.month()
    && a.day() == b.day()
}

#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower = token.to_lowercase();

  match lower.as_str() {
    | "today" | "hoy" => {
      return Ok(today);
    }
    | "tomorrow" | "mañana"
    | "manana" => {
      return Ok(add_days(today, 1));
    }
    | "yesterday" | "ayer" => {
      return Ok(add_days(today, -1));
    }
    | _ => {}
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, target
    ));
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$")
    .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let days = match caps
      .name("unit")
      .map(|m| m.as_str())
    {
      | Some("w") => num.checked_mul(7),
      | _ => Some(num)
    }
    .ok_or_else(|| {
      anyhow!(
        "relative date out of range: \
         {token}"
      )
    })?;
    let negative = caps
      .name("sign")
      .is_some_and(|m| m.as_str() == "-");

    return checked_add_days(
      today,
      if negative { -days } else { days }
    )
    .ok_or_else(|| {
      anyhow!(
        "relative date out of range: \
         {token}"
      )
    });
  }

  for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
    if let Ok(date) =
      NaiveDate::parse_from_str(
        token, fmt
      )
    {
      return Ok(date);
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday (or \
     hoy/mañana/ayer), weekday names \
     (e.g. monday, lunes), +Nd/-Nd, \
     +Nw/-Nw, YYYY-MM-DD, DD/MM/YYYY"
  })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" | "lunes"
    | "lun" => Some(Weekday::Mon),
    | "tuesday" | "tue" | "martes"
    | "mar" => Some(Weekday::Tue),
    | "wednesday" | "wed"
    | "miércoles" | "miercoles"
    | "mié" | "mie" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "jueves"
    | "jue" => Some(Weekday::Thu),
    | "friday" | "fri" | "viernes"
    | "vie" => Some(Weekday::Fri),
    | "saturday" | "sat" | "sábado"
    | "sabado" | "sáb" | "sab" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" | "domingo"
    | "dom" => Some(Weekday::Sun),
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  add_days(from, delta)
}
