use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::Weekday;
use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::datetime::{
  parse_timezone,
  parse_week_start,
  project_timezone
};
use crate::overlay::DEFAULT_EVENT_CAP;
use crate::period::Locale;
use crate::upcoming::{
  DEFAULT_LIST_LIMIT,
  DEFAULT_LIST_WINDOW_DAYS,
  MAX_LIST_WINDOW_DAYS
};

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("data.location", "~/.agenda"),
      ("default.command", "show"),
      ("color", "on"),
      ("calendar.week_start", "monday"),
      ("calendar.event_cap", "3"),
      ("calendar.list_window_days", "365"),
      ("calendar.list_limit", "200"),
      ("calendar.locale", "es")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    agendarc_override
  ))]
  pub fn load(
    agendarc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let agendarc = resolve_agendarc_path(
      agendarc_override
    )?;
    if let Some(path) = agendarc {
      info!(agendarc = %path.display(), "loading agendarc");
      cfg.load_file(&path, &mut Vec::new())?;
    } else {
      debug!(
        "no agendarc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  /// Reads an on/off switch such as
  /// `color`. Anything outside the on/off
  /// vocabulary is an error.
  pub fn get_switch(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    parse_switch(raw)
      .map(Some)
      .ok_or_else(|| {
        anyhow!("invalid {key} setting: {raw}")
      })
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  /// `chain` holds the canonical paths of
  /// the files currently being read, outermost
  /// first.
  #[tracing::instrument(skip(self, chain))]
  fn load_file(
    &mut self,
    path: &Path,
    chain: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let canonical = fs::canonicalize(&path)
      .with_context(|| {
        format!(
          "failed to resolve {}",
          path.display()
        )
      })?;
    if chain.contains(&canonical) {
      return Err(anyhow!(
        "include cycle: {} includes itself \
         through {}",
        canonical.display(),
        chain
          .iter()
          .map(|p| p.display().to_string())
          .collect::<Vec<_>>()
          .join(" -> ")
      ));
    }
    chain.push(canonical);

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let line = strip_comment(raw_line);

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self.load_file(
            &include_path,
            chain
          )?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
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

    chain.pop();
    Ok(())
  }
}

/// Drops a `#` comment that fills the whole
/// line or follows whitespace. A `#` glued
/// to a value, as in `~/agenda#2`, is kept.
fn strip_comment(raw_line: &str) -> &str {
  let line = raw_line.trim();
  if line.starts_with('#') {
    return "";
  }
  let cut = line
    .char_indices()
    .zip(line.chars().skip(1))
    .find(|((_, c), next)| {
      c.is_whitespace() && *next == '#'
    })
    .map(|((idx, _), _)| idx);
  match cut {
    | Some(idx) => line[..idx].trim_end(),
    | None => line
  }
}

/// Validated `calendar.*` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarSettings {
  pub week_start:       Weekday,
  pub event_cap:        usize,
  pub list_window_days: i64,
  pub list_limit:       usize,
  pub locale:           Locale,
  pub timezone:         Tz
}

impl Default for CalendarSettings {
  fn default() -> Self {
    Self {
      week_start:       Weekday::Mon,
      event_cap:        DEFAULT_EVENT_CAP,
      list_window_days:
        DEFAULT_LIST_WINDOW_DAYS,
      list_limit:       DEFAULT_LIST_LIMIT,
      locale:           Locale::Es,
      timezone:         *project_timezone()
    }
  }
}

impl CalendarSettings {
  #[tracing::instrument(skip(cfg))]
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let mut settings = Self::default();

    if let Some(raw) =
      cfg.get("calendar.week_start")
      && !raw.trim().is_empty()
    {
      settings.week_start =
        parse_week_start(&raw).ok_or_else(
          || {
            anyhow!(
              "invalid \
               calendar.week_start: \
               {raw}"
            )
          }
        )?;
    }

    settings.event_cap = parse_or_default(
      cfg,
      "calendar.event_cap",
      DEFAULT_EVENT_CAP
    )?;
    settings.list_limit = parse_or_default(
      cfg,
      "calendar.list_limit",
      DEFAULT_LIST_LIMIT
    )?;
    let window_days = parse_or_default(
      cfg,
      "calendar.list_window_days",
      DEFAULT_LIST_WINDOW_DAYS
    )?;
    if window_days > MAX_LIST_WINDOW_DAYS {
      warn!(
        value = window_days,
        max = MAX_LIST_WINDOW_DAYS,
        "calendar.list_window_days too \
         large; capping"
      );
    }
    settings.list_window_days =
      window_days.min(MAX_LIST_WINDOW_DAYS);

    if let Some(raw) =
      cfg.get("calendar.locale")
    {
      settings.locale =
        Locale::from_key(&raw)
          .ok_or_else(|| {
            anyhow!(
              "invalid calendar.locale: \
               {raw}"
            )
          })?;
    }

    if let Some(raw) =
      cfg.get("calendar.timezone")
    {
      match parse_timezone(
        &raw,
        "calendar.timezone"
      ) {
        | Some(tz) => {
          settings.timezone = tz;
        }
        | None => {
          warn!(
            timezone = %raw,
            "ignoring calendar.timezone; \
             keeping project timezone"
          );
        }
      }
    }

    debug!(?settings, "resolved calendar settings");
    Ok(settings)
  }
}

/// Zero or negative values fall back to
/// `default`.
fn parse_or_default<T>(
  cfg: &Config,
  key: &str,
  default: T
) -> anyhow::Result<T>
where
  T: std::str::FromStr
    + PartialOrd
    + Default
    + Copy,
  T::Err: std::fmt::Display
{
  let Some(raw) = cfg.get(key) else {
    return Ok(default);
  };

  let parsed =
    raw.trim().parse::<T>().map_err(
      |e| anyhow!("invalid {key}: {raw} ({e})")
    )?;
  if parsed <= T::default() {
    warn!(key, value = %raw, "non-positive value; using default");
    return Ok(default);
  }
  Ok(parsed)
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_agendarc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(agendarc_env) =
    std::env::var("AGENDARC")
  {
    if agendarc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      agendarc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping agendarc"
    );
    return Ok(None);
  };
  let candidate = home.join(".agendarc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".agenda"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_switch(raw: &str) -> Option<bool> {
  match raw.trim().to_lowercase().as_str() {
    | "1" | "y" | "yes" | "on" | "true"
    | "si" | "sí" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}
