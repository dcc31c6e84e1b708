use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::controller::CalendarState;
use crate::event::{CalendarEvent, EventKind};

/// Where calendar events come from. The console fetches them from its REST
/// backend; the CLI reads them from the data directory.
pub trait EventSource {
    fn load(&self, filter: &EventFilter) -> anyhow::Result<Vec<CalendarEvent>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub client: Option<String>,
    pub branch: Option<String>,
    pub user: Option<String>,
    pub kind: Option<EventKind>,
}

impl EventFilter {
    #[tracing::instrument]
    pub fn parse(terms: &[String]) -> anyhow::Result<Self> {
        let mut filter = Self::default();

        for term in terms {
            let (key, value) = term
                .split_once(':')
                .ok_or_else(|| anyhow!("expected KEY:VALUE filter, got: {term}"))?;
            let value = value.trim();
            if value.is_empty() {
                return Err(anyhow!("empty value for filter {key}"));
            }

            match key.trim().to_ascii_lowercase().as_str() {
                "client" | "cliente" => filter.client = Some(value.to_string()),
                "branch" | "sucursal" => filter.branch = Some(value.to_string()),
                "user" | "usuario" => filter.user = Some(value.to_string()),
                "kind" | "tipo" => {
                    let kind = EventKind::from_key(value)
                        .ok_or_else(|| anyhow!("unknown event kind: {value}"))?;
                    filter.kind = Some(kind);
                }
                other => return Err(anyhow!("unknown filter key: {other}")),
            }
        }

        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn matches(&self, event: &CalendarEvent) -> bool {
        field_matches(self.client.as_deref(), event.client.as_deref())
            && field_matches(self.branch.as_deref(), event.branch.as_deref())
            && field_matches(self.user.as_deref(), event.user.as_deref())
            && self.kind.is_none_or(|kind| kind == event.kind)
    }
}

fn field_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match (wanted, actual) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(wanted), Some(actual)) => wanted.trim().to_lowercase() == actual.trim().to_lowercase(),
    }
}

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub events_path: PathBuf,
    pub state_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let events_path = data_dir.join("events.json");
        let state_path = data_dir.join("state.json");

        if !events_path.exists() {
            fs::write(&events_path, "[]\n")
                .with_context(|| format!("failed to create {}", events_path.display()))?;
        }

        info!(
            data_dir = %data_dir.display(),
            events = %events_path.display(),
            state = %state_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            events_path,
            state_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_events(&self) -> anyhow::Result<Vec<CalendarEvent>> {
        debug!(file = %self.events_path.display(), "loading events");
        let raw = fs::read_to_string(&self.events_path)
            .with_context(|| format!("failed reading {}", self.events_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(vec![]);
        }

        let events: Vec<CalendarEvent> = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.events_path.display()))?;
        debug!(count = events.len(), "loaded events");
        Ok(events)
    }

    #[tracing::instrument(skip(self, events))]
    pub fn save_events(&self, events: &[CalendarEvent]) -> anyhow::Result<()> {
        save_json_atomic(&self.events_path, events).context("failed to save events.json")
    }

    /// `None` means no session was saved yet.
    #[tracing::instrument(skip(self))]
    pub fn load_state(&self) -> anyhow::Result<Option<CalendarState>> {
        if !self.state_path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.state_path)
            .with_context(|| format!("failed reading {}", self.state_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }

        match serde_json::from_str::<CalendarState>(&raw) {
            Ok(state) => Ok(Some(state)),
            Err(err) => {
                warn!(
                    file = %self.state_path.display(),
                    error = %err,
                    "discarding unreadable calendar state"
                );
                Ok(None)
            }
        }
    }

    #[tracing::instrument(skip(self, state))]
    pub fn save_state(&self, state: &CalendarState) -> anyhow::Result<()> {
        save_json_atomic(&self.state_path, state).context("failed to save state.json")
    }

    #[tracing::instrument(skip(self))]
    pub fn clear_state(&self) -> anyhow::Result<()> {
        if self.state_path.exists() {
            fs::remove_file(&self.state_path)
                .with_context(|| format!("failed removing {}", self.state_path.display()))?;
        }
        Ok(())
    }
}

impl EventSource for DataStore {
    fn load(&self, filter: &EventFilter) -> anyhow::Result<Vec<CalendarEvent>> {
        let events = self.load_events()?;
        if filter.is_empty() {
            return Ok(events);
        }

        let total = events.len();
        let kept: Vec<CalendarEvent> = events.into_iter().filter(|e| filter.matches(e)).collect();
        debug!(total, kept = kept.len(), ?filter, "filtered events");
        Ok(kept)
    }
}

#[tracing::instrument(skip(path, value))]
fn save_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    debug!(file = %path.display(), "saving json atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, value)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
