use std::collections::BTreeMap;
use std::fmt;

use chrono::{
  DateTime,
  NaiveDate,
  NaiveDateTime,
  Timelike
};
use serde::{
  Deserialize,
  Serialize
};

/// What kind of visit or document an
/// event stands for.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
  Survey,
  WorkOrder,
  DeliveryNote,
  Inspection,
  Task,
  #[default]
  Other
}

impl EventKind {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Survey => "survey",
      | Self::WorkOrder => "work_order",
      | Self::DeliveryNote => {
        "delivery_note"
      }
      | Self::Inspection => "inspection",
      | Self::Task => "task",
      | Self::Other => "other"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key
      .trim()
      .to_lowercase()
      .replace('-', "_")
      .as_str()
    {
      | "survey" | "relevamiento" => {
        Some(Self::Survey)
      }
      | "work_order" | "orden"
      | "orden_trabajo"
      | "orden_de_trabajo" => {
        Some(Self::WorkOrder)
      }
      | "delivery_note" | "remito" => {
        Some(Self::DeliveryNote)
      }
      | "inspection" | "inspeccion"
      | "inspección" | "checklist" => {
        Some(Self::Inspection)
      }
      | "task" | "tarea" => {
        Some(Self::Task)
      }
      | "other" | "otro" => {
        Some(Self::Other)
      }
      | _ => None
    }
  }
}

impl From<String> for EventKind {
  fn from(raw: String) -> Self {
    Self::from_key(&raw).unwrap_or_else(
      || {
        tracing::trace!(kind = %raw, "unknown event kind");
        Self::Other
      }
    )
  }
}

impl From<EventKind> for String {
  fn from(kind: EventKind) -> Self {
    kind.as_key().to_string()
  }
}

impl fmt::Display for EventKind {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

/// A dated annotation coming from the
/// backend: a survey visit, a work
/// order, a delivery note and so on.
/// The calendar never mutates these.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct CalendarEvent {
  #[serde(default)]
  pub id: Option<u64>,

  #[serde(default, alias = "tipo")]
  pub kind: EventKind,

  #[serde(default, alias = "titulo")]
  pub title: String,

  #[serde(default, alias = "cliente")]
  pub client: Option<String>,

  #[serde(default, alias = "sucursal")]
  pub branch: Option<String>,

  #[serde(default, alias = "usuario")]
  pub user: Option<String>,

  #[serde(default, alias = "fecha")]
  pub date: Option<String>,

  #[serde(flatten)]
  pub extra:
    BTreeMap<String, serde_json::Value>
}

impl CalendarEvent {
  pub fn new(
    kind: EventKind,
    title: impl Into<String>,
    date: impl Into<String>
  ) -> Self {
    Self {
      id: None,
      kind,
      title: title.into(),
      client: None,
      branch: None,
      user: None,
      date: Some(date.into()),
      extra: BTreeMap::new()
    }
  }

  /// Calendar day of the event, read from
  /// the fields as written. Offsets in
  /// RFC 3339 values are not converted.
  pub fn calendar_date(
    &self
  ) -> Option<NaiveDate> {
    self
      .date
      .as_deref()
      .and_then(parse_event_date)
      .map(|(date, _)| date)
  }

  pub fn hour(&self) -> Option<u32> {
    self
      .date
      .as_deref()
      .and_then(parse_event_date)
      .and_then(|(_, hour)| hour)
  }

  pub fn display_title(&self) -> String {
    let title = self.title.trim();
    if !title.is_empty() {
      return title.to_string();
    }

    match self.id {
      | Some(id) => {
        format!("{} #{id}", self.kind)
      }
      | None => self.kind.to_string()
    }
  }
}

const DATETIME_FORMATS: [&str; 5] = [
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%d %H:%M"
];

const DATE_FORMATS: [&str; 2] =
  ["%Y-%m-%d", "%d/%m/%Y"];

fn parse_event_date(
  raw: &str
) -> Option<(NaiveDate, Option<u32>)> {
  let token = raw.trim();
  if token.is_empty() {
    return None;
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Some((
      dt.date_naive(),
      Some(dt.hour())
    ));
  }

  for fmt in DATETIME_FORMATS {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Some((
        ndt.date(),
        Some(ndt.hour())
      ));
    }
  }

  for fmt in DATE_FORMATS {
    if let Ok(date) =
      NaiveDate::parse_from_str(
        token, fmt
      )
    {
      return Some((date, None));
    }
  }

  None
}
