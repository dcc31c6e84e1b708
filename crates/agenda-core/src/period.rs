use std::collections::BTreeMap;

use chrono::{
  Datelike,
  NaiveDate,
  Weekday
};
use serde::Serialize;

use crate::datetime::{
  add_days,
  first_day_of_month,
  last_day_of_month,
  start_of_week
};
use crate::event::{
  CalendarEvent,
  EventKind
};
use crate::grid::ViewMode;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum Locale {
  #[default]
  Es,
  En
}

impl Locale {
  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key.trim().to_lowercase().as_str()
    {
      | "es" | "es-ar" | "es_ar"
      | "spanish" => Some(Self::Es),
      | "en" | "en-us" | "en_us"
      | "english" => Some(Self::En),
      | _ => None
    }
  }

  fn weekday_names(
    self
  ) -> [&'static str; 7] {
    match self {
      | Self::Es => {
        [
          "Lun", "Mar", "Mié", "Jue",
          "Vie", "Sáb", "Dom"
        ]
      }
      | Self::En => {
        [
          "Mon", "Tue", "Wed", "Thu",
          "Fri", "Sat", "Sun"
        ]
      }
    }
  }

  fn weekday_long(
    self,
    day: Weekday
  ) -> &'static str {
    let idx =
      day.num_days_from_monday() as usize;
    match self {
      | Self::Es => {
        [
          "Lunes",
          "Martes",
          "Miércoles",
          "Jueves",
          "Viernes",
          "Sábado",
          "Domingo"
        ][idx]
      }
      | Self::En => {
        [
          "Monday",
          "Tuesday",
          "Wednesday",
          "Thursday",
          "Friday",
          "Saturday",
          "Sunday"
        ][idx]
      }
    }
  }

  pub fn month_name(
    self,
    month: u32
  ) -> &'static str {
    let idx =
      (month.clamp(1, 12) - 1) as usize;
    match self {
      | Self::Es => {
        [
          "Enero",
          "Febrero",
          "Marzo",
          "Abril",
          "Mayo",
          "Junio",
          "Julio",
          "Agosto",
          "Septiembre",
          "Octubre",
          "Noviembre",
          "Diciembre"
        ][idx]
      }
      | Self::En => {
        [
          "January",
          "February",
          "March",
          "April",
          "May",
          "June",
          "July",
          "August",
          "September",
          "October",
          "November",
          "December"
        ][idx]
      }
    }
  }

  pub fn view_label(
    self,
    view: ViewMode
  ) -> &'static str {
    match (self, view) {
      | (Self::Es, ViewMode::Month) => {
        "Mes"
      }
      | (Self::Es, ViewMode::Week) => {
        "Semana"
      }
      | (Self::Es, ViewMode::Day) => "Día",
      | (Self::Es, ViewMode::List) => {
        "Próximos"
      }
      | (Self::En, ViewMode::Month) => {
        "Month"
      }
      | (Self::En, ViewMode::Week) => {
        "Week"
      }
      | (Self::En, ViewMode::Day) => "Day",
      | (Self::En, ViewMode::List) => {
        "Upcoming"
      }
    }
  }
}

pub fn weekday_labels(
  week_start: Weekday,
  locale: Locale
) -> Vec<&'static str> {
  let names = locale.weekday_names();
  let start =
    week_start.num_days_from_monday()
      as usize;
  (0..7)
    .map(|offset| names[(start + offset) % 7])
    .collect()
}

/// Inclusive date range covered by a
/// view. The list view has no window.
pub fn period_window(
  view: ViewMode,
  reference: NaiveDate,
  selected: NaiveDate,
  week_start: Weekday
) -> Option<(NaiveDate, NaiveDate)> {
  match view {
    | ViewMode::Month => {
      Some((
        first_day_of_month(
          reference.year(),
          reference.month()
        ),
        last_day_of_month(
          reference.year(),
          reference.month()
        )
      ))
    }
    | ViewMode::Week => {
      let start = start_of_week(
        selected, week_start
      );
      Some((start, add_days(start, 6)))
    }
    | ViewMode::Day => {
      Some((selected, selected))
    }
    | ViewMode::List => None
  }
}

pub fn period_title(
  view: ViewMode,
  reference: NaiveDate,
  selected: NaiveDate,
  week_start: Weekday,
  locale: Locale
) -> String {
  match view {
    | ViewMode::Month => {
      format!(
        "{} {}",
        locale
          .month_name(reference.month()),
        reference.year()
      )
    }
    | ViewMode::Week => {
      let start = start_of_week(
        selected, week_start
      );
      format!(
        "{} {} - {}",
        locale.view_label(view),
        start.format("%Y-%m-%d"),
        add_days(start, 6)
          .format("%Y-%m-%d")
      )
    }
    | ViewMode::Day => {
      format!(
        "{}, {}",
        locale
          .weekday_long(selected.weekday()),
        selected.format("%Y-%m-%d")
      )
    }
    | ViewMode::List => {
      locale.view_label(view).to_string()
    }
  }
}

#[derive(
  Debug, Clone, Default, PartialEq, Serialize,
)]
pub struct PeriodStats {
  pub total:   usize,
  pub by_kind: BTreeMap<String, usize>
}

impl PeriodStats {
  fn push(&mut self, kind: EventKind) {
    self.total =
      self.total.saturating_add(1);
    let slot = self
      .by_kind
      .entry(kind.as_key().to_string())
      .or_default();
    *slot = slot.saturating_add(1);
  }
}

pub fn summarize_period(
  events: &[CalendarEvent],
  window: Option<(NaiveDate, NaiveDate)>
) -> PeriodStats {
  let mut stats = PeriodStats::default();
  let Some((start, end)) = window else {
    return stats;
  };

  for event in events {
    let Some(day) = event.calendar_date()
    else {
      continue;
    };
    if day < start || day > end {
      continue;
    }
    stats.push(event.kind);
  }

  stats
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    Weekday
  };

  use super::*;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn labels_follow_week_start() {
    assert_eq!(
      weekday_labels(Weekday::Mon, Locale::Es)[0],
      "Lun"
    );
    let sunday_first =
      weekday_labels(Weekday::Sun, Locale::En);
    assert_eq!(sunday_first[0], "Sun");
    assert_eq!(sunday_first[6], "Sat");
  }

  #[test]
  fn titles_per_view() {
    let reference = date(2024, 2, 1);
    assert_eq!(
      period_title(
        ViewMode::Month,
        reference,
        reference,
        Weekday::Mon,
        Locale::Es
      ),
      "Febrero 2024"
    );
    assert_eq!(
      period_title(
        ViewMode::Week,
        reference,
        reference,
        Weekday::Mon,
        Locale::Es
      ),
      "Semana 2024-01-29 - 2024-02-04"
    );
    assert_eq!(
      period_title(
        ViewMode::Day,
        reference,
        reference,
        Weekday::Mon,
        Locale::Es
      ),
      "Jueves, 2024-02-01"
    );
  }

  #[test]
  fn stats_count_only_the_window() {
    let events = vec![
      CalendarEvent::new(EventKind::Survey, "a", "2024-02-02"),
      CalendarEvent::new(EventKind::Survey, "b", "2024-02-29"),
      CalendarEvent::new(EventKind::WorkOrder, "c", "2024-02-10"),
      CalendarEvent::new(EventKind::WorkOrder, "d", "2024-03-01"),
    ];
    let window = period_window(
      ViewMode::Month,
      date(2024, 2, 15),
      date(2024, 2, 15),
      Weekday::Mon
    );
    let stats = summarize_period(&events, window);

    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_kind.get("survey"), Some(&2));
    assert_eq!(stats.by_kind.get("work_order"), Some(&1));
    assert_eq!(
      summarize_period(&events, None),
      PeriodStats::default()
    );
  }
}
