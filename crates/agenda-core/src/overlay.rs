use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::event::CalendarEvent;
use crate::grid::{
  CalendarGrid,
  DayCell
};

pub const DEFAULT_EVENT_CAP: usize = 3;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct OverlayStats {
  pub attached:     usize,
  pub undated:      usize,
  pub out_of_range: usize
}

/// Returns a copy of `grid` whose cells
/// carry every event dated on that cell's
/// day, in input order. Undated events and
/// events outside the grid are dropped.
pub fn overlay_events(
  grid: &CalendarGrid,
  events: &[CalendarEvent]
) -> CalendarGrid {
  overlay_events_with_stats(grid, events)
    .0
}

#[tracing::instrument(skip_all, fields(view = ?grid.view, events = events.len()))]
pub fn overlay_events_with_stats(
  grid: &CalendarGrid,
  events: &[CalendarEvent]
) -> (CalendarGrid, OverlayStats) {
  let (by_day, undated) =
    group_by_day(events);
  let mut stats = OverlayStats {
    undated,
    ..OverlayStats::default()
  };

  let mut out = grid.clone();
  for cell in &mut out.cells {
    cell.events = by_day
      .get(&cell.date)
      .map(|day_events| {
        day_events
          .iter()
          .map(|event| (*event).clone())
          .collect()
      })
      .unwrap_or_default();
    stats.attached += cell.events.len();
  }

  stats.out_of_range = events
    .len()
    .saturating_sub(undated)
    .saturating_sub(stats.attached);

  tracing::debug!(
    attached = stats.attached,
    undated = stats.undated,
    out_of_range = stats.out_of_range,
    "overlaid events on grid"
  );

  (out, stats)
}

type DayBucket<'a> =
  Vec<&'a CalendarEvent>;

/// Buckets events by calendar day keeping
/// input order inside each day. Also
/// returns how many events had no usable
/// date.
pub fn group_by_day(
  events: &[CalendarEvent]
) -> (
  BTreeMap<NaiveDate, DayBucket<'_>>,
  usize
) {
  let mut by_day: BTreeMap<
    NaiveDate,
    DayBucket<'_>
  > = BTreeMap::new();
  let mut undated = 0_usize;

  for event in events {
    match event.calendar_date() {
      | Some(date) => {
        by_day
          .entry(date)
          .or_default()
          .push(event);
      }
      | None => {
        tracing::trace!(
          title = %event.title,
          raw = ?event.date,
          "event without usable date"
        );
        undated += 1;
      }
    }
  }

  (by_day, undated)
}

impl DayCell {
  /// First `cap` events, for inline
  /// display.
  pub fn visible_events(
    &self,
    cap: usize
  ) -> &[CalendarEvent] {
    let shown = self.events.len().min(cap);
    &self.events[..shown]
  }

  pub fn hidden_count(
    &self,
    cap: usize
  ) -> usize {
    self.events.len().saturating_sub(cap)
  }

  /// `"+N more"` when events were hidden.
  pub fn more_label(
    &self,
    cap: usize
  ) -> Option<String> {
    match self.hidden_count(cap) {
      | 0 => None,
      | hidden => {
        Some(format!("+{hidden} more"))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::event::EventKind;
  use crate::grid::{
    ViewMode,
    build_grid
  };

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  fn survey(
    title: &str,
    raw_date: &str
  ) -> CalendarEvent {
    CalendarEvent::new(
      EventKind::Survey,
      title,
      raw_date
    )
  }

  fn february_grid() -> CalendarGrid {
    let reference = date(2024, 2, 1);
    build_grid(
      reference,
      ViewMode::Month,
      reference,
      reference
    )
  }

  #[test]
  fn attaches_events_to_matching_cells_in_order()
  {
    let events = vec![
      survey("b", "2024-02-14T10:00:00"),
      survey("a", "2024-02-14"),
      survey("c", "2024-03-02"),
      survey("d", "2024-01-29 08:00"),
    ];
    let grid = overlay_events(
      &february_grid(),
      &events
    );

    let valentine = grid
      .cell_for(date(2024, 2, 14))
      .expect("cell present");
    let titles = valentine
      .events
      .iter()
      .map(|e| e.title.as_str())
      .collect::<Vec<_>>();
    assert_eq!(titles, vec!["b", "a"]);

    assert_eq!(grid.cells[0].events.len(), 1);
    assert_eq!(
      grid
        .cell_for(date(2024, 3, 2))
        .map(|c| c.events.len()),
      Some(1)
    );
  }

  #[test]
  fn out_of_range_and_undated_events_are_excluded()
  {
    let events = vec![
      survey("late", "2024-03-11"),
      survey("early", "2024-01-28"),
      survey("broken", "31/31/2024"),
      survey("ok", "2024-02-01"),
    ];
    let (grid, stats) =
      overlay_events_with_stats(
        &february_grid(),
        &events
      );

    let total: usize = grid
      .cells
      .iter()
      .map(|c| c.events.len())
      .sum();
    assert_eq!(total, 1);
    assert_eq!(
      stats,
      OverlayStats {
        attached:     1,
        undated:      1,
        out_of_range: 2
      }
    );
  }

  #[test]
  fn overlay_replaces_previous_events() {
    let first = overlay_events(
      &february_grid(),
      &[survey("x", "2024-02-05")]
    );
    let second = overlay_events(
      &first,
      &[survey("y", "2024-02-06")]
    );

    assert!(
      second
        .cell_for(date(2024, 2, 5))
        .is_some_and(|c| c.events.is_empty())
    );
    assert_eq!(
      second
        .cell_for(date(2024, 2, 6))
        .map(|c| c.events.len()),
      Some(1)
    );
  }

  #[test]
  fn cap_reports_hidden_events() {
    let day = "2024-02-20";
    let three = (0..3)
      .map(|i| survey(&format!("s{i}"), day))
      .collect::<Vec<_>>();
    let grid = overlay_events(
      &february_grid(),
      &three
    );
    let cell = grid
      .cell_for(date(2024, 2, 20))
      .expect("cell present");
    assert_eq!(cell.visible_events(DEFAULT_EVENT_CAP).len(), 3);
    assert_eq!(cell.hidden_count(DEFAULT_EVENT_CAP), 0);
    assert_eq!(cell.more_label(DEFAULT_EVENT_CAP), None);

    let mut four = three.clone();
    four.push(survey("s3", day));
    let grid = overlay_events(
      &february_grid(),
      &four
    );
    let cell = grid
      .cell_for(date(2024, 2, 20))
      .expect("cell present");
    assert_eq!(cell.events.len(), 4);
    let visible = cell
      .visible_events(DEFAULT_EVENT_CAP)
      .iter()
      .map(|e| e.title.as_str())
      .collect::<Vec<_>>();
    assert_eq!(visible, vec!["s0", "s1", "s2"]);
    assert_eq!(
      cell.more_label(DEFAULT_EVENT_CAP).as_deref(),
      Some("+1 more")
    );
  }

  #[test]
  fn overlay_is_idempotent() {
    let events = vec![
      survey("a", "2024-02-03"),
      survey("b", "2024-02-03"),
    ];
    let base = february_grid();
    assert_eq!(
      overlay_events(&base, &events),
      overlay_events(&base, &events)
    );
  }
}
