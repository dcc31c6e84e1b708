use chrono::{
  Datelike,
  NaiveDate,
  Weekday
};
use serde::{
  Deserialize,
  Serialize
};

use crate::datetime::{
  add_days,
  days_in_month,
  first_day_of_month,
  is_same_calendar_day,
  last_day_of_month,
  start_of_week,
  weekday_index
};
use crate::event::CalendarEvent;

pub const MONTH_GRID_CELLS: usize = 42;
pub const WEEK_GRID_CELLS: usize = 7;
pub const HOURS_PER_DAY: u32 = 24;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  Month,
  Week,
  Day,
  List
}

impl ViewMode {
  pub fn all() -> [Self; 4] {
    [
      Self::Month,
      Self::Week,
      Self::Day,
      Self::List
    ]
  }

  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Month => "month",
      | Self::Week => "week",
      | Self::Day => "day",
      | Self::List => "list"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key.trim().to_lowercase().as_str()
    {
      | "month" | "mes" => {
        Some(Self::Month)
      }
      | "week" | "semana" => {
        Some(Self::Week)
      }
      | "day" | "dia" | "día" => {
        Some(Self::Day)
      }
      | "list" | "lista" => {
        Some(Self::List)
      }
      | _ => None
    }
  }
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct DayCell {
  pub date:              NaiveDate,
  pub day_number:        u32,
  pub is_current_period: bool,
  pub is_today:          bool,
  pub events:            Vec<CalendarEvent>
}

/// Cells of one rendered period. Month
/// grids always hold 42 contiguous days
/// and week grids 7, both starting on the
/// configured week start.
#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct CalendarGrid {
  pub view:      ViewMode,
  pub reference: NaiveDate,
  pub cells:     Vec<DayCell>
}

impl CalendarGrid {
  pub fn len(&self) -> usize {
    self.cells.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }

  pub fn cells(&self) -> &[DayCell] {
    &self.cells
  }

  pub fn first_date(
    &self
  ) -> Option<NaiveDate> {
    self.cells.first().map(|c| c.date)
  }

  pub fn last_date(
    &self
  ) -> Option<NaiveDate> {
    self.cells.last().map(|c| c.date)
  }

  pub fn contains(
    &self,
    date: NaiveDate
  ) -> bool {
    match (
      self.first_date(),
      self.last_date()
    ) {
      | (Some(first), Some(last)) => {
        date >= first && date <= last
      }
      | _ => false
    }
  }

  pub fn cell_for(
    &self,
    date: NaiveDate
  ) -> Option<&DayCell> {
    self
      .cells
      .iter()
      .find(|cell| cell.date == date)
  }

  /// Cells split into rows of seven.
  pub fn weeks(
    &self
  ) -> impl Iterator<Item = &[DayCell]>
  {
    self.cells.chunks(WEEK_GRID_CELLS)
  }
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct HourSlot {
  pub hour:   u32,
  pub events: Vec<CalendarEvent>
}

/// Hourly layout of a single day. Hour 0
/// is the header row; hours 1..=23 make up
/// the body.
#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct DayAgenda {
  pub cell:   DayCell,
  pub header: HourSlot,
  pub body:   Vec<HourSlot>
}

impl DayAgenda {
  pub fn from_cell(cell: DayCell) -> Self {
    let slot = |hour: u32| HourSlot {
      hour,
      events: cell
        .events
        .iter()
        .filter(|event| {
          event.hour() == Some(hour)
        })
        .cloned()
        .collect()
    };

    let header = slot(0);
    let body =
      (1..HOURS_PER_DAY).map(slot).collect();

    Self {
      cell,
      header,
      body
    }
  }

  pub fn hours(
    &self
  ) -> impl Iterator<Item = &HourSlot> {
    std::iter::once(&self.header)
      .chain(self.body.iter())
  }

  /// Events of the day that carry no time
  /// of day.
  pub fn all_day(
    &self
  ) -> impl Iterator<Item = &CalendarEvent>
  {
    self
      .cell
      .events
      .iter()
      .filter(|event| event.hour().is_none())
  }
}

#[derive(Debug, Clone, Copy)]
pub struct GridBuilder {
  pub week_start: Weekday,
  pub today:      NaiveDate
}

impl GridBuilder {
  pub fn new(
    week_start: Weekday,
    today: NaiveDate
  ) -> Self {
    Self {
      week_start,
      today
    }
  }

  /// `reference` anchors the month;
  /// `week_anchor` is the selected date
  /// used by the week and day views.
  #[tracing::instrument(level = "trace", skip(self))]
  pub fn build(
    &self,
    reference: NaiveDate,
    view: ViewMode,
    week_anchor: NaiveDate
  ) -> CalendarGrid {
    match view {
      | ViewMode::Month => {
        self.month(reference)
      }
      | ViewMode::Week => {
        self.week(reference, week_anchor)
      }
      | ViewMode::Day => {
        self.day(reference, week_anchor)
      }
      | ViewMode::List => {
        CalendarGrid {
          view,
          reference,
          cells: Vec::new()
        }
      }
    }
  }

  pub fn month(
    &self,
    reference: NaiveDate
  ) -> CalendarGrid {
    let first = first_day_of_month(
      reference.year(),
      reference.month()
    );
    let last = last_day_of_month(
      reference.year(),
      reference.month()
    );
    let lead = i64::from(weekday_index(
      first,
      self.week_start
    ));

    let mut cells =
      Vec::with_capacity(MONTH_GRID_CELLS);

    for back in (1..=lead).rev() {
      cells.push(self.cell(
        add_days(first, -back),
        false
      ));
    }

    let month_len = i64::from(
      days_in_month(
        reference.year(),
        reference.month()
      )
    );
    for offset in 0..month_len {
      cells.push(self.cell(
        add_days(first, offset),
        true
      ));
    }

    let mut next = 1;
    while cells.len() < MONTH_GRID_CELLS {
      cells.push(self.cell(
        add_days(last, next),
        false
      ));
      next += 1;
    }

    tracing::trace!(
      reference = %reference,
      lead,
      month_len,
      "built month grid"
    );

    CalendarGrid {
      view: ViewMode::Month,
      reference,
      cells
    }
  }

  pub fn week(
    &self,
    reference: NaiveDate,
    anchor: NaiveDate
  ) -> CalendarGrid {
    let start = start_of_week(
      anchor,
      self.week_start
    );
    let cells = (0..WEEK_GRID_CELLS as i64)
      .map(|offset| {
        let date =
          add_days(start, offset);
        self.cell(
          date,
          same_month(date, reference)
        )
      })
      .collect();

    CalendarGrid {
      view: ViewMode::Week,
      reference,
      cells
    }
  }

  pub fn day(
    &self,
    reference: NaiveDate,
    selected: NaiveDate
  ) -> CalendarGrid {
    CalendarGrid {
      view: ViewMode::Day,
      reference,
      cells: vec![self.cell(
        selected,
        same_month(selected, reference)
      )]
    }
  }

  fn cell(
    &self,
    date: NaiveDate,
    is_current_period: bool
  ) -> DayCell {
    DayCell {
      date,
      day_number: date.day(),
      is_current_period,
      is_today: is_same_calendar_day(
        &date,
        &self.today
      ),
      events: Vec::new()
    }
  }
}

/// Monday-first grid for the given view.
pub fn build_grid(
  reference: NaiveDate,
  view: ViewMode,
  week_anchor: NaiveDate,
  today: NaiveDate
) -> CalendarGrid {
  GridBuilder::new(Weekday::Mon, today)
    .build(reference, view, week_anchor)
}

fn same_month(
  date: NaiveDate,
  reference: NaiveDate
) -> bool {
  date.year() == reference.year()
    && date.month() == reference.month()
}

#[cfg(test)]
mod tests {
  use chrono::{
    Datelike,
    NaiveDate,
    Weekday
  };

  use super::*;
  use crate::event::{
    CalendarEvent,
    EventKind
  };

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn february_2024_layout() {
    let reference = date(2024, 2, 1);
    let grid = build_grid(
      reference,
      ViewMode::Month,
      reference,
      date(2030, 1, 1)
    );

    assert_eq!(grid.len(), 42);
    assert_eq!(
      grid.cells[0].date,
      date(2024, 1, 29)
    );
    assert_eq!(
      grid.cells[3].date,
      date(2024, 2, 1)
    );
    assert_eq!(
      grid.cells[41].date,
      date(2024, 3, 10)
    );
    for (idx, cell) in
      grid.cells.iter().enumerate()
    {
      assert_eq!(
        cell.is_current_period,
        (3..=31).contains(&idx),
        "index {idx}"
      );
    }
  }

  #[test]
  fn every_month_is_42_contiguous_days() {
    let today = date(2024, 6, 15);
    for year in [1999, 2000, 2023, 2024, 2100]
    {
      for month in 1..=12 {
        let reference =
          date(year, month, 1);
        let grid = build_grid(
          reference,
          ViewMode::Month,
          reference,
          today
        );

        assert_eq!(grid.len(), MONTH_GRID_CELLS);
        assert_eq!(
          grid.cells[0].date.weekday(),
          Weekday::Mon
        );
        assert_eq!(
          grid.cells[41].date.weekday(),
          Weekday::Sun
        );
        for pair in grid.cells.windows(2) {
          assert_eq!(
            pair[1].date,
            add_days(pair[0].date, 1)
          );
        }
        assert_eq!(
          grid
            .cells
            .iter()
            .filter(|c| c.is_current_period)
            .count() as u32,
          days_in_month(year, month)
        );
      }
    }
  }

  #[test]
  fn today_is_marked_once_when_visible() {
    let reference = date(2024, 2, 10);
    let visible = build_grid(
      reference,
      ViewMode::Month,
      reference,
      date(2024, 3, 4)
    );
    let marked = visible
      .cells
      .iter()
      .filter(|c| c.is_today)
      .collect::<Vec<_>>();
    assert_eq!(marked.len(), 1);
    assert_eq!(marked[0].date, date(2024, 3, 4));
    assert!(!marked[0].is_current_period);

    let hidden = build_grid(
      reference,
      ViewMode::Month,
      reference,
      date(2024, 5, 1)
    );
    assert!(
      hidden.cells.iter().all(|c| !c.is_today)
    );
  }

  #[test]
  fn sunday_start_shifts_the_month_grid() {
    let reference = date(2024, 9, 1);
    let grid = GridBuilder::new(
      Weekday::Sun,
      reference
    )
    .month(reference);

    assert_eq!(grid.len(), 42);
    assert_eq!(grid.cells[0].date, reference);
    assert!(grid.cells[0].is_today);
  }

  #[test]
  fn week_view_dims_against_the_month_anchor() {
    let reference = date(2024, 2, 15);
    let anchor = date(2024, 3, 1);
    let grid = build_grid(
      reference,
      ViewMode::Week,
      anchor,
      anchor
    );

    assert_eq!(grid.len(), 7);
    assert_eq!(
      grid.cells[0].date,
      date(2024, 2, 26)
    );
    let flags = grid
      .cells
      .iter()
      .map(|c| c.is_current_period)
      .collect::<Vec<_>>();
    assert_eq!(
      flags,
      vec![true, true, true, true, false, false, false]
    );
  }

  #[test]
  fn list_view_has_no_cells() {
    let today = date(2024, 2, 1);
    let grid = build_grid(
      today,
      ViewMode::List,
      today,
      today
    );
    assert!(grid.is_empty());
  }

  #[test]
  fn day_agenda_has_header_and_23_rows() {
    let today = date(2024, 2, 1);
    let mut cell = build_grid(
      today,
      ViewMode::Day,
      today,
      today
    )
    .cells
    .remove(0);
    cell.events = vec![
      CalendarEvent::new(
        EventKind::Survey,
        "Relevamiento",
        "2024-02-01 00:30"
      ),
      CalendarEvent::new(
        EventKind::WorkOrder,
        "OT",
        "2024-02-01 14:00"
      ),
      CalendarEvent::new(
        EventKind::Task,
        "Llamar",
        "2024-02-01"
      ),
    ];

    let agenda = DayAgenda::from_cell(cell);
    assert_eq!(agenda.header.hour, 0);
    assert_eq!(agenda.header.events.len(), 1);
    assert_eq!(agenda.body.len(), 23);
    assert_eq!(agenda.body[0].hour, 1);
    assert_eq!(agenda.body[22].hour, 23);
    assert_eq!(agenda.body[13].events.len(), 1);
    assert_eq!(agenda.hours().count(), 24);
    assert_eq!(agenda.all_day().count(), 1);
  }

  #[test]
  fn view_mode_keys_round_trip() {
    for mode in ViewMode::all() {
      assert_eq!(
        ViewMode::from_key(mode.as_key()),
        Some(mode)
      );
    }
    assert_eq!(
      ViewMode::from_key("Semana"),
      Some(ViewMode::Week)
    );
  }
}
