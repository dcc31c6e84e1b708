use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};

use crate::config::CalendarSettings;
use crate::datetime::{
  add_days,
  shift_months
};
use crate::event::CalendarEvent;
use crate::grid::{
  CalendarGrid,
  DayAgenda,
  GridBuilder,
  ViewMode
};
use crate::overlay::overlay_events_with_stats;
use crate::upcoming::collect_upcoming;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Prev,
  Next
}

impl Direction {
  fn step(self) -> i32 {
    match self {
      | Self::Prev => -1,
      | Self::Next => 1
    }
  }
}

/// Side effects a transition asks the
/// host to perform.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Effect {
  FetchUpcoming
}

/// Navigation state of one calendar
/// screen. `reference` anchors the month
/// view; `selected` drives the week and
/// day views. Transitions return a new
/// state and never touch `self`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct CalendarState {
  pub reference: NaiveDate,
  pub selected:  NaiveDate,
  pub view:      ViewMode,
  pub today:     NaiveDate
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct ViewChange {
  pub state:  CalendarState,
  pub effect: Option<Effect>
}

impl CalendarState {
  pub fn mount(today: NaiveDate) -> Self {
    Self {
      reference: today,
      selected: today,
      view: ViewMode::Month,
      today
    }
  }

  #[must_use]
  pub fn navigate(
    self,
    direction: Direction
  ) -> Self {
    let step = direction.step();
    let next = match self.view {
      | ViewMode::Month => {
        Self {
          reference: shift_months(
            self.reference,
            step
          ),
          ..self
        }
      }
      | ViewMode::Week => {
        Self {
          selected: add_days(
            self.selected,
            i64::from(step) * 7
          ),
          ..self
        }
      }
      | ViewMode::Day => {
        Self {
          selected: add_days(
            self.selected,
            i64::from(step)
          ),
          ..self
        }
      }
      | ViewMode::List => self
    };

    tracing::debug!(
      view = next.view.as_key(),
      ?direction,
      reference = %next.reference,
      selected = %next.selected,
      "navigated calendar"
    );
    next
  }

  #[must_use]
  pub fn go_to_today(self) -> Self {
    Self {
      reference: self.today,
      selected: self.today,
      ..self
    }
  }

  #[must_use]
  pub fn goto(
    self,
    date: NaiveDate
  ) -> Self {
    Self {
      reference: date,
      selected: date,
      ..self
    }
  }

  /// Refreshes the real current date of a
  /// resumed session without moving the
  /// view.
  #[must_use]
  pub fn with_today(
    self,
    today: NaiveDate
  ) -> Self {
    Self {
      today,
      ..self
    }
  }

  #[must_use]
  pub fn set_view_mode(
    self,
    view: ViewMode
  ) -> ViewChange {
    let effect = (view == ViewMode::List
      && self.view != ViewMode::List)
      .then_some(Effect::FetchUpcoming);
    ViewChange {
      state: Self {
        view,
        ..self
      },
      effect
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum CalendarView {
  Month {
    grid: CalendarGrid
  },
  Week {
    grid: CalendarGrid
  },
  Day {
    grid:   CalendarGrid,
    agenda: DayAgenda
  },
  List {
    items: Vec<CalendarEvent>
  }
}

/// Rebuilds grids and overlays for a
/// state. Every call starts from scratch
/// so a late batch of events only needs
/// another `render`.
#[derive(Debug, Clone)]
pub struct Calendar {
  settings: CalendarSettings
}

impl Calendar {
  pub fn new(
    settings: CalendarSettings
  ) -> Self {
    Self { settings }
  }

  pub fn build_grid(
    &self,
    state: &CalendarState
  ) -> CalendarGrid {
    GridBuilder::new(
      self.settings.week_start,
      state.today
    )
    .build(
      state.reference,
      state.view,
      state.selected
    )
  }

  #[tracing::instrument(skip(self, events), fields(events = events.len()))]
  pub fn render(
    &self,
    state: &CalendarState,
    events: &[CalendarEvent]
  ) -> CalendarView {
    match state.view {
      | ViewMode::Month => {
        CalendarView::Month {
          grid: self
            .overlaid_grid(state, events)
        }
      }
      | ViewMode::Week => {
        CalendarView::Week {
          grid: self
            .overlaid_grid(state, events)
        }
      }
      | ViewMode::Day => {
        let grid =
          self.overlaid_grid(state, events);
        // The day build always yields
        // exactly one cell.
        let agenda = DayAgenda::from_cell(
          grid.cells[0].clone()
        );
        CalendarView::Day { grid, agenda }
      }
      | ViewMode::List => {
        CalendarView::List {
          items: collect_upcoming(
            events,
            state.today,
            self.settings.list_window_days,
            self.settings.list_limit
          )
        }
      }
    }
  }

  fn overlaid_grid(
    &self,
    state: &CalendarState,
    events: &[CalendarEvent]
  ) -> CalendarGrid {
    let (grid, _stats) =
      overlay_events_with_stats(
        &self.build_grid(state),
        events
      );
    grid
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::event::EventKind;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn month_navigation_crosses_year_end() {
    let state =
      CalendarState::mount(date(2024, 12, 15));
    let next = state.navigate(Direction::Next);
    assert_eq!(next.reference, date(2025, 1, 15));
    assert_eq!(next.selected, state.selected);

    let back = next
      .navigate(Direction::Prev)
      .navigate(Direction::Prev);
    assert_eq!(back.reference, date(2024, 11, 15));
  }

  #[test]
  fn month_navigation_clamps_long_months() {
    let state =
      CalendarState::mount(date(2024, 3, 31));
    assert_eq!(
      state.navigate(Direction::Prev).reference,
      date(2024, 2, 29)
    );
  }

  #[test]
  fn week_and_day_move_the_selected_date() {
    let today = date(2024, 2, 1);
    let week = CalendarState::mount(today)
      .set_view_mode(ViewMode::Week)
      .state
      .navigate(Direction::Next);
    assert_eq!(week.selected, date(2024, 2, 8));
    assert_eq!(week.reference, today);

    let day = week
      .set_view_mode(ViewMode::Day)
      .state
      .navigate(Direction::Prev);
    assert_eq!(day.selected, date(2024, 2, 7));
  }

  #[test]
  fn list_navigation_is_a_no_op() {
    let change = CalendarState::mount(date(2024, 2, 1))
      .set_view_mode(ViewMode::List);
    assert_eq!(change.effect, Some(Effect::FetchUpcoming));
    assert_eq!(
      change.state.navigate(Direction::Next),
      change.state
    );
  }

  #[test]
  fn view_switch_keeps_dates() {
    let state = CalendarState::mount(date(2024, 2, 1))
      .navigate(Direction::Next);
    let change = state.set_view_mode(ViewMode::Week);
    assert_eq!(change.effect, None);
    assert_eq!(change.state.reference, state.reference);
    assert_eq!(change.state.selected, state.selected);
  }

  #[test]
  fn today_resets_both_dates() {
    let today = date(2024, 2, 1);
    let moved = CalendarState::mount(today)
      .navigate(Direction::Next)
      .set_view_mode(ViewMode::Day)
      .state
      .navigate(Direction::Next)
      .go_to_today();
    assert_eq!(moved.reference, today);
    assert_eq!(moved.selected, today);
    assert_eq!(moved.view, ViewMode::Day);
  }

  #[test]
  fn render_is_repeatable_and_overlays() {
    let calendar =
      Calendar::new(CalendarSettings::default());
    let state =
      CalendarState::mount(date(2024, 2, 1));
    let events = vec![CalendarEvent::new(
      EventKind::Survey,
      "Relevamiento",
      "2024-02-01"
    )];

    let first = calendar.render(&state, &events);
    assert_eq!(first, calendar.render(&state, &events));

    let CalendarView::Month { grid } = first else {
      panic!("expected month view");
    };
    assert_eq!(grid.len(), 42);
    assert_eq!(grid.cells[3].events.len(), 1);
    assert!(grid.cells[3].is_today);
  }

  #[test]
  fn render_day_and_list_views() {
    let calendar =
      Calendar::new(CalendarSettings::default());
    let today = date(2024, 2, 1);
    let events = vec![
      CalendarEvent::new(EventKind::WorkOrder, "OT", "2024-02-01 10:00"),
      CalendarEvent::new(EventKind::Survey, "next", "2024-02-03"),
    ];

    let day = CalendarState::mount(today)
      .set_view_mode(ViewMode::Day)
      .state;
    let CalendarView::Day { grid, agenda } =
      calendar.render(&day, &events)
    else {
      panic!("expected day view");
    };
    assert_eq!(grid.len(), 1);
    assert_eq!(agenda.body[9].events.len(), 1);

    let list = day.set_view_mode(ViewMode::List).state;
    let CalendarView::List { items } =
      calendar.render(&list, &events)
    else {
      panic!("expected list view");
    };
    assert_eq!(items.len(), 2);
  }

  #[test]
  fn each_view_mode_renders_its_own_variant() {
    let calendar =
      Calendar::new(CalendarSettings::default());
    let mount = CalendarState::mount(date(2024, 2, 1));
    for mode in ViewMode::all() {
      let state = mount.set_view_mode(mode).state;
      let rendered = match calendar.render(&state, &[]) {
        | CalendarView::Month { .. } => ViewMode::Month,
        | CalendarView::Week { .. } => ViewMode::Week,
        | CalendarView::Day { grid, agenda } => {
          assert_eq!(grid.cells[0], agenda.cell);
          ViewMode::Day
        }
        | CalendarView::List { .. } => ViewMode::List
      };
      assert_eq!(rendered, mode);
    }
  }
}
