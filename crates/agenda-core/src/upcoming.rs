use chrono::NaiveDate;

use crate::datetime::checked_add_days;
use crate::event::CalendarEvent;

pub const DEFAULT_LIST_WINDOW_DAYS: i64 =
  365;
pub const DEFAULT_LIST_LIMIT: usize = 200;
pub const MAX_LIST_WINDOW_DAYS: i64 =
  36_500;

/// Items for the list view: events dated
/// from `today` through `today +
/// window_days`, earliest first, at most
/// `limit` of them.
#[tracing::instrument(skip(events), fields(events = events.len()))]
pub fn collect_upcoming(
  events: &[CalendarEvent],
  today: NaiveDate,
  window_days: i64,
  limit: usize
) -> Vec<CalendarEvent> {
  let end =
    checked_add_days(today, window_days)
      .unwrap_or(NaiveDate::MAX);

  let mut entries = events
    .iter()
    .filter_map(|event| {
      let day = event.calendar_date()?;
      (day >= today && day <= end)
        .then_some((day, event))
    })
    .collect::<Vec<_>>();

  entries.sort_by_key(|(day, _)| *day);

  let total = entries.len();
  let upcoming = entries
    .into_iter()
    .take(limit)
    .map(|(_, event)| event.clone())
    .collect::<Vec<_>>();

  tracing::debug!(
    matched = total,
    shown = upcoming.len(),
    end = %end,
    "collected upcoming events"
  );
  upcoming
}
