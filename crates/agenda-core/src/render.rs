use std::io::{self, IsTerminal, Write};

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::{CalendarSettings, Config};
use crate::controller::{CalendarState, CalendarView};
use crate::event::CalendarEvent;
use crate::grid::{CalendarGrid, DayAgenda, DayCell};
use crate::period::{period_title, period_window, summarize_period, weekday_labels};

const CELL_WIDTH: usize = 16;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    settings: CalendarSettings,
}

impl Renderer {
    pub fn new(cfg: &Config, settings: CalendarSettings) -> anyhow::Result<Self> {
        let color = cfg.get_switch("color")?.unwrap_or(true) && io::stdout().is_terminal();

        Ok(Self { color, settings })
    }

    pub fn plain(settings: CalendarSettings) -> Self {
        Self {
            color: false,
            settings,
        }
    }

    #[tracing::instrument(skip(self, state, view))]
    pub fn print_view(&self, state: &CalendarState, view: &CalendarView) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_view(out, state, view)
    }

    pub fn write_view<W: Write>(
        &self,
        mut out: W,
        state: &CalendarState,
        view: &CalendarView,
    ) -> anyhow::Result<()> {
        let title = period_title(
            state.view,
            state.reference,
            state.selected,
            self.settings.week_start,
            self.settings.locale,
        );
        writeln!(out, "{}", self.paint(&title, "1"))?;

        match view {
            CalendarView::Month { grid } | CalendarView::Week { grid } => {
                self.write_grid(&mut out, grid)?;
            }
            CalendarView::Day { agenda, .. } => {
                self.write_day(&mut out, agenda)?;
            }
            CalendarView::List { items } => {
                write_upcoming(&mut out, items)?;
                return Ok(());
            }
        }

        let window = period_window(
            state.view,
            state.reference,
            state.selected,
            self.settings.week_start,
        );
        let events = view_events(view);
        let stats = summarize_period(&events, window);
        if stats.total > 0 {
            let breakdown = stats
                .by_kind
                .iter()
                .map(|(kind, count)| format!("{kind}={count}"))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(out)?;
            writeln!(out, "{} events ({breakdown})", stats.total)?;
        }

        Ok(())
    }

    fn write_grid<W: Write>(&self, out: &mut W, grid: &CalendarGrid) -> anyhow::Result<()> {
        let cap = self.settings.event_cap;
        let labels = weekday_labels(self.settings.week_start, self.settings.locale);
        let header = labels
            .iter()
            .map(|label| pad(label, CELL_WIDTH))
            .collect::<Vec<_>>()
            .join("|");
        writeln!(out, "{header}")?;
        writeln!(out, "{}", vec!["-".repeat(CELL_WIDTH); labels.len()].join("+"))?;

        for week in grid.weeks() {
            let days = week
                .iter()
                .map(|cell| self.day_label(cell))
                .collect::<Vec<_>>()
                .join("|");
            writeln!(out, "{days}")?;

            let rows = week
                .iter()
                .map(|cell| cell.visible_events(cap).len() + usize::from(cell.hidden_count(cap) > 0))
                .max()
                .unwrap_or(0);

            for row in 0..rows {
                let line = week
                    .iter()
                    .map(|cell| pad(&event_line(cell, cap, row), CELL_WIDTH))
                    .collect::<Vec<_>>()
                    .join("|");
                writeln!(out, "{line}")?;
            }
            writeln!(out, "{}", vec!["-".repeat(CELL_WIDTH); week.len()].join("+"))?;
        }

        Ok(())
    }

    fn day_label(&self, cell: &DayCell) -> String {
        let marker = if cell.is_today { "*" } else { " " };
        let text = pad(&format!("{marker}{:>2}", cell.day_number), CELL_WIDTH);
        if cell.is_today {
            self.paint(&text, "33")
        } else if !cell.is_current_period {
            self.paint(&text, "2")
        } else {
            text
        }
    }

    fn write_day<W: Write>(&self, out: &mut W, agenda: &DayAgenda) -> anyhow::Result<()> {
        let all_day = agenda.all_day().map(|e| e.display_title()).collect::<Vec<_>>();
        if !all_day.is_empty() {
            writeln!(out, "all day  {}", all_day.join(", "))?;
        }

        writeln!(out, "{:02}:00  {}", agenda.header.hour, titles(&agenda.header.events))?;
        writeln!(out, "{}", "-".repeat(CELL_WIDTH * 2))?;
        for slot in &agenda.body {
            writeln!(out, "{:02}:00  {}", slot.hour, titles(&slot.events))?;
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn view_events(view: &CalendarView) -> Vec<CalendarEvent> {
    match view {
        CalendarView::Month { grid } | CalendarView::Week { grid } | CalendarView::Day { grid, .. } => grid
            .cells
            .iter()
            .flat_map(|cell| cell.events.iter().cloned())
            .collect(),
        CalendarView::List { items } => items.clone(),
    }
}

fn event_line(cell: &DayCell, cap: usize, row: usize) -> String {
    let visible = cell.visible_events(cap);
    if let Some(event) = visible.get(row) {
        return format!(" {}", event.display_title());
    }
    if row == visible.len()
        && let Some(label) = cell.more_label(cap)
    {
        return format!(" {label}");
    }
    String::new()
}

fn titles(events: &[CalendarEvent]) -> String {
    events
        .iter()
        .map(CalendarEvent::display_title)
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_upcoming<W: Write>(out: &mut W, items: &[CalendarEvent]) -> anyhow::Result<()> {
    if items.is_empty() {
        writeln!(out, "No upcoming events.")?;
        return Ok(());
    }

    let headers = vec![
        "Date".to_string(),
        "Kind".to_string(),
        "Title".to_string(),
        "Client".to_string(),
        "Branch".to_string(),
    ];
    let rows = items
        .iter()
        .map(|event| {
            vec![
                event.calendar_date().map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
                event.kind.to_string(),
                event.display_title(),
                event.client.clone().unwrap_or_default(),
                event.branch.clone().unwrap_or_default(),
            ]
        })
        .collect();

    write_table(out, headers, rows)
}

fn write_table<W: Write>(writer: &mut W, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(cell.as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{} ", pad(&headers[idx], widths[idx]))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            write!(writer, "{} ", pad(cell, widths[idx]))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

/// Truncates or right-pads `text` to exactly `width` terminal columns.
fn pad(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(width);
    let mut used = 0usize;

    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(ch);
        used += w;
    }

    out.push_str(&" ".repeat(width - used));
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::controller::Calendar;
    use crate::event::EventKind;
    use crate::grid::ViewMode;

    fn render(state: &CalendarState, events: &[CalendarEvent]) -> String {
        let settings = CalendarSettings::default();
        let view = Calendar::new(settings.clone()).render(state, events);
        let mut buf = Vec::new();
        Renderer::plain(settings)
            .write_view(&mut buf, state, &view)
            .expect("render view");
        String::from_utf8(buf).expect("utf8 output")
    }

    #[test]
    fn pad_respects_wide_characters() {
        assert_eq!(pad("abc", 5), "abc  ");
        assert_eq!(pad("abcdef", 3), "abc");
        assert_eq!(UnicodeWidthStr::width(pad("día", 6).as_str()), 6);
    }

    #[test]
    fn month_output_shows_overflow_label() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 1).expect("valid date");
        let state = CalendarState::mount(today);
        let events = (0..4)
            .map(|i| CalendarEvent::new(EventKind::Survey, format!("R{i}"), "2024-02-01"))
            .collect::<Vec<_>>();

        let text = render(&state, &events);
        assert!(text.starts_with("Febrero 2024"));
        assert!(text.contains("* 1"));
        assert!(text.contains(" R2"));
        assert!(!text.contains(" R3"));
        assert!(text.contains("+1 more"));
        assert!(text.contains("4 events (survey=4)"));
    }

    #[test]
    fn day_and_list_output() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 1).expect("valid date");
        let events = vec![
            CalendarEvent::new(EventKind::WorkOrder, "OT 12", "2024-02-01 09:15"),
            CalendarEvent::new(EventKind::DeliveryNote, "Remito 5", "2024-02-01"),
        ];

        let day = CalendarState::mount(today).set_view_mode(ViewMode::Day).state;
        let text = render(&day, &events);
        assert!(text.contains("all day  Remito 5"));
        assert!(text.contains("09:00  OT 12"));
        assert!(text.contains("23:00"));

        let list = day.set_view_mode(ViewMode::List).state;
        let text = render(&list, &events);
        assert!(text.contains("Próximos"));
        assert!(text.contains("2024-02-01 work_order"));
    }
}
