use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::cli::{Invocation, OutputFormat};
use crate::config::{CalendarSettings, Config};
use crate::controller::{Calendar, CalendarState, CalendarView, Direction, Effect};
use crate::datetime::{parse_date_expr, today_in_timezone};
use crate::grid::ViewMode;
use crate::period::period_title;
use crate::render::Renderer;
use crate::store::{DataStore, EventFilter, EventSource};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "show", "next", "prev", "today", "view", "goto", "list", "reset", "_show", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// What a command did to the saved session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Save(CalendarState),
    Keep(CalendarState),
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    title: String,
    state: &'a CalendarState,
    #[serde(flatten)]
    view: &'a CalendarView,
}

#[instrument(skip(store, cfg, settings, renderer, inv))]
pub fn dispatch(
    store: &DataStore,
    cfg: &Config,
    settings: &CalendarSettings,
    renderer: &Renderer,
    format: OutputFormat,
    inv: Invocation,
) -> anyhow::Result<()> {
    let today = today_in_timezone(&settings.timezone);
    let command = inv.command.as_str();

    debug!(
        command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        %today,
        "dispatching command"
    );

    match command {
        "_show" => return cmd_show(cfg),
        "help" => return cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        "reset" => {
            store.clear_state()?;
            info!("cleared saved calendar state");
        }
        _ => {}
    }

    let filter = EventFilter::parse(&inv.filter_terms)?;
    let current = store
        .load_state()?
        .map(|state| state.with_today(today))
        .unwrap_or_else(|| CalendarState::mount(today));

    let outcome = apply_command(current, command, &inv.command_args)?;
    let state = match outcome {
        Outcome::Save(state) => {
            store.save_state(&state)?;
            state
        }
        Outcome::Keep(state) => state,
    };

    let events = store.load(&filter)?;
    let view = Calendar::new(settings.clone()).render(&state, &events);

    match format {
        OutputFormat::Text => renderer.print_view(&state, &view),
        OutputFormat::Json => {
            let output = JsonOutput {
                title: period_title(
                    state.view,
                    state.reference,
                    state.selected,
                    settings.week_start,
                    settings.locale,
                ),
                state: &state,
                view: &view,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}

fn apply_command(current: CalendarState, command: &str, args: &[String]) -> anyhow::Result<Outcome> {
    let outcome = match command {
        "show" | "reset" => Outcome::Save(current),
        "next" | "prev" => {
            let direction = if command == "next" { Direction::Next } else { Direction::Prev };
            let steps = parse_steps(args)?;
            let state = (0..steps).fold(current, |state, _| state.navigate(direction));
            Outcome::Save(state)
        }
        "today" => Outcome::Save(current.go_to_today()),
        "view" => {
            let raw = args.first().ok_or_else(|| anyhow!("view requires one of month, week, day, list"))?;
            let mode = ViewMode::from_key(raw).ok_or_else(|| anyhow!("unknown view mode: {raw}"))?;
            let change = current.set_view_mode(mode);
            if change.effect == Some(Effect::FetchUpcoming) {
                info!("list view selected; loading upcoming events");
            }
            Outcome::Save(change.state)
        }
        "goto" => {
            let raw = args.join(" ");
            if raw.trim().is_empty() {
                return Err(anyhow!("goto requires a date"));
            }
            let date: NaiveDate = parse_date_expr(&raw, current.today)?;
            Outcome::Save(current.goto(date))
        }
        "list" => Outcome::Keep(current.set_view_mode(ViewMode::List).state),
        other => return Err(anyhow!("unknown command: {other}")),
    };

    Ok(outcome)
}

/// A hundred years of month steps.
const MAX_STEPS: u32 = 1200;

fn parse_steps(args: &[String]) -> anyhow::Result<u32> {
    let Some(raw) = args.first() else {
        return Ok(1);
    };
    let steps = raw
        .parse::<u32>()
        .with_context(|| format!("invalid step count: {raw}"))?;
    if steps > MAX_STEPS {
        return Err(anyhow!("step count {steps} exceeds the limit of {MAX_STEPS}"));
    }
    Ok(steps)
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    let mut entries = cfg.iter().collect::<Vec<_>>();
    entries.sort();
    for (key, value) in entries {
        println!("{key}={value}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "usage: agenda [options] [FILTER...] [COMMAND [ARGS...]]\n\
         \n\
         commands:\n\
         \x20 show            render the saved view (default)\n\
         \x20 next [N]        move forward N periods\n\
         \x20 prev [N]        move back N periods\n\
         \x20 today           jump back to today\n\
         \x20 view MODE       switch to month, week, day or list\n\
         \x20 goto DATE       jump to a date (YYYY-MM-DD, DD/MM/YYYY, hoy, +1w, lunes)\n\
         \x20 list            show upcoming events without changing the view\n\
         \x20 reset           forget the saved view\n\
         \x20 _show           print effective configuration\n\
         \n\
         filters: client:NAME branch:NAME user:NAME kind:KIND"
    );
    Ok(())
}
