use anyhow::{bail, Result};
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::time::Duration;

use crate::collection::ApplicationCollection;
use crate::db::{Database, SnapshotFeed};
use crate::filter::ApplicationFilters;
use crate::format::{
    format_currency, format_date, format_rate, format_relative_time, interview_rate, truncate,
};
use crate::models::{ApplicationPatch, ApplicationRecord, ApplicationStatus};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

struct BrowseState {
    collection: ApplicationCollection,
    feed: SnapshotFeed,
    selected: usize,
    scroll_offset: u16,
    searching: bool,
    status_filter: Option<ApplicationStatus>,
}

impl BrowseState {
    fn current(&self) -> Option<&ApplicationRecord> {
        self.collection.filtered().get(self.selected)
    }

    fn clamp_selection(&mut self) {
        let len = self.collection.filtered().len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    fn next(&mut self) {
        let len = self.collection.filtered().len();
        if len > 0 && self.selected < len - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    fn edit_search(&mut self, edit: impl FnOnce(&mut String)) {
        let mut filters = self.collection.filters().clone();
        let mut term = filters.search_term.take().unwrap_or_default();
        edit(&mut term);
        filters.search_term = if term.is_empty() { None } else { Some(term) };
        self.collection.set_filters(filters);
        self.clamp_selection();
    }

    /// None -> Applied -> Phone Call -> ... -> Ghosted -> None
    fn cycle_status_filter(&mut self) {
        self.status_filter = match self.status_filter {
            None => Some(ApplicationStatus::ALL[0]),
            Some(current) => ApplicationStatus::ALL
                .iter()
                .position(|s| *s == current)
                .and_then(|i| ApplicationStatus::ALL.get(i + 1).copied()),
        };
        let mut filters = self.collection.filters().clone();
        filters.status = self.status_filter.map(|s| vec![s]);
        self.collection.set_filters(filters);
        self.clamp_selection();
    }

    fn clear_filters(&mut self) {
        self.status_filter = None;
        self.collection.set_filters(ApplicationFilters::default());
        self.clamp_selection();
    }

    fn set_status(&mut self, db: &Database, status: ApplicationStatus) {
        let Some(id) = self.current().map(|r| r.id.clone()) else { return };
        // failure text lands in collection.error() and is shown in the footer
        let _ = self.collection.update(db, &id, &ApplicationPatch::status(status));
        self.clamp_selection();
    }
}

/// Whether the first load produced anything to browse. A failed load is an error.
fn has_applications(collection: &ApplicationCollection) -> Result<bool> {
    if let Some(err) = collection.error() {
        bail!("Failed to load applications: {}", err);
    }
    Ok(!collection.applications().is_empty())
}

pub fn run_browse(db: &Database, collection: ApplicationCollection, feed: SnapshotFeed) -> Result<()> {
    let mut state = BrowseState {
        collection,
        feed,
        selected: 0,
        scroll_offset: 0,
        searching: false,
        status_filter: None,
    };
    state.collection.sync(&mut state.feed, db);
    if !has_applications(&state.collection)? {
        println!("No applications found.");
        return Ok(());
    }

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, db);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut BrowseState,
    db: &Database,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if !event::poll(POLL_INTERVAL)? {
            if state.collection.sync(&mut state.feed, db) {
                state.clamp_selection();
                list_state.select(Some(state.selected));
            }
            continue;
        }

        let Event::Key(key) = event::read()? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if state.searching {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => state.searching = false,
                KeyCode::Backspace => state.edit_search(|t| {
                    t.pop();
                }),
                KeyCode::Char(c) => state.edit_search(|t| t.push(c)),
                _ => {}
            }
            list_state.select(Some(state.selected));
            continue;
        }

        let prev_selected = state.selected;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Down | KeyCode::Char('j') => state.next(),
            KeyCode::Up | KeyCode::Char('k') => state.prev(),
            KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
            KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
            KeyCode::Char('/') => state.searching = true,
            KeyCode::Char('f') => state.cycle_status_filter(),
            KeyCode::Char('c') => state.clear_filters(),
            KeyCode::Char('s') => {
                let (field, direction) = state.collection.sort();
                state.collection.set_sort(field.cycle(), direction);
            }
            KeyCode::Char('d') => {
                let (field, direction) = state.collection.sort();
                state.collection.set_sort(field, direction.toggle());
            }
            KeyCode::Char('r') => {
                state.feed.invalidate();
                state.collection.sync(&mut state.feed, db);
                state.clamp_selection();
            }
            KeyCode::Char(c @ '0'..='9') => {
                // 1..9 pick the first nine statuses, 0 is Ghosted
                let idx = if c == '0' { 9 } else { c as usize - '1' as usize };
                state.set_status(db, ApplicationStatus::ALL[idx]);
            }
            _ => {}
        }
        if state.selected != prev_selected || list_state.selected() != Some(state.selected) {
            list_state.select(Some(state.selected));
        }
    }
    Ok(())
}

fn status_style(status: ApplicationStatus) -> Style {
    let color = match status {
        s if s.is_rejection() => Color::Red,
        ApplicationStatus::Applied => Color::Blue,
        ApplicationStatus::PhoneCall => Color::Cyan,
        ApplicationStatus::FirstInterview | ApplicationStatus::SecondInterview => Color::Magenta,
        ApplicationStatus::Offer => Color::Green,
        _ => Color::DarkGray,
    };
    Style::default().fg(color)
}

fn status_icon(status: ApplicationStatus) -> &'static str {
    match status {
        s if s.is_rejection() => "x",
        ApplicationStatus::Applied => " ",
        ApplicationStatus::PhoneCall => "~",
        ApplicationStatus::FirstInterview | ApplicationStatus::SecondInterview => "*",
        ApplicationStatus::Offer => "$",
        _ => "-",
    }
}

fn draw(frame: &mut Frame, state: &BrowseState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[0]);

    // Left panel: application list
    let items: Vec<ListItem> = state
        .collection
        .filtered()
        .iter()
        .map(|app| {
            ListItem::new(Line::from(vec![
                Span::styled(status_icon(app.status), status_style(app.status)),
                Span::raw(format!(
                    " {} | {} | {}",
                    truncate(&app.title, 28),
                    truncate(&app.company, 18),
                    app.date_applied
                )),
            ]))
        })
        .collect();

    let (field, direction) = state.collection.sort();
    let title = if state.collection.is_loading() {
        " Applications (loading...) ".to_string()
    } else {
        format!(
            " Applications ({}/{}) sort:{} {} ",
            state.collection.filtered().len(),
            state.collection.applications().len(),
            field,
            direction
        )
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: application detail
    let detail = build_detail(state);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    // Footer: search prompt, error, or help
    let footer = if state.searching {
        Paragraph::new(format!(
            " search: {}_",
            state.collection.filters().search_term.as_deref().unwrap_or("")
        ))
        .style(Style::default().fg(Color::Yellow))
    } else if let Some(err) = state.collection.error() {
        Paragraph::new(format!(" {}", err)).style(Style::default().fg(Color::Red))
    } else {
        let stats = state.collection.stats();
        Paragraph::new(format!(
            " j/k:move /:search f:status c:clear s:sort d:dir 1-9,0:set status r:reload q:quit | resp {} int {} offer {}",
            format_rate(stats.response_rate),
            format_rate(interview_rate(&stats)),
            format_rate(stats.offer_rate)
        ))
        .style(Style::default().fg(Color::DarkGray))
    };
    frame.render_widget(footer, rows[1]);
}

fn build_detail(state: &BrowseState) -> Text<'_> {
    let Some(app) = state.current() else {
        return Text::raw("No application selected");
    };

    let mut lines: Vec<Line> = Vec::new();
    let bold = Style::default().add_modifier(Modifier::BOLD);

    lines.push(Line::from(Span::styled(app.title.as_str(), bold)));
    lines.push(Line::from(format!("at {}", app.company)));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", app.status),
        status_style(app.status),
    )));
    lines.push(Line::from(format!("Applied: {}", format_date(app.date_applied))));
    lines.push(Line::from(format!(
        "Updated: {}",
        format_relative_time(app.updated_at, Utc::now())
    )));

    if let Some(link) = &app.job_link {
        lines.push(Line::from(format!("Link: {}", link)));
    }
    if let Some(salary) = &app.salary {
        let shown = format_currency(salary).unwrap_or_else(|| salary.clone());
        lines.push(Line::from(format!("Salary: {} ({})", shown, app.salary_type)));
    }

    for (label, body) in [
        ("Benefits", &app.benefits),
        ("Notes", &app.notes),
        ("Selection Criteria", &app.selection_criteria),
    ] {
        let Some(body) = body else { continue };
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(label, bold)));
        for line in textwrap::fill(body, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
    }

    lines.push(Line::from(""));
    if app.interview_notes.is_empty() {
        lines.push(Line::from(Span::styled(
            "(No interview notes)",
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            format!("Interviews ({})", app.interview_notes.len()),
            bold,
        )));
        let mut notes: Vec<_> = app.interview_notes.iter().collect();
        notes.sort_by_key(|n| n.date);
        for note in notes {
            lines.push(Line::from(Span::styled(
                format!("  {} - {}", format_date(note.date), note.note_type),
                Style::default().fg(Color::Cyan),
            )));
            if let Some(who) = &note.interviewers {
                lines.push(Line::from(format!("    with {}", who)));
            }
            for line in textwrap::fill(&note.notes, 66).lines() {
                lines.push(Line::from(format!("    {}", line)));
            }
            if let Some(next) = &note.next_steps {
                lines.push(Line::from(format!("    next: {}", next)));
            }
        }
    }

    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{identity, record};

    #[test]
    fn failed_first_load_is_reported() {
        let mut collection = ApplicationCollection::new(Some(&identity("u1")));
        collection.apply_subscription_error("disk I/O error");
        let err = has_applications(&collection).unwrap_err();
        assert_eq!(err.to_string(), "Failed to load applications: disk I/O error");
    }

    #[test]
    fn empty_and_loaded_collections() {
        let mut collection = ApplicationCollection::new(Some(&identity("u1")));
        collection.apply_snapshot(Vec::new());
        assert!(!has_applications(&collection).unwrap());
        collection.apply_snapshot(vec![record("a", "Engineer", "Acme", ApplicationStatus::Applied)]);
        assert!(has_applications(&collection).unwrap());
    }
}
