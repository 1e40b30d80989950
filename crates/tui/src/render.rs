use pgview_core::filter::FilterOperator;
use pgview_core::json_inspect::{JsonToken, JsonTokenKind};
use pgview_core::session::QueryMode;
use pgview_core::sorting::SortDirection;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use ratatui::Frame;

use crate::app::{
    FilterDialog, JsonContent, JsonView, Overlay, Pane, Picker, Prompt, TableSearch, TuiApp,
};

const MAX_CELL_WIDTH: usize = 40;

pub(crate) fn render(frame: &mut Frame<'_>, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(4),
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(28), Constraint::Min(40)])
        .split(chunks[1]);
    let sidebar = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(body[0]);
    let workspace = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(3),
            Constraint::Min(5),
        ])
        .split(body[1]);

    render_list(
        frame,
        sidebar[0],
        "Schemas",
        app.session.schemas(),
        app.session.schema(),
        app.schema_cursor,
        app.focus == Pane::Schemas,
    );
    render_list(
        frame,
        sidebar[1],
        "Tables",
        app.session.tables(),
        app.session.table(),
        app.table_cursor,
        app.focus == Pane::Tables,
    );
    render_editor(frame, app, workspace[0]);
    render_chip_bar(frame, app, workspace[1]);
    render_results(frame, app, workspace[2]);
    render_footer(frame, app, chunks[2]);

    match &app.overlay {
        Some(Overlay::Help) => render_help_popup(frame),
        Some(Overlay::FilterDialog(dialog)) => render_filter_dialog(frame, dialog),
        Some(Overlay::Prompt(prompt)) => render_prompt(frame, prompt),
        Some(Overlay::Picker(picker)) => render_picker(frame, picker),
        Some(Overlay::Search(search)) => render_search(frame, search),
        Some(Overlay::Json(view)) => render_json(frame, view),
        None => {}
    }
}

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title)
}

fn render_header(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let history = app.session.history();
    let position = history
        .cursor()
        .map_or_else(|| "-".to_string(), |cursor| format!("{}/{}", cursor + 1, history.len()));
    let mode = match app.session.mode() {
        QueryMode::Generated => "generated",
        QueryMode::Manual => "manual",
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {} ", app.profile_label),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::raw(format!("Schema: {}", app.session.schema_label())),
        Span::raw(" | "),
        Span::raw(format!("Table: {}", app.session.table_label())),
        Span::raw(" | "),
        Span::raw(format!("Limit: {}", app.session.row_limit())),
        Span::raw(" | "),
        Span::raw(format!("Mode: {mode}")),
        Span::raw(" | "),
        Span::raw(format!("History: {position}")),
    ]))
    .block(Block::default().borders(Borders::ALL).title("pgview"));
    frame.render_widget(header, area);
}

fn render_list(
    frame: &mut Frame<'_>,
    area: Rect,
    title: &str,
    items: &[String],
    selected: Option<&str>,
    cursor: usize,
    focused: bool,
) {
    let visible = usize::from(area.height.saturating_sub(2)).max(1);
    let window_start = cursor.saturating_sub(visible.saturating_sub(1));
    let lines = items
        .iter()
        .enumerate()
        .skip(window_start)
        .take(visible)
        .map(|(index, item)| {
            let marker = if index == cursor && focused { ">" } else { " " };
            let style = if selected == Some(item.as_str()) {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(Span::styled(format!("{marker} {item}"), style))
        })
        .collect::<Vec<_>>();

    frame.render_widget(Paragraph::new(lines).block(pane_block(title, focused)), area);
}

fn render_editor(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let focused = app.focus == Pane::Editor;
    let title = if app.session.is_query_edited() {
        "Query (modified, Ctrl+R to run)"
    } else {
        "Query"
    };
    let mut text = app.session.query_display().to_string();
    if focused {
        text.push('_');
    }
    let editor = Paragraph::new(text)
        .block(pane_block(title, focused))
        .wrap(Wrap { trim: false });
    frame.render_widget(editor, area);
}

fn render_chip_bar(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let mut spans = Vec::new();
    for (index, filter) in app.session.filters().iter().enumerate() {
        let mut style = if filter.is_active() {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::CROSSED_OUT)
        };
        if index == app.filter_cursor {
            style = style.add_modifier(Modifier::REVERSED);
        }
        spans.push(Span::styled(format!("[{}]", filter.short_label()), style));
        spans.push(Span::raw(" "));
    }
    for (index, criterion) in app.session.sorting().iter().enumerate() {
        spans.push(Span::styled(
            format!(
                "{}. {} {}",
                index + 1,
                criterion.column,
                criterion.direction.as_sql()
            ),
            Style::default().fg(Color::Magenta),
        ));
        spans.push(Span::raw(" "));
    }
    if spans.is_empty() {
        spans.push(Span::styled(
            "No filters or sorting",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let bar = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Filters & Sorting"));
    frame.render_widget(bar, area);
}

fn render_results(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let focused = app.focus == Pane::Results;
    let grid = app.session.results();
    let block = pane_block("Results", focused);
    if grid.columns().is_empty() {
        let empty = Paragraph::new("No results loaded").block(block);
        frame.render_widget(empty, area);
        return;
    }

    let sort_marker = |column: &str| {
        app.session
            .sorting()
            .iter()
            .enumerate()
            .find(|(_, criterion)| criterion.column == column)
            .map(|(index, criterion)| {
                let arrow = match criterion.direction {
                    SortDirection::Asc => "^",
                    SortDirection::Desc => "v",
                };
                format!(" {arrow}{}", index + 1)
            })
            .unwrap_or_default()
    };

    let header = Row::new(grid.columns().iter().map(|column| {
        Cell::from(format!("{column}{}", sort_marker(column)))
            .style(Style::default().add_modifier(Modifier::BOLD))
    }));

    let visible = usize::from(area.height.saturating_sub(3)).max(1);
    let window_start = app.result_row.saturating_sub(visible.saturating_sub(1));
    let rows = grid
        .rows()
        .iter()
        .enumerate()
        .skip(window_start)
        .take(visible)
        .map(|(row_index, row)| {
            Row::new(row.iter().enumerate().map(|(column_index, value)| {
                let mut style = Style::default();
                if value == "NULL" {
                    style = style.fg(Color::DarkGray);
                }
                if focused && row_index == app.result_row && column_index == app.result_col {
                    style = style.add_modifier(Modifier::REVERSED);
                } else if row_index == app.result_row {
                    style = style.add_modifier(Modifier::BOLD);
                }
                Cell::from(truncate(value, MAX_CELL_WIDTH)).style(style)
            }))
        });

    let widths = column_widths(grid.columns(), grid.rows());
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .column_spacing(1);
    frame.render_widget(table, area);
}

fn column_widths(columns: &[String], rows: &[Vec<String>]) -> Vec<Constraint> {
    columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let widest = rows
                .iter()
                .filter_map(|row| row.get(index))
                .map(|value| value.chars().count())
                .chain(std::iter::once(column.chars().count() + 3))
                .max()
                .unwrap_or_default()
                .min(MAX_CELL_WIDTH);
            Constraint::Length(u16::try_from(widest).unwrap_or(u16::MAX))
        })
        .collect()
}

fn truncate(value: &str, max_chars: usize) -> String {
    let single_line = value.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let mut truncated = single_line
        .chars()
        .take(max_chars.saturating_sub(3))
        .collect::<String>();
    truncated.push_str("...");
    truncated
}

fn render_footer(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let affordances = app.session.affordances();
    let hint = |enabled: bool, text: &'static str| {
        let style = if enabled {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Span::styled(text, style)
    };

    let hints = Line::from(vec![
        hint(affordances.can_go_back, "[ back  "),
        hint(affordances.can_go_forward, "] forward  "),
        hint(affordances.can_count, "c count  "),
        hint(affordances.can_run_manual, "^R run query  "),
        hint(affordances.can_export, "E export  "),
        hint(affordances.can_copy_results, "P copy results  "),
        Span::raw("f filter  s sort  / search  ? help  q quit"),
    ]);
    let footer = Paragraph::new(vec![
        hints,
        Line::from(format!("Status: {}", app.session.status())),
    ])
    .block(Block::default().borders(Borders::ALL).title("Keys"));
    frame.render_widget(footer, area);
}

fn render_help_popup(frame: &mut Frame<'_>) {
    let area = centered_rect(70, 80, frame.area());
    frame.render_widget(Clear, area);
    let help = Paragraph::new(vec![
        Line::from("Global keymap"),
        Line::from("q / Ctrl+C: quit    ?: toggle help    Tab: cycle panes"),
        Line::from("Arrows or hjkl: navigate    Enter: select / open filter dialog"),
        Line::from("i: edit query    Ctrl+R: run query as custom SQL    Esc: leave editor"),
        Line::from("[ / ]: history back / forward    r: refresh    c: count rows"),
        Line::from("f: filter on cell    e: edit filter    t: toggle filter    d: delete filter"),
        Line::from(", / .: previous / next filter    x: clear filters"),
        Line::from("s: sort column    S: remove sort    X: clear sorting    L: row limit"),
        Line::from("/: search tables    w: save query    o: load query"),
        Line::from("E: export CSV    Ctrl+E: export JSON"),
        Line::from("y: copy cell    Y: copy column    p: copy query    P: copy query and results"),
        Line::from("J: inspect cell JSON    T: format JSON"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(help, area);
}

fn render_filter_dialog(frame: &mut Frame<'_>, dialog: &FilterDialog) {
    let area = centered_rect(60, 70, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(format!("Column: {}", dialog.column)),
        Line::from(format!("Value: {}_", dialog.value)),
        Line::from(format!(
            "Treat as text: {}  (Tab to toggle)",
            if dialog.force_string { "yes" } else { "no" }
        )),
        Line::from(""),
    ];
    let selected = dialog.operator();
    for operator in FilterOperator::ALL {
        let marker = if operator == selected { ">" } else { " " };
        lines.push(Line::from(format!(
            "{marker} {:<10} {}",
            operator.as_sql(),
            operator.description()
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from("Up/Down: operator  Enter: apply  Esc: cancel"));

    let title = if dialog.editing.is_some() {
        "Edit filter"
    } else {
        "Add filter"
    };
    let popup = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(popup, area);
}

fn render_prompt(frame: &mut Frame<'_>, prompt: &Prompt) {
    let area = centered_rect(60, 20, frame.area());
    frame.render_widget(Clear, area);
    let popup = Paragraph::new(vec![
        Line::from(format!("{}_", prompt.input)),
        Line::from(""),
        Line::from("Enter: confirm  Esc: cancel"),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(prompt.kind.title()),
    )
    .wrap(Wrap { trim: false });
    frame.render_widget(popup, area);
}

fn render_picker(frame: &mut Frame<'_>, picker: &Picker) {
    let area = centered_rect(60, 60, frame.area());
    frame.render_widget(Clear, area);
    let lines = picker
        .names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let marker = if index == picker.cursor { ">" } else { " " };
            Line::from(format!("{marker} {name}"))
        })
        .collect::<Vec<_>>();
    let popup = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Load saved query"),
    );
    frame.render_widget(popup, area);
}

fn render_search(frame: &mut Frame<'_>, search: &TableSearch) {
    let area = centered_rect(60, 60, frame.area());
    frame.render_widget(Clear, area);
    let mut lines = vec![Line::from(format!("Search: {}_", search.input)), Line::from("")];
    if search.matches.is_empty() && !search.input.is_empty() {
        lines.push(Line::from("No matching tables"));
    }
    for (index, table) in search.matches.iter().enumerate() {
        let marker = if index == search.cursor { ">" } else { " " };
        lines.push(Line::from(format!("{marker} {table}")));
    }
    let popup = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Find table"),
    );
    frame.render_widget(popup, area);
}

fn render_json(frame: &mut Frame<'_>, view: &JsonView) {
    let area = centered_rect(80, 80, frame.area());
    frame.render_widget(Clear, area);
    let lines = match &view.content {
        JsonContent::Document(document) => document
            .lines()
            .into_iter()
            .map(|tokens| Line::from(tokens.into_iter().map(token_span).collect::<Vec<_>>()))
            .collect::<Vec<_>>(),
        JsonContent::Invalid(message) => vec![Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        ))],
    };
    let popup = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(view.title.as_str()),
        )
        .scroll((view.scroll, 0));
    frame.render_widget(popup, area);
}

fn token_span(token: JsonToken) -> Span<'static> {
    let style = match token.kind {
        JsonTokenKind::Key => Style::default().fg(Color::Blue),
        JsonTokenKind::String => Style::default().fg(Color::Green),
        JsonTokenKind::Number => Style::default().fg(Color::LightRed),
        JsonTokenKind::Boolean | JsonTokenKind::Null => Style::default().fg(Color::Magenta),
        JsonTokenKind::Punctuation => Style::default(),
    };
    Span::styled(token.text, style)
}

fn centered_rect(width_percent: u16, height_percent: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100_u16 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100_u16 - height_percent) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100_u16 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100_u16 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use pgview_core::saved_queries::SavedQueryStore;
    use pgview_core::session::SessionController;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use tempfile::TempDir;

    use super::{render, truncate};
    use crate::app::{Msg, TuiApp};

    #[test]
    fn truncate_marks_long_values() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a\nb", 10), "a b");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn renders_every_overlay_without_panicking() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = TuiApp::new(
            SessionController::new(),
            SavedQueryStore::new(temp_dir.path()),
            temp_dir.path().to_path_buf(),
            "demo",
        );
        let mut terminal =
            Terminal::new(TestBackend::new(120, 40)).expect("failed to create test terminal");

        terminal
            .draw(|frame| render(frame, &app))
            .expect("render failed");
        for open in [Msg::ToggleHelp, Msg::EditRowLimit, Msg::Search, Msg::JsonTools] {
            app.handle(open);
            terminal
                .draw(|frame| render(frame, &app))
                .expect("render failed");
            app.handle(Msg::Cancel);
        }

        let buffer = terminal.backend().buffer().clone();
        let text = buffer
            .content()
            .iter()
            .map(ratatui::buffer::Cell::symbol)
            .collect::<String>();
        assert!(text.contains("No results loaded"));
        assert!(text.contains("No filters or sorting"));
    }
}
