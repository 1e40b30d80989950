use std::fmt;
use std::path::PathBuf;

use arboard::Clipboard;
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use pgview_adapters::export::{export_rows_to_csv, export_rows_to_json};
use pgview_core::catalog::TableRef;
use pgview_core::filter::{FilterId, FilterOperator};
use pgview_core::json_inspect::{pretty_print, CellInspection, HighlightedJson};
use pgview_core::saved_queries::{default_file_name, SavedQueryStore};
use pgview_core::session::{Command, FilterDraft, SessionController, SessionError};
use tracing::{debug, error, info};

use crate::worker::WorkerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pane {
    Schemas,
    Tables,
    Results,
    Editor,
}

impl Pane {
    fn next(self) -> Self {
        match self {
            Self::Schemas => Self::Tables,
            Self::Tables => Self::Results,
            Self::Results => Self::Editor,
            Self::Editor => Self::Schemas,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirectionKey {
    Up,
    Down,
    Left,
    Right,
}

/// Whether printable keys are commands or text for the focused input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputMode {
    Normal,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Msg {
    Quit,
    ToggleHelp,
    NextPane,
    FocusEditor,
    Navigate(DirectionKey),
    Submit,
    Cancel,
    Input(char),
    Backspace,
    Back,
    Forward,
    Refresh,
    Count,
    AddFilter,
    EditFilter,
    ToggleFilter,
    RemoveFilter,
    NextFilter,
    PreviousFilter,
    ClearFilters,
    ToggleSort,
    RemoveSort,
    ClearSorting,
    EditRowLimit,
    Search,
    SaveSnapshot,
    LoadSnapshot,
    ExportCsv,
    ExportJson,
    CopyCell,
    CopyColumn,
    CopyQuery,
    CopyQueryAndResults,
    InspectJson,
    JsonTools,
    RunManualQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FilterDialog {
    pub(crate) column: String,
    pub(crate) editing: Option<FilterId>,
    pub(crate) operator_index: usize,
    pub(crate) value: String,
    pub(crate) force_string: bool,
}

impl FilterDialog {
    pub(crate) fn operator(&self) -> FilterOperator {
        FilterOperator::ALL[self.operator_index % FilterOperator::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PromptKind {
    RowLimit,
    SaveSnapshot,
    ExportCsv,
    ExportJson,
    JsonInput,
}

impl PromptKind {
    pub(crate) fn title(self) -> &'static str {
        match self {
            Self::RowLimit => "Row limit",
            Self::SaveSnapshot => "Save query as",
            Self::ExportCsv => "Export CSV to",
            Self::ExportJson => "Export JSON to",
            Self::JsonInput => "JSON to format",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Prompt {
    pub(crate) kind: PromptKind,
    pub(crate) input: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Picker {
    pub(crate) names: Vec<String>,
    pub(crate) cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableSearch {
    pub(crate) input: String,
    pub(crate) matches: Vec<TableRef>,
    pub(crate) cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JsonContent {
    Document(HighlightedJson),
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JsonView {
    pub(crate) title: String,
    pub(crate) content: JsonContent,
    pub(crate) scroll: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Overlay {
    Help,
    FilterDialog(FilterDialog),
    Prompt(Prompt),
    Picker(Picker),
    Search(TableSearch),
    Json(JsonView),
}

/// Lazily opened system clipboard, kept alive so X11 selections survive.
#[derive(Default)]
struct ClipboardSlot(Option<Clipboard>);

impl fmt::Debug for ClipboardSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClipboardSlot")
            .field(&self.0.is_some())
            .finish()
    }
}

impl ClipboardSlot {
    fn set_text(&mut self, text: String) -> Result<(), arboard::Error> {
        let clipboard = match self.0.take() {
            Some(clipboard) => clipboard,
            None => Clipboard::new()?,
        };
        self.0.insert(clipboard).set_text(text)
    }
}

#[derive(Debug)]
pub(crate) struct TuiApp {
    pub(crate) session: SessionController,
    pub(crate) profile_label: String,
    pub(crate) focus: Pane,
    pub(crate) overlay: Option<Overlay>,
    pub(crate) schema_cursor: usize,
    pub(crate) table_cursor: usize,
    pub(crate) result_row: usize,
    pub(crate) result_col: usize,
    pub(crate) filter_cursor: usize,
    saved_queries: SavedQueryStore,
    export_dir: PathBuf,
    clipboard: ClipboardSlot,
    should_quit: bool,
}

impl TuiApp {
    pub(crate) fn new(
        session: SessionController,
        saved_queries: SavedQueryStore,
        export_dir: PathBuf,
        profile_label: impl Into<String>,
    ) -> Self {
        Self {
            session,
            profile_label: profile_label.into(),
            focus: Pane::Tables,
            overlay: None,
            schema_cursor: 0,
            table_cursor: 0,
            result_row: 0,
            result_col: 0,
            filter_cursor: 0,
            saved_queries,
            export_dir,
            clipboard: ClipboardSlot::default(),
            should_quit: false,
        }
    }

    pub(crate) fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub(crate) fn take_commands(&mut self) -> Vec<Command> {
        self.session.drain_commands()
    }

    pub(crate) fn input_mode(&self) -> InputMode {
        match &self.overlay {
            Some(Overlay::FilterDialog(_) | Overlay::Prompt(_) | Overlay::Search(_)) => {
                InputMode::Text
            }
            Some(_) => InputMode::Normal,
            None if self.focus == Pane::Editor => InputMode::Text,
            None => InputMode::Normal,
        }
    }

    pub(crate) fn apply_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Query(response) => {
                if self.session.apply_query_response(response) {
                    self.result_row = 0;
                    self.result_col = self.result_col.min(
                        self.session.results().columns().len().saturating_sub(1),
                    );
                }
            }
            WorkerEvent::Schemas(schemas) => self.session.apply_schemas(schemas),
            WorkerEvent::Tables {
                schema,
                tables,
                auto_select,
            } => self.session.apply_tables(&schema, tables, auto_select),
            WorkerEvent::AllTables(tables) => self.session.apply_all_tables(tables),
        }
        self.sync_cursors();
    }

    pub(crate) fn handle(&mut self, msg: Msg) {
        if msg == Msg::Quit {
            self.should_quit = true;
            return;
        }
        if self.overlay.is_some() {
            self.handle_overlay(msg);
            self.sync_cursors();
            return;
        }

        match msg {
            Msg::ToggleHelp => self.overlay = Some(Overlay::Help),
            Msg::NextPane => self.focus = self.focus.next(),
            Msg::FocusEditor => self.focus = Pane::Editor,
            Msg::Navigate(direction) => self.navigate(direction),
            Msg::Submit => self.submit(),
            Msg::Cancel => {
                if self.focus == Pane::Editor {
                    self.focus = Pane::Results;
                }
            }
            Msg::Input(character) => self.edit_query(|text| text.push(character)),
            Msg::Backspace => self.edit_query(|text| {
                text.pop();
            }),
            Msg::Back => {
                if !self.session.go_back() {
                    self.session.set_status("Already at the oldest history entry.");
                }
            }
            Msg::Forward => {
                if !self.session.go_forward() {
                    self.session.set_status("Already at the newest history entry.");
                }
            }
            Msg::Refresh => settle(self.session.refresh()),
            Msg::Count => settle(self.session.request_count()),
            Msg::AddFilter => self.open_filter_dialog_from_cell(),
            Msg::EditFilter => self.open_filter_dialog_for_selected(),
            Msg::ToggleFilter => {
                if let Some(id) = self.selected_filter_id() {
                    settle(self.session.toggle_filter(id));
                }
            }
            Msg::RemoveFilter => {
                if let Some(id) = self.selected_filter_id() {
                    settle(self.session.remove_filter(id));
                }
            }
            Msg::NextFilter => {
                let count = self.session.filters().len();
                if count > 0 {
                    self.filter_cursor = (self.filter_cursor + 1) % count;
                }
            }
            Msg::PreviousFilter => {
                let count = self.session.filters().len();
                if count > 0 {
                    self.filter_cursor = (self.filter_cursor + count - 1) % count;
                }
            }
            Msg::ClearFilters => settle(self.session.clear_filters()),
            Msg::ToggleSort => {
                if let Some(column) = self.selected_column_name() {
                    settle(self.session.toggle_sort(&column));
                }
            }
            Msg::RemoveSort => {
                if let Some(column) = self.selected_column_name() {
                    settle(self.session.remove_sort(&column));
                }
            }
            Msg::ClearSorting => settle(self.session.clear_sorting()),
            Msg::EditRowLimit => {
                let input = self.session.row_limit().to_string();
                self.open_prompt(PromptKind::RowLimit, input);
            }
            Msg::Search => {
                self.overlay = Some(Overlay::Search(TableSearch {
                    input: String::new(),
                    matches: Vec::new(),
                    cursor: 0,
                }));
            }
            Msg::SaveSnapshot => {
                let name = default_file_name(&self.session.snapshot(), Local::now().naive_local());
                self.open_prompt(PromptKind::SaveSnapshot, name);
            }
            Msg::LoadSnapshot => self.open_snapshot_picker(),
            Msg::ExportCsv => {
                if self.session.export_grid().is_ok() {
                    let name = self.session.csv_export_name(Local::now().naive_local());
                    self.open_prompt(PromptKind::ExportCsv, name);
                }
            }
            Msg::ExportJson => {
                if self.session.export_grid().is_ok() {
                    let name = self.session.csv_export_name(Local::now().naive_local());
                    let name = name.strip_suffix(".csv").unwrap_or(&name).to_string();
                    self.open_prompt(PromptKind::ExportJson, format!("{name}.json"));
                }
            }
            Msg::CopyCell => {
                if let Ok((text, status)) = self.session.copy_cell(self.result_row, self.result_col)
                {
                    self.copy_to_clipboard(text, status);
                }
            }
            Msg::CopyColumn => {
                if let Ok((text, status)) = self.session.copy_column(self.result_col) {
                    self.copy_to_clipboard(text, status);
                }
            }
            Msg::CopyQuery => {
                if let Ok(text) = self.session.copy_query_text() {
                    self.copy_to_clipboard(text, "Query copied to clipboard.".to_string());
                }
            }
            Msg::CopyQueryAndResults => {
                if let Ok(text) = self.session.copy_query_and_results() {
                    let status = format!(
                        "Copied query and {} rows to clipboard.",
                        self.session.results().row_count()
                    );
                    self.copy_to_clipboard(text, status);
                }
            }
            Msg::InspectJson => {
                let inspection = self.session.inspect_cell(self.result_row, self.result_col);
                if let CellInspection::Document(document) = inspection {
                    self.overlay = Some(Overlay::Json(JsonView {
                        title: "Cell JSON".to_string(),
                        content: JsonContent::Document(document),
                        scroll: 0,
                    }));
                }
            }
            Msg::JsonTools => self.open_prompt(PromptKind::JsonInput, String::new()),
            Msg::RunManualQuery => {
                if self.session.run_manual_query().is_ok() {
                    self.focus = Pane::Results;
                }
            }
            Msg::Quit => {}
        }
        self.sync_cursors();
    }

    fn submit(&mut self) {
        match self.focus {
            Pane::Schemas => {
                if let Some(schema) = self.session.schemas().get(self.schema_cursor).cloned() {
                    self.session.select_schema(&schema);
                }
            }
            Pane::Tables => {
                if let Some(table) = self.session.tables().get(self.table_cursor).cloned() {
                    settle(self.session.select_table(&table));
                }
            }
            Pane::Results => self.open_filter_dialog_from_cell(),
            Pane::Editor => self.edit_query(|text| text.push('\n')),
        }
    }

    fn navigate(&mut self, direction: DirectionKey) {
        match self.focus {
            Pane::Schemas => {
                self.schema_cursor = step(self.schema_cursor, direction, self.session.schemas().len());
            }
            Pane::Tables => {
                self.table_cursor = step(self.table_cursor, direction, self.session.tables().len());
            }
            Pane::Results => match direction {
                DirectionKey::Up | DirectionKey::Down => {
                    self.result_row =
                        step(self.result_row, direction, self.session.results().row_count());
                }
                DirectionKey::Left | DirectionKey::Right => {
                    let columns = self.session.results().columns().len();
                    self.result_col = step(self.result_col, direction, columns);
                }
            },
            Pane::Editor => {}
        }
    }

    fn edit_query(&mut self, edit: impl FnOnce(&mut String)) {
        if self.focus != Pane::Editor {
            return;
        }
        let mut text = self.session.query_text().to_string();
        edit(&mut text);
        self.session.edit_query_text(text);
    }

    fn handle_overlay(&mut self, msg: Msg) {
        let Some(overlay) = self.overlay.take() else {
            return;
        };
        self.overlay = match overlay {
            Overlay::Help => match msg {
                Msg::ToggleHelp | Msg::Cancel | Msg::Submit => None,
                _ => Some(Overlay::Help),
            },
            Overlay::Json(view) => scroll_json_view(view, msg),
            Overlay::Picker(picker) => self.handle_picker(picker, msg),
            Overlay::Search(search) => self.handle_search(search, msg),
            Overlay::Prompt(prompt) => self.handle_prompt(prompt, msg),
            Overlay::FilterDialog(dialog) => self.handle_filter_dialog(dialog, msg),
        };
    }

    fn handle_picker(&mut self, mut picker: Picker, msg: Msg) -> Option<Overlay> {
        match msg {
            Msg::Cancel => return None,
            Msg::Navigate(direction) => {
                picker.cursor = step(picker.cursor, direction, picker.names.len());
            }
            Msg::Submit => {
                if let Some(name) = picker.names.get(picker.cursor) {
                    self.load_snapshot(name);
                }
                return None;
            }
            _ => {}
        }
        Some(Overlay::Picker(picker))
    }

    fn handle_search(&mut self, mut search: TableSearch, msg: Msg) -> Option<Overlay> {
        match msg {
            Msg::Cancel => return None,
            Msg::Input(character) => {
                search.input.push(character);
                search.matches = self.session.search_tables(&search.input);
                search.cursor = 0;
            }
            Msg::Backspace => {
                search.input.pop();
                search.matches = self.session.search_tables(&search.input);
                search.cursor = 0;
            }
            Msg::Navigate(direction) => {
                search.cursor = step(search.cursor, direction, search.matches.len());
            }
            Msg::Submit => {
                if let Some(table) = search.matches.get(search.cursor) {
                    settle(self.session.select_qualified(&table.to_string()));
                    self.focus = Pane::Results;
                }
                return None;
            }
            _ => {}
        }
        Some(Overlay::Search(search))
    }

    fn handle_prompt(&mut self, mut prompt: Prompt, msg: Msg) -> Option<Overlay> {
        match msg {
            Msg::Cancel => return None,
            Msg::Input(character) => prompt.input.push(character),
            Msg::Backspace => {
                prompt.input.pop();
            }
            Msg::Submit => return self.submit_prompt(prompt),
            _ => {}
        }
        Some(Overlay::Prompt(prompt))
    }

    fn submit_prompt(&mut self, prompt: Prompt) -> Option<Overlay> {
        let input = prompt.input.trim();
        match prompt.kind {
            PromptKind::RowLimit => settle(self.session.set_row_limit(input)),
            PromptKind::SaveSnapshot => self.save_snapshot(input),
            PromptKind::ExportCsv | PromptKind::ExportJson => self.export(prompt.kind, input),
            PromptKind::JsonInput => {
                let content = match pretty_print(input) {
                    Ok(document) => JsonContent::Document(document),
                    Err(err) => JsonContent::Invalid(err.to_string()),
                };
                return Some(Overlay::Json(JsonView {
                    title: "JSON tools".to_string(),
                    content,
                    scroll: 0,
                }));
            }
        }
        None
    }

    fn handle_filter_dialog(&mut self, mut dialog: FilterDialog, msg: Msg) -> Option<Overlay> {
        let operator_count = FilterOperator::ALL.len();
        match msg {
            Msg::Cancel => return None,
            Msg::Input(character) => dialog.value.push(character),
            Msg::Backspace => {
                dialog.value.pop();
            }
            Msg::NextPane => dialog.force_string = !dialog.force_string,
            Msg::Navigate(DirectionKey::Up | DirectionKey::Left) => {
                dialog.operator_index = (dialog.operator_index + operator_count - 1) % operator_count;
            }
            Msg::Navigate(DirectionKey::Down | DirectionKey::Right) => {
                dialog.operator_index = (dialog.operator_index + 1) % operator_count;
            }
            Msg::Submit => {
                let draft = FilterDraft::new(dialog.operator(), dialog.value.clone())
                    .with_force_string(dialog.force_string);
                let applied = match dialog.editing {
                    Some(id) => self.session.edit_filter(id, draft),
                    None => self.session.add_filter(&dialog.column, draft).map(|_| ()),
                };
                if applied.is_ok() {
                    return None;
                }
            }
            _ => {}
        }
        Some(Overlay::FilterDialog(dialog))
    }

    fn open_prompt(&mut self, kind: PromptKind, input: String) {
        self.overlay = Some(Overlay::Prompt(Prompt { kind, input }));
    }

    fn open_filter_dialog_from_cell(&mut self) {
        let results = self.session.results();
        if !results.is_filterable_column(self.result_col) {
            self.session
                .set_status("Filters can only be created from a data column.");
            return;
        }
        let Some(column) = results.column_name(self.result_col).map(ToString::to_string) else {
            return;
        };
        let value = results
            .cell(self.result_row, self.result_col)
            .unwrap_or_default()
            .to_string();
        self.overlay = Some(Overlay::FilterDialog(FilterDialog {
            column,
            editing: None,
            operator_index: 0,
            value,
            force_string: false,
        }));
    }

    fn open_filter_dialog_for_selected(&mut self) {
        let Some(filter) = self.session.filters().get(self.filter_cursor) else {
            self.session.set_status("No filter selected.");
            return;
        };
        let operator_index = FilterOperator::ALL
            .iter()
            .position(|operator| *operator == filter.operator)
            .unwrap_or_default();
        self.overlay = Some(Overlay::FilterDialog(FilterDialog {
            column: filter.column.clone(),
            editing: Some(filter.id),
            operator_index,
            value: filter.value.clone().unwrap_or_default(),
            force_string: filter.force_string,
        }));
    }

    fn open_snapshot_picker(&mut self) {
        match self.saved_queries.list() {
            Ok(names) if names.is_empty() => {
                self.session.set_status(format!(
                    "No saved queries in {}.",
                    self.saved_queries.dir().display()
                ));
            }
            Ok(names) => self.overlay = Some(Overlay::Picker(Picker { names, cursor: 0 })),
            Err(err) => {
                error!(error = %err, "failed to list saved queries");
                self.session.set_status(format!("Failed to list saved queries: {err}"));
            }
        }
    }

    fn save_snapshot(&mut self, name: &str) {
        match self.saved_queries.save(name, &self.session.snapshot()) {
            Ok(path) => self
                .session
                .set_status(format!("Query configuration saved to {}.", path.display())),
            Err(err) => {
                error!(error = %err, "failed to save query configuration");
                self.session.set_status(format!("Failed to save query: {err}"));
            }
        }
    }

    fn load_snapshot(&mut self, name: &str) {
        match self.saved_queries.load(name) {
            Ok(state) => {
                info!(name, "loaded saved query");
                self.session.load_snapshot(state);
                self.session.set_status(format!("Loaded saved query '{name}'."));
            }
            Err(err) => {
                error!(error = %err, "failed to load saved query");
                self.session.set_status(format!("Failed to load query: {err}"));
            }
        }
    }

    fn export(&mut self, kind: PromptKind, name: &str) {
        if name.is_empty() {
            return;
        }
        let path = self.export_dir.join(name);
        let Ok(grid) = self.session.export_grid() else {
            return;
        };
        let written = if kind == PromptKind::ExportJson {
            export_rows_to_json(&path, grid.columns(), grid.rows())
        } else {
            export_rows_to_csv(&path, grid.columns(), grid.rows())
        };
        match written {
            Ok(rows) => self
                .session
                .set_status(format!("Exported {rows} rows to {}.", path.display())),
            Err(err) => {
                error!(error = %err, "export failed");
                self.session.set_status(format!("Export failed: {err}"));
            }
        }
    }

    fn copy_to_clipboard(&mut self, text: String, status: String) {
        match self.clipboard.set_text(text) {
            Ok(()) => self.session.set_status(status),
            Err(err) => {
                error!(error = %err, "clipboard write failed");
                self.session.set_status(format!("Clipboard unavailable: {err}"));
            }
        }
    }

    fn selected_filter_id(&mut self) -> Option<FilterId> {
        let id = self.session.filters().get(self.filter_cursor).map(|filter| filter.id);
        if id.is_none() {
            self.session.set_status("No filter selected.");
        }
        id
    }

    fn selected_column_name(&self) -> Option<String> {
        self.session
            .results()
            .column_name(self.result_col)
            .map(ToString::to_string)
    }

    /// Keeps list cursors on the controller's selection and inside current bounds.
    fn sync_cursors(&mut self) {
        if self.focus != Pane::Schemas {
            if let Some(index) = position_of(self.session.schemas(), self.session.schema()) {
                self.schema_cursor = index;
            }
        }
        if self.focus != Pane::Tables {
            if let Some(index) = position_of(self.session.tables(), self.session.table()) {
                self.table_cursor = index;
            }
        }
        self.schema_cursor = clamp(self.schema_cursor, self.session.schemas().len());
        self.table_cursor = clamp(self.table_cursor, self.session.tables().len());
        self.result_row = clamp(self.result_row, self.session.results().row_count());
        self.result_col = clamp(self.result_col, self.session.results().columns().len());
        self.filter_cursor = clamp(self.filter_cursor, self.session.filters().len());
    }
}

fn scroll_json_view(mut view: JsonView, msg: Msg) -> Option<Overlay> {
    match msg {
        Msg::Cancel | Msg::Submit | Msg::InspectJson => return None,
        Msg::Navigate(DirectionKey::Up) => view.scroll = view.scroll.saturating_sub(1),
        Msg::Navigate(DirectionKey::Down) => view.scroll = view.scroll.saturating_add(1),
        _ => {}
    }
    Some(Overlay::Json(view))
}

fn settle<T>(result: Result<T, SessionError>) {
    if let Err(err) = result {
        debug!(error = %err, "action rejected");
    }
}

fn position_of(items: &[String], selected: Option<&str>) -> Option<usize> {
    let selected = selected?;
    items.iter().position(|item| item == selected)
}

fn clamp(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}

fn step(index: usize, direction: DirectionKey, len: usize) -> usize {
    match direction {
        DirectionKey::Up | DirectionKey::Left => index.saturating_sub(1),
        DirectionKey::Down | DirectionKey::Right => clamp(index + 1, len),
    }
}

pub(crate) fn map_key_event(key: KeyEvent, mode: InputMode) -> Option<Msg> {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => return Some(Msg::Quit),
        (KeyModifiers::CONTROL, KeyCode::Char('r')) => return Some(Msg::RunManualQuery),
        (_, KeyCode::Tab) => return Some(Msg::NextPane),
        (_, KeyCode::Enter) => return Some(Msg::Submit),
        (_, KeyCode::Esc) => return Some(Msg::Cancel),
        (_, KeyCode::Backspace) => return Some(Msg::Backspace),
        (_, KeyCode::Up) => return Some(Msg::Navigate(DirectionKey::Up)),
        (_, KeyCode::Down) => return Some(Msg::Navigate(DirectionKey::Down)),
        (_, KeyCode::Left) => return Some(Msg::Navigate(DirectionKey::Left)),
        (_, KeyCode::Right) => return Some(Msg::Navigate(DirectionKey::Right)),
        _ => {}
    }

    if mode == InputMode::Text {
        return match (key.modifiers, key.code) {
            (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(character)) => {
                Some(Msg::Input(character))
            }
            _ => None,
        };
    }

    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('e')) => Some(Msg::ExportJson),
        (_, KeyCode::Char('q')) => Some(Msg::Quit),
        (_, KeyCode::Char('?')) => Some(Msg::ToggleHelp),
        (_, KeyCode::Char('i')) => Some(Msg::FocusEditor),
        (_, KeyCode::Char('k')) => Some(Msg::Navigate(DirectionKey::Up)),
        (_, KeyCode::Char('j')) => Some(Msg::Navigate(DirectionKey::Down)),
        (_, KeyCode::Char('h')) => Some(Msg::Navigate(DirectionKey::Left)),
        (_, KeyCode::Char('l')) => Some(Msg::Navigate(DirectionKey::Right)),
        (_, KeyCode::Char('[')) => Some(Msg::Back),
        (_, KeyCode::Char(']')) => Some(Msg::Forward),
        (_, KeyCode::Char('r')) => Some(Msg::Refresh),
        (_, KeyCode::Char('c')) => Some(Msg::Count),
        (_, KeyCode::Char('f')) => Some(Msg::AddFilter),
        (_, KeyCode::Char('e')) => Some(Msg::EditFilter),
        (_, KeyCode::Char('t')) => Some(Msg::ToggleFilter),
        (_, KeyCode::Char('d')) => Some(Msg::RemoveFilter),
        (_, KeyCode::Char('.')) => Some(Msg::NextFilter),
        (_, KeyCode::Char(',')) => Some(Msg::PreviousFilter),
        (_, KeyCode::Char('x')) => Some(Msg::ClearFilters),
        (_, KeyCode::Char('s')) => Some(Msg::ToggleSort),
        (_, KeyCode::Char('S')) => Some(Msg::RemoveSort),
        (_, KeyCode::Char('X')) => Some(Msg::ClearSorting),
        (_, KeyCode::Char('L')) => Some(Msg::EditRowLimit),
        (_, KeyCode::Char('/')) => Some(Msg::Search),
        (_, KeyCode::Char('w')) => Some(Msg::SaveSnapshot),
        (_, KeyCode::Char('o')) => Some(Msg::LoadSnapshot),
        (_, KeyCode::Char('E')) => Some(Msg::ExportCsv),
        (_, KeyCode::Char('y')) => Some(Msg::CopyCell),
        (_, KeyCode::Char('Y')) => Some(Msg::CopyColumn),
        (_, KeyCode::Char('p')) => Some(Msg::CopyQuery),
        (_, KeyCode::Char('P')) => Some(Msg::CopyQueryAndResults),
        (_, KeyCode::Char('J')) => Some(Msg::InspectJson),
        (_, KeyCode::Char('T')) => Some(Msg::JsonTools),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use pgview_core::filter::{FilterOperator, FilterState};
    use pgview_core::query_runner::{QueryOutcome, QueryResponse, TabularResult};
    use pgview_core::saved_queries::SavedQueryStore;
    use pgview_core::session::{Command, QueryMode, SessionController};
    use tempfile::TempDir;

    use super::{map_key_event, DirectionKey, InputMode, Msg, Overlay, Pane, PromptKind, TuiApp};
    use crate::worker::WorkerEvent;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app_in(temp_dir: &TempDir) -> TuiApp {
        TuiApp::new(
            SessionController::new(),
            SavedQueryStore::new(temp_dir.path().join("saved_queries")),
            temp_dir.path().to_path_buf(),
            "test",
        )
    }

    /// Plays the worker side: answers every pending grid query with `rows`.
    fn answer_queries(app: &mut TuiApp, rows: &[[&str; 3]]) {
        for command in app.take_commands() {
            if let Command::Execute(request) = command {
                app.apply_worker_event(WorkerEvent::Query(QueryResponse {
                    id: request.id,
                    kind: request.kind,
                    outcome: QueryOutcome::Rows(TabularResult::new(
                        vec!["row".to_string(), "id".to_string(), "name".to_string()],
                        rows.iter()
                            .map(|row| row.iter().map(ToString::to_string).collect())
                            .collect(),
                    )),
                    elapsed: Duration::from_millis(1),
                }));
            }
        }
    }

    fn browsing_app(temp_dir: &TempDir) -> TuiApp {
        let mut app = app_in(temp_dir);
        app.session.start();
        app.take_commands();
        app.apply_worker_event(WorkerEvent::Schemas(vec![
            "app".to_string(),
            "public".to_string(),
        ]));
        app.take_commands();
        app.apply_worker_event(WorkerEvent::Tables {
            schema: "app".to_string(),
            tables: vec!["users".to_string(), "orders".to_string()],
            auto_select: true,
        });
        answer_queries(&mut app, &[["1", "5", "Ada"], ["2", "6", "Grace"]]);
        app
    }

    #[test]
    fn connection_error_stays_visible_after_empty_schema_event() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = app_in(&temp_dir);
        app.session.start();
        app.session.connection_failed("connection refused");
        app.take_commands();

        app.apply_worker_event(WorkerEvent::Schemas(Vec::new()));
        assert_eq!(app.session.status(), "Connection failed: connection refused");
    }

    #[test]
    fn pane_cycles_in_expected_order() {
        assert_eq!(Pane::Schemas.next(), Pane::Tables);
        assert_eq!(Pane::Tables.next(), Pane::Results);
        assert_eq!(Pane::Results.next(), Pane::Editor);
        assert_eq!(Pane::Editor.next(), Pane::Schemas);
    }

    #[test]
    fn keymap_supports_navigation_and_history_keys() {
        assert_eq!(
            map_key_event(key(KeyCode::Char('[')), InputMode::Normal),
            Some(Msg::Back)
        );
        assert_eq!(
            map_key_event(key(KeyCode::Char(']')), InputMode::Normal),
            Some(Msg::Forward)
        );
        assert_eq!(
            map_key_event(key(KeyCode::Char('J')), InputMode::Normal),
            Some(Msg::InspectJson)
        );
        assert_eq!(
            map_key_event(key(KeyCode::Char('j')), InputMode::Normal),
            Some(Msg::Navigate(DirectionKey::Down))
        );
        assert_eq!(
            map_key_event(
                KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL),
                InputMode::Text
            ),
            Some(Msg::RunManualQuery)
        );
    }

    #[test]
    fn text_mode_turns_printable_keys_into_input() {
        assert_eq!(
            map_key_event(key(KeyCode::Char('q')), InputMode::Text),
            Some(Msg::Input('q'))
        );
        assert_eq!(
            map_key_event(
                KeyEvent::new(KeyCode::Char('S'), KeyModifiers::SHIFT),
                InputMode::Text
            ),
            Some(Msg::Input('S'))
        );
        assert_eq!(
            map_key_event(key(KeyCode::Esc), InputMode::Text),
            Some(Msg::Cancel)
        );
    }

    #[test]
    fn worker_events_drive_selection_and_cursors() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let app = browsing_app(&temp_dir);

        assert_eq!(app.session.schema(), Some("app"));
        assert_eq!(app.session.table(), Some("users"));
        assert_eq!(app.schema_cursor, 0);
        assert_eq!(app.table_cursor, 0);
        assert_eq!(app.session.results().row_count(), 2);
    }

    #[test]
    fn filter_dialog_adds_filter_from_selected_cell() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = browsing_app(&temp_dir);
        app.focus = Pane::Results;

        app.handle(Msg::Navigate(DirectionKey::Right));
        app.handle(Msg::AddFilter);
        let Some(Overlay::FilterDialog(dialog)) = &app.overlay else {
            panic!("filter dialog should open");
        };
        assert_eq!(dialog.column, "id");
        assert_eq!(dialog.value, "5");
        assert_eq!(app.input_mode(), InputMode::Text);

        app.handle(Msg::Navigate(DirectionKey::Down));
        app.handle(Msg::Submit);
        assert!(app.overlay.is_none());
        let filters = app.session.filters();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].operator, FilterOperator::NotEqual);
        assert!(app.session.query_text().contains("\"id\" != 5"));
    }

    #[test]
    fn row_number_column_cannot_open_filter_dialog() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = browsing_app(&temp_dir);
        app.focus = Pane::Results;

        app.handle(Msg::AddFilter);
        assert!(app.overlay.is_none());
        assert_eq!(
            app.session.status(),
            "Filters can only be created from a data column."
        );
    }

    #[test]
    fn filter_bar_keys_toggle_and_remove_selected_filter() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = browsing_app(&temp_dir);
        app.focus = Pane::Results;
        app.handle(Msg::Navigate(DirectionKey::Right));
        app.handle(Msg::AddFilter);
        app.handle(Msg::Submit);

        app.handle(Msg::ToggleFilter);
        assert_eq!(app.session.filters()[0].state, FilterState::Inactive);
        app.handle(Msg::RemoveFilter);
        assert!(app.session.filters().is_empty());
        assert_eq!(app.session.history().len(), 4);
    }

    #[test]
    fn editor_typing_then_ctrl_r_runs_manual_query() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = browsing_app(&temp_dir);
        app.handle(Msg::FocusEditor);
        assert_eq!(app.input_mode(), InputMode::Text);

        let generated_len = app.session.query_text().len();
        for _ in 0..generated_len {
            app.handle(Msg::Backspace);
        }
        for character in "SELECT 1;".chars() {
            app.handle(Msg::Input(character));
        }
        assert!(app.session.is_query_edited());

        app.handle(Msg::RunManualQuery);
        assert_eq!(app.session.mode(), QueryMode::Manual);
        assert_eq!(app.focus, Pane::Results);
    }

    #[test]
    fn row_limit_prompt_rejects_invalid_input() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = browsing_app(&temp_dir);

        app.handle(Msg::EditRowLimit);
        let Some(Overlay::Prompt(prompt)) = &app.overlay else {
            panic!("row limit prompt should open");
        };
        assert_eq!(prompt.kind, PromptKind::RowLimit);
        assert_eq!(prompt.input, "50");

        app.handle(Msg::Backspace);
        app.handle(Msg::Backspace);
        app.handle(Msg::Input('0'));
        app.handle(Msg::Submit);
        assert_eq!(app.session.row_limit(), 50);
        assert_eq!(app.session.status(), "Limit must be greater than 0.");
    }

    #[test]
    fn save_and_load_snapshot_through_prompts() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = browsing_app(&temp_dir);

        app.handle(Msg::SaveSnapshot);
        let Some(Overlay::Prompt(prompt)) = &app.overlay else {
            panic!("save prompt should open");
        };
        assert!(prompt.input.starts_with("users_"));
        app.handle(Msg::Submit);
        assert!(app.session.status().starts_with("Query configuration saved to"));

        app.focus = Pane::Results;
        app.handle(Msg::Navigate(DirectionKey::Right));
        app.handle(Msg::ToggleSort);
        assert_eq!(app.session.sorting().len(), 1);
        app.handle(Msg::LoadSnapshot);
        let Some(Overlay::Picker(picker)) = &app.overlay else {
            panic!("snapshot picker should open");
        };
        assert_eq!(picker.names.len(), 1);
        app.handle(Msg::Submit);
        assert!(app.session.sorting().is_empty());
        assert!(app.session.status().starts_with("Loaded saved query"));
        assert!(app.session.history().can_go_back());
    }

    #[test]
    fn csv_export_writes_displayed_rows() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = browsing_app(&temp_dir);

        app.handle(Msg::ExportCsv);
        let Some(Overlay::Prompt(prompt)) = &app.overlay else {
            panic!("export prompt should open");
        };
        let file_name = prompt.input.clone();
        assert!(file_name.starts_with("users_") && file_name.ends_with(".csv"));
        app.handle(Msg::Submit);

        let output = std::fs::read_to_string(temp_dir.path().join(file_name))
            .expect("export file should exist");
        assert_eq!(output, "row,id,name\n1,5,Ada\n2,6,Grace\n");
    }

    #[test]
    fn json_tools_prompt_shows_formatted_document_or_error() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = app_in(&temp_dir);

        app.handle(Msg::JsonTools);
        for character in "{\"a\": 1}".chars() {
            app.handle(Msg::Input(character));
        }
        app.handle(Msg::Submit);
        assert!(matches!(
            &app.overlay,
            Some(Overlay::Json(view)) if matches!(view.content, super::JsonContent::Document(_))
        ));

        app.handle(Msg::Cancel);
        app.handle(Msg::JsonTools);
        app.handle(Msg::Input('{'));
        app.handle(Msg::Submit);
        assert!(matches!(
            &app.overlay,
            Some(Overlay::Json(view)) if matches!(view.content, super::JsonContent::Invalid(_))
        ));
    }

    #[test]
    fn search_overlay_selects_table_from_catalog() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = browsing_app(&temp_dir);
        app.apply_worker_event(WorkerEvent::AllTables(vec![
            pgview_core::catalog::TableRef::new("public", "accounts"),
            pgview_core::catalog::TableRef::new("app", "users"),
        ]));

        app.handle(Msg::Search);
        for character in "acc".chars() {
            app.handle(Msg::Input(character));
        }
        app.handle(Msg::Submit);

        assert!(app.overlay.is_none());
        assert_eq!(app.session.schema(), Some("public"));
        assert_eq!(app.session.table(), Some("accounts"));
        assert!(app.take_commands().contains(&Command::LoadTables {
            schema: "public".to_string(),
            auto_select: false,
        }));
    }
}
