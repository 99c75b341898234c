use std::io::{self, Write};

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets};
use crossterm::{
    execute,
    style::{self, Print, ResetColor, SetForegroundColor},
    terminal,
};

use crate::core::catalog::{Catalog, ObjectKind};
use crate::core::fetch::RowWindow;
use crate::display::format::{self, CellKind, DisplayString};
use crate::display::pagination::PageInfo;
use crate::display::sink::DisplaySink;
use crate::engine::{FullValue, QueryResult};
use crate::error::ErrorKind;
use crate::utils::data::format_number;

/// Renders windows, schema and results as terminal tables.
pub struct TableDisplay {
    max_width: Option<usize>,
    use_colors: bool,
    cell_width: usize,
}

impl TableDisplay {
    pub fn new(cell_width: usize) -> Self {
        Self {
            max_width: Self::detect_terminal_width(),
            use_colors: atty::is(atty::Stream::Stdout),
            cell_width,
        }
    }

    fn detect_terminal_width() -> Option<usize> {
        match terminal::size() {
            Ok((cols, _rows)) => Some((cols as usize).clamp(40, 200)),
            Err(_) => Some(80),
        }
    }

    pub fn with_max_width(mut self, width: usize) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn use_colors(&self) -> bool {
        self.use_colors
    }

    fn new_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_width(self.max_width.unwrap_or(80).saturating_sub(2).max(40) as u16);
        table
    }

    fn header_cell(&self, text: impl Into<String>) -> Cell {
        let cell = Cell::new(text.into()).add_attribute(Attribute::Bold);
        if self.use_colors {
            cell.fg(Color::Cyan)
        } else {
            cell
        }
    }

    fn value_cell(&self, shown: DisplayString) -> Cell {
        if !self.use_colors {
            return Cell::new(shown.text);
        }
        match shown.kind {
            CellKind::Null => Cell::new(shown.text)
                .fg(Color::DarkGrey)
                .add_attribute(Attribute::Italic),
            CellKind::Blob => Cell::new(shown.text).fg(Color::Magenta),
            CellKind::Integer | CellKind::Real => Cell::new(shown.text).fg(Color::Yellow),
            CellKind::Text => Cell::new(shown.text),
        }
    }

    /// One browse window with the row position column and a status line.
    pub fn render_window(&self, window: &RowWindow, page: &PageInfo) -> String {
        if window.is_empty() {
            return page.status_line();
        }

        let mut table = self.new_table();
        let mut headers = vec![self.header_cell("#")];
        for column in &window.columns {
            let label = match &page.sort.column {
                Some(sorted) if sorted == column => {
                    format!("{} {}", column, page.sort.direction.arrow())
                }
                _ => column.clone(),
            };
            headers.push(self.header_cell(label));
        }
        table.set_header(headers);

        for (index, row) in window.rows.iter().enumerate() {
            let position = window.offset + index as u64 + 1;
            let mut cells = vec![Cell::new(format_number(position))];
            cells.extend(
                row.cells
                    .iter()
                    .map(|value| self.value_cell(format::format(value, self.cell_width))),
            );
            table.add_row(cells);
        }

        format!("{}\n{}", table, page.status_line())
    }

    /// Every schema object with its parent table and, for tables and views,
    /// the column list.
    pub fn render_schema(&self, catalog: &Catalog) -> String {
        if catalog.objects().is_empty() {
            return "No schema objects.".to_string();
        }

        let mut table = self.new_table();
        table.set_header(vec![
            self.header_cell("Type"),
            self.header_cell("Name"),
            self.header_cell("Table"),
            self.header_cell("Columns"),
        ]);

        for object in catalog.objects() {
            let columns = if object.kind.is_browsable() {
                catalog
                    .table(&object.name)
                    .map(|t| t.column_names().join(", "))
                    .unwrap_or_default()
            } else {
                String::new()
            };
            let parent = if object.kind == ObjectKind::Table || object.kind == ObjectKind::View {
                String::new()
            } else {
                object.tbl_name.clone()
            };
            table.add_row(vec![
                Cell::new(object.kind.label()),
                Cell::new(&object.name),
                Cell::new(parent),
                Cell::new(columns),
            ]);
        }

        let summary = format!(
            "{} tables, {} views, {} indices, {} triggers (schema v{})",
            catalog.tables().count(),
            catalog.views().count(),
            catalog.indices().count(),
            catalog.triggers().count(),
            catalog.version()
        );
        format!("{}\n{}", table, summary)
    }

    pub fn render_query_result(&self, result: &QueryResult) -> String {
        match result {
            QueryResult::Rows { columns, rows, .. } => {
                if rows.is_empty() {
                    return format!("Query returned no rows.\n{}", result.summary());
                }
                let mut table = self.new_table();
                table.set_header(
                    columns
                        .iter()
                        .map(|c| self.header_cell(c.as_str()))
                        .collect::<Vec<_>>(),
                );
                for row in rows {
                    table.add_row(
                        row.iter()
                            .map(|value| self.value_cell(format::format(value, self.cell_width)))
                            .collect::<Vec<_>>(),
                    );
                }
                format!("{}\n{}", table, result.summary())
            }
            QueryResult::Status { .. } | QueryResult::Error { .. } => result.summary(),
        }
    }

    pub fn render_cell_detail(&self, column: &str, value: &FullValue) -> String {
        let mut out = format!("── {} ({} bytes) ──\n", column, format_number(value.byte_len() as u64));
        for line in format::render_detail(value) {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Sink that prints to the terminal. Errors go to stderr.
pub struct ConsoleSink {
    display: TableDisplay,
    show_rows: bool,
    errors: usize,
}

impl ConsoleSink {
    pub fn new(display: TableDisplay) -> Self {
        Self {
            display,
            show_rows: true,
            errors: 0,
        }
    }

    /// Skip browse windows, for commands that only want a cell or a result.
    pub fn without_rows(mut self) -> Self {
        self.show_rows = false;
        self
    }

    /// Errors and failed statements printed so far.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    fn print_error(&mut self, label: &str, message: &str) -> io::Result<()> {
        self.errors += 1;
        let mut stderr = io::stderr();
        if self.display.use_colors() {
            execute!(
                stderr,
                SetForegroundColor(style::Color::Red),
                Print(label),
                ResetColor,
                Print(format!(": {}\n", message))
            )
        } else {
            writeln!(stderr, "{}: {}", label, message)
        }
    }
}

impl DisplaySink for ConsoleSink {
    fn render_rows(&mut self, window: &RowWindow, page: &PageInfo) {
        if !self.show_rows {
            return;
        }
        println!("{}", self.display.render_window(window, page));
    }

    fn render_schema(&mut self, catalog: &Catalog) {
        println!("{}", self.display.render_schema(catalog));
    }

    fn render_query_result(&mut self, result: &QueryResult) {
        if let QueryResult::Error { message } = result {
            let _ = self.print_error("SQL error", message);
            return;
        }
        println!("{}", self.display.render_query_result(result));
    }

    fn render_error(&mut self, kind: ErrorKind, message: &str) {
        let label = match kind {
            ErrorKind::QueryTimeout => "Timeout",
            ErrorKind::FilterSyntax => "Filter error",
            _ => "Error",
        };
        let _ = self.print_error(label, message);
    }

    fn render_status(&mut self, message: &str) {
        eprintln!("{}", message);
    }

    fn render_cell_detail(&mut self, column: &str, value: &FullValue) {
        print!("{}", self.display.render_cell_detail(column, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::RowCount;
    use crate::core::query_builder::SortSpec;
    use crate::engine::{CellValue, Row};

    fn display() -> TableDisplay {
        TableDisplay::new(20).with_max_width(120).with_colors(false)
    }

    fn window() -> RowWindow {
        RowWindow {
            table: "users".to_string(),
            columns: vec!["id".to_string(), "name".to_string(), "age".to_string()],
            rows: vec![
                Row {
                    rowid: Some(1),
                    cells: vec![
                        CellValue::Integer(1),
                        CellValue::Text("Alice".to_string(), 5),
                        CellValue::Null,
                    ],
                },
                Row {
                    rowid: Some(2),
                    cells: vec![
                        CellValue::Integer(2),
                        CellValue::Text(String::new(), 0),
                        CellValue::Integer(41),
                    ],
                },
            ],
            offset: 0,
            generation: 0,
            has_more: false,
        }
    }

    fn page(sort: SortSpec) -> PageInfo {
        PageInfo {
            page_size: 200,
            offset: 0,
            shown: 2,
            has_more: false,
            total: RowCount::Exact(2),
            high_water: 2,
            sort,
            filter: None,
        }
    }

    #[test]
    fn test_render_window() {
        let output = display().render_window(&window(), &page(SortSpec::descending("age")));
        assert!(output.contains("Alice"));
        assert!(output.contains("NULL"));
        assert!(output.contains("age ↓"));
        assert!(output.ends_with("Rows 1–2 of 2 | sorted by age ↓"));
    }

    #[test]
    fn test_render_empty_window_is_status_only() {
        let mut empty = window();
        empty.rows.clear();
        empty.offset = 400;
        let mut info = page(SortSpec::natural());
        info.offset = 400;
        info.shown = 0;
        assert_eq!(display().render_window(&empty, &info), "No rows at offset 400");
    }

    #[test]
    fn test_render_query_result_shapes() {
        let rows = QueryResult::Rows {
            columns: vec!["1/0".to_string()],
            rows: vec![vec![CellValue::Null]],
            row_count: 1,
            truncated: false,
        };
        let output = display().render_query_result(&rows);
        assert!(output.contains("1/0"));
        assert!(output.ends_with("1 rows returned"));

        let status = QueryResult::Status { rows_affected: 0 };
        assert_eq!(display().render_query_result(&status), "0 rows affected");
    }

    #[test]
    fn test_render_cell_detail() {
        let output = display().render_cell_detail("payload", &FullValue::Blob(vec![0xDE, 0xAD]));
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "── payload (2 bytes) ──");
        assert_eq!(lines[1], "BLOB (2 bytes)");
        assert!(lines[2].starts_with("00000000  DE AD"));
    }
}
