use colored::Colorize;
use std::time::Duration;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Format an elapsed time as seconds with two decimals
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

// ============================================================================
// Tables
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Center,
}

/// One table column: label, alignment, minimum width and cell formatter
pub struct Column<'a, T> {
    label: &'a str,
    align: Align,
    min_width: usize,
    cell: Box<dyn Fn(&T) -> String + 'a>,
}

impl<'a, T> Column<'a, T> {
    pub fn new(label: &'a str, align: Align, min_width: usize, cell: impl Fn(&T) -> String + 'a) -> Self {
        Self {
            label,
            align,
            min_width,
            cell: Box::new(cell),
        }
    }
}

fn pad(text: &str, width: usize, align: Align) -> String {
    match align {
        Align::Left => format!("{text:<width$}"),
        Align::Right => format!("{text:>width$}"),
        Align::Center => format!("{text:^width$}"),
    }
}

/// Render rows as an ASCII table.
///
/// Each column is as wide as its minimum, its label and its widest cell.
/// Headers are centered; cells follow the column alignment.
pub fn render_table<T>(columns: &[Column<'_, T>], rows: &[T]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| (c.cell)(row)).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain([c.min_width, c.label.chars().count()])
                .max()
                .unwrap_or_default()
        })
        .collect();

    let inner = (widths.iter().sum::<usize>() + columns.len() * 3).saturating_sub(1);
    let rule = format!("+{}+", "-".repeat(inner));

    let line = |texts: Vec<String>| format!("| {} |", texts.join(" | "));

    let mut out = Vec::with_capacity(rows.len() + 4);
    out.push(rule.clone());
    out.push(line(
        columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| pad(c.label, *w, Align::Center))
            .collect(),
    ));
    out.push(rule.clone());
    for row in &cells {
        out.push(line(
            row.iter()
                .zip(columns.iter().zip(&widths))
                .map(|(text, (c, w))| pad(text, *w, c.align))
                .collect(),
        ));
    }
    out.push(rule);
    out.join("\n")
}

/// Print rows as an ASCII table
pub fn print_table<T>(columns: &[Column<'_, T>], rows: &[T]) {
    println!("{}", render_table(columns, rows));
}

// ============================================================================
// Tests
// ============================================================================
