//! Plain-text rendering of view tables for terminal output.

use std::borrow::Cow;
use std::fmt::Write as _;

const COLUMN_GAP: &str = "  ";

/// Aligns `rows` under `headers`, one line per row, with a dashed separator.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let widths = column_widths(headers, rows);
    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let separator = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &separator_widths));

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

/// A titled table followed by a blank line. Empty tables print `(no rows)`.
pub fn render_section(title: &str, headers: &[String], rows: &[Vec<String>]) -> String {
    let mut output = format!("== {title} ==\n");
    if rows.is_empty() {
        output.push_str("(no rows)\n");
    } else {
        output.push_str(&render_table(headers, rows));
    }
    output.push('\n');
    output
}

/// A titled two-column `label  value` listing.
pub fn render_pairs(title: &str, pairs: &[(String, String)]) -> String {
    let rows = pairs
        .iter()
        .map(|(label, value)| vec![label.clone(), value.clone()])
        .collect::<Vec<_>>();
    let headers = vec!["metric".to_string(), "value".to_string()];
    render_section(title, &headers, &rows)
}

fn column_widths(headers: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }
    widths.iter().map(|w| (*w).max(1)).collect()
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    line.trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI color sequences occupy no columns
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
