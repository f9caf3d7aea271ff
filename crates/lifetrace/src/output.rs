#[cfg(feature = "lifetrace")]
use colored::*;
#[cfg(feature = "lifetrace")]
use prettytable::{color, Attr, Cell, Row, Table};
use std::io::Write;
use std::str::FromStr;

use crate::error::ParseOptionError;
#[cfg(feature = "lifetrace")]
use crate::report::CountRow;
use crate::report::{write_text, Snapshot};

/// Output format for the exit-time memory report.
///
/// # Variants
///
/// * `Text` - Plain sections of right-aligned counts (default)
/// * `Table` - Human-readable tables with colored headers
/// * `Json` - Compact JSON format (single line)
/// * `JsonPretty` - Pretty-printed JSON format with indentation
///
/// # Examples
///
/// ```rust
/// use lifetrace::{Format, GuardBuilder};
///
/// let _guard = GuardBuilder::new("main")
///     .format(Format::Table)
///     .build();
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Text,
    Table,
    Json,
    JsonPretty,
}

impl FromStr for Format {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Format::Text),
            "table" => Ok(Format::Table),
            "json" => Ok(Format::Json),
            "json-pretty" => Ok(Format::JsonPretty),
            _ => Err(ParseOptionError {
                kind: "format",
                value: s.to_string(),
                expected: "\"text\", \"table\", \"json\", \"json-pretty\"",
            }),
        }
    }
}

#[cfg(feature = "lifetrace")]
impl Format {
    pub fn reporter(self) -> Box<dyn Reporter> {
        match self {
            Format::Text => Box::new(TextReporter),
            Format::Table => Box::new(TableReporter),
            Format::Json => Box::new(JsonReporter),
            Format::JsonPretty => Box::new(JsonPrettyReporter),
        }
    }
}

/// Trait for implementing custom memory report output.
///
/// Implement this trait to control how the tracer's tables are displayed or
/// stored when a session ends.
///
/// # Examples
///
/// ```rust
/// use lifetrace::{Reporter, Snapshot};
/// use std::error::Error;
/// use std::io::Write;
///
/// struct LeakCount;
///
/// impl Reporter for LeakCount {
///     fn report(&self, snapshot: &Snapshot, out: &mut dyn Write) -> Result<(), Box<dyn Error>> {
///         writeln!(out, "{} objects leaked", snapshot.leaked())?;
///         Ok(())
///     }
/// }
/// ```
pub trait Reporter: Send + Sync {
    fn report(
        &self,
        snapshot: &Snapshot,
        out: &mut dyn Write,
    ) -> Result<(), Box<dyn std::error::Error>>;
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log(THRESHOLD).floor() as usize).min(UNITS.len() - 1);
    let unit_value = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", unit_value, UNITS[unit_index])
    }
}

pub(crate) struct TextReporter;

impl Reporter for TextReporter {
    fn report(
        &self,
        snapshot: &Snapshot,
        out: &mut dyn Write,
    ) -> Result<(), Box<dyn std::error::Error>> {
        write_text(snapshot, out)?;
        Ok(())
    }
}

#[cfg(feature = "lifetrace")]
fn header_row(headers: &[&str], use_colors: bool) -> Row {
    Row::new(
        headers
            .iter()
            .map(|header| {
                if use_colors {
                    Cell::new(header)
                        .with_style(Attr::Bold)
                        .with_style(Attr::ForegroundColor(color::CYAN))
                } else {
                    Cell::new(header).with_style(Attr::Bold)
                }
            })
            .collect(),
    )
}

#[cfg(feature = "lifetrace")]
fn count_table(title: &str, rows: &[CountRow], use_colors: bool) -> Table {
    let mut table = Table::new();
    table.add_row(header_row(&[title, "Count", "Bytes"], use_colors));
    for row in rows {
        table.add_row(Row::new(vec![
            Cell::new(&row.name),
            Cell::new(&row.count.to_string()),
            Cell::new(&format_bytes(row.bytes)),
        ]));
    }
    table
}

#[cfg(feature = "lifetrace")]
pub(crate) struct TableReporter;

#[cfg(feature = "lifetrace")]
impl Reporter for TableReporter {
    fn report(
        &self,
        snapshot: &Snapshot,
        out: &mut dyn Write,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let use_colors = std::env::var("NO_COLOR").is_err();

        if snapshot.is_empty() {
            writeln!(
                out,
                "{} No traced objects recorded",
                "[lifetrace]".blue().bold()
            )?;
            return Ok(());
        }

        let leaked = snapshot.leaked();
        let summary = format!("{} leaked objects", leaked);
        writeln!(
            out,
            "{} memory report - {}",
            "[lifetrace]".blue().bold(),
            if leaked > 0 {
                summary.red().bold()
            } else {
                summary.green().bold()
            }
        )?;

        if let Some(tally) = snapshot.allocations {
            writeln!(
                out,
                "{}: {} calls, {}",
                "allocations".yellow().bold(),
                tally.calls,
                format_bytes(tally.bytes)
            )?;
        }

        if !snapshot.live_count.is_empty() {
            count_table("Live type", &snapshot.live_count, use_colors).print(out)?;
        }

        if !snapshot.live_objects.is_empty() {
            let mut table = Table::new();
            table.add_row(header_row(&["Live object", "Type"], use_colors));
            for row in &snapshot.live_objects {
                table.add_row(Row::new(vec![
                    Cell::new(&row.addr.to_string()),
                    Cell::new(row.tag),
                ]));
            }
            table.print(out)?;
        }

        if !snapshot.object_count.is_empty() {
            count_table("Type", &snapshot.object_count, use_colors).print(out)?;
        }

        if !snapshot.ctor_count.is_empty() {
            count_table("Constructor", &snapshot.ctor_count, use_colors).print(out)?;
        }

        Ok(())
    }
}

#[cfg(feature = "lifetrace")]
pub(crate) struct JsonReporter;

#[cfg(feature = "lifetrace")]
impl Reporter for JsonReporter {
    fn report(
        &self,
        snapshot: &Snapshot,
        out: &mut dyn Write,
    ) -> Result<(), Box<dyn std::error::Error>> {
        writeln!(out, "{}", serde_json::to_string(snapshot)?)?;
        Ok(())
    }
}

#[cfg(feature = "lifetrace")]
pub(crate) struct JsonPrettyReporter;

#[cfg(feature = "lifetrace")]
impl Reporter for JsonPrettyReporter {
    fn report(
        &self,
        snapshot: &Snapshot,
        out: &mut dyn Write,
    ) -> Result<(), Box<dyn std::error::Error>> {
        writeln!(out, "{}", serde_json::to_string_pretty(snapshot)?)?;
        Ok(())
    }
}
