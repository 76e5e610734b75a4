//! Comma-separated persistence for discovery and enriched record sets
//!
//! Quoting follows the usual rules: cells containing the separator, a quote
//! or a line break are wrapped in quotes with inner quotes doubled.

use std::collections::HashMap;
use std::io::{self, Write};
use std::mem::take;
use std::path::Path;
use tracing::info;

use crate::domain::Record;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

pub const COL_NAME: &str = "Company Name";
pub const COL_BATCH: &str = "Batch";
pub const COL_DESCRIPTION: &str = "Short Description";
pub const COL_DETAIL_URL: &str = "Detail URL";
pub const COL_FOUNDER_NAMES: &str = "Founder Name(s)";
pub const COL_FOUNDER_PROFILES: &str = "Founder LinkedIn URL(s)";

pub const DISCOVERY_COLUMNS: [&str; 4] = [COL_NAME, COL_BATCH, COL_DESCRIPTION, COL_DETAIL_URL];
pub const ENRICHED_COLUMNS: [&str; 5] = [
    COL_NAME,
    COL_BATCH,
    COL_DESCRIPTION,
    COL_FOUNDER_NAMES,
    COL_FOUNDER_PROFILES,
];

const SEP: char = ',';

/* ---------------- Parsing ---------------- */

/// Split text into rows of cells (quotes + CRLF tolerant)
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if matches!(chars.peek(), Some('"')) {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            c if c == SEP && !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if row.len() == 1 && row[0].is_empty() {
                    row.clear();
                } else {
                    rows.push(take(&mut row));
                }
            }
            _ => field.push(ch),
        }
    }

    // trailing row without a final newline
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/* ---------------- Writing ---------------- */

fn needs_quotes(cell: &str) -> bool {
    cell.contains(SEP) || cell.contains('"') || cell.contains('\n') || cell.contains('\r')
}

pub fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, "{}", SEP)?;
        }
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

fn render_table<const N: usize>(columns: [&str; N], rows: impl Iterator<Item = [String; N]>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_row(&mut buf, &columns)?;
    for row in rows {
        write_row(&mut buf, &row)?;
    }
    Ok(buf)
}

/// Discovery output: one row per partial record
pub async fn write_discovery_csv(path: &Path, records: &[Record]) -> ScrapeResult<()> {
    let buf = render_table(
        DISCOVERY_COLUMNS,
        records.iter().map(|r| {
            [
                r.name.clone(),
                r.batch_label.clone(),
                r.short_description.clone(),
                r.detail_url.clone(),
            ]
        }),
    )?;
    tokio::fs::write(path, buf).await?;
    info!("💾 Saved {} startups to {}", records.len(), path.display());
    Ok(())
}

/// Final output: detail URL dropped, founder columns comma-joined
pub async fn write_enriched_csv(path: &Path, records: &[Record]) -> ScrapeResult<()> {
    let buf = render_table(
        ENRICHED_COLUMNS,
        records.iter().map(|r| {
            [
                r.name.clone(),
                r.batch_label.clone(),
                r.short_description.clone(),
                r.founder_names_joined(),
                r.founder_profile_urls_joined(),
            ]
        }),
    )?;
    tokio::fs::write(path, buf).await?;
    info!("💾 Saved {} enriched startups to {}", records.len(), path.display());
    Ok(())
}

/// Read a discovery CSV back into partial records, in file order
pub async fn read_discovery_csv(path: &Path) -> ScrapeResult<Vec<Record>> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_discovery_table(&text)
}

pub fn parse_discovery_table(text: &str) -> ScrapeResult<Vec<Record>> {
    let mut rows = parse_rows(text.trim_start_matches('\u{feff}')).into_iter();
    let header = rows.next().ok_or(ScrapeError::Persistence {
        line: 1,
        reason: "file is empty".to_string(),
    })?;

    let index: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim(), i))
        .collect();
    let column = |name: &str| {
        index.get(name).copied().ok_or_else(|| ScrapeError::Persistence {
            line: 1,
            reason: format!("missing column '{}'", name),
        })
    };
    let (name, batch, description, detail_url) = (
        column(COL_NAME)?,
        column(COL_BATCH)?,
        column(COL_DESCRIPTION)?,
        column(COL_DETAIL_URL)?,
    );

    rows.enumerate()
        .map(|(i, row)| {
            let cell = |idx: usize| {
                row.get(idx).cloned().ok_or_else(|| ScrapeError::Persistence {
                    line: i + 2,
                    reason: format!("expected {} cells, found {}", header.len(), row.len()),
                })
            };
            Ok(Record::partial(
                cell(name)?,
                cell(batch)?,
                cell(description)?,
                cell(detail_url)?,
            ))
        })
        .collect()
}
