//! # Doxygen Input Filter
//!
//! Enhances source documentation without polluting the sources themselves.
//! Given a snippet like:
//!
//! ```text
//! /// Use CloseHandle to close the event handle
//! ```
//!
//! and a keyword table mapping `CloseHandle` to its documentation URL, the
//! filter emits:
//!
//! ```text
//! /// Use [CloseHandle](https://example/close) to close the event handle
//! ```
//!
//! Two magic markers expand into grouped reference tables instead: one for
//! the project-wide `REFERENCES.md` listing, and one for a per-module listing
//! restricted to the keywords that actually occur in the file being filtered.
//!
//! Keyword substitution is a plain ordered substring replacement. Entries are
//! applied strictly in table order (sorted by section, then name), and a
//! replacement can itself introduce text that a later entry matches. The
//! output is therefore order-sensitive and re-filtering already-linked text
//! is NOT idempotent. That matches the tool this replaces; the tests pin it
//! down as a known limitation.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use crate::invariant_ppt::assert_invariant;

/// Marker that expands into the full grouped reference listing.
pub const ALL_DOCS_MARKER: &str = "<< Print All API Documentation >>";

/// Marker that expands into the reference listing for this file only.
pub const MODULE_DOCS_MARKER: &str = "<< Print Module API Documentation >>";

/// The comment marker that opens a documentation comment.
const DOC_COMMENT: &str = "///";

/// One row of the keyword-link table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ApiEntry {
    /// The keyword as it appears in source comments, e.g. `CloseHandle`.
    #[serde(rename = "Name")]
    pub name: String,
    /// The documentation URL the keyword links to.
    #[serde(rename = "URL")]
    pub url: String,
    /// Grouping section for the reference listings, e.g. `Handles`.
    #[serde(rename = "Section")]
    pub section: String,
}

/// The keyword-link table, held in substitution order.
#[derive(Debug)]
pub struct ApiTable {
    entries: Vec<ApiEntry>,
}

impl ApiTable {
    /// Loads the table from a CSV file with `Name,URL,Section` columns and
    /// sorts it by `(section, name)`.
    ///
    /// A missing or unreadable table file is fatal: filtering without the
    /// table would silently strip every link from the generated docs.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open keyword table {}", path.display()))?;

        let mut entries = Vec::new();
        for record in reader.deserialize() {
            let entry: ApiEntry = record
                .with_context(|| format!("malformed row in keyword table {}", path.display()))?;
            entries.push(entry);
        }

        debug!("Loaded {} keyword entries from {}", entries.len(), path.display());
        Ok(Self::from_entries(entries))
    }

    /// Builds a table from in-memory entries, sorting them into substitution
    /// order.
    pub fn from_entries(mut entries: Vec<ApiEntry>) -> Self {
        entries.sort_by(|a, b| (&a.section, &a.name).cmp(&(&b.section, &b.name)));

        assert_invariant(
            entries
                .windows(2)
                .all(|w| (&w[0].section, &w[0].name) <= (&w[1].section, &w[1].name)),
            "Keyword table is sorted by section then name",
            Some("Filter"),
        );

        Self { entries }
    }

    /// The entries in substitution order.
    pub fn entries(&self) -> &[ApiEntry] {
        &self.entries
    }
}

/// Filters one source file to `out`, loading the keyword table from
/// `table_path`.
///
/// Python build scripts pass through untouched: their text must never be
/// rewritten, so for a `.py` source the table is not even loaded.
pub fn run(source: &Path, table_path: &Path, out: &mut dyn Write) -> Result<()> {
    let text = fs::read_to_string(source)
        .with_context(|| format!("failed to read source file {}", source.display()))?;

    if source.extension().is_some_and(|ext| ext == "py") {
        out.write_all(text.as_bytes())?;
        return Ok(());
    }

    let table = ApiTable::load(table_path)?;
    filter_text(&text, &table, out)
}

/// Applies the filter to `text`, writing the result to `out`.
///
/// Per line, in priority order:
/// 1. full-listing marker -> grouped reference table, marker line dropped;
/// 2. module-listing marker -> grouped table restricted to keywords that
///    occur anywhere in `text`, each line prefixed with `/// `;
/// 3. otherwise, keyword substitution after the first `///`, or verbatim
///    pass-through when the line has no documentation comment.
pub fn filter_text(text: &str, table: &ApiTable, out: &mut dyn Write) -> Result<()> {
    for chunk in text.split_inclusive('\n') {
        if chunk.contains(ALL_DOCS_MARKER) {
            emit_grouped(table.entries().iter(), "", "##", out)?;
            continue;
        }

        if chunk.contains(MODULE_DOCS_MARKER) {
            // Second pass over the whole file: which keywords occur here?
            // Naive substring containment, matching the listing's intent of
            // "every API this module talks about".
            let used: HashSet<&str> = table
                .entries()
                .iter()
                .filter(|e| text.lines().any(|line| line.contains(e.name.as_str())))
                .map(|e| e.name.as_str())
                .collect();

            emit_grouped(
                table.entries().iter().filter(|e| used.contains(e.name.as_str())),
                "/// ",
                "####",
                out,
            )?;
            continue;
        }

        match chunk.find(DOC_COMMENT) {
            None => out.write_all(chunk.as_bytes())?,
            Some(i) => {
                let pre = &chunk[..i];
                let post = &chunk[i + DOC_COMMENT.len()..];
                write!(out, "{}{}{}", pre, DOC_COMMENT, link_keywords(post, table))?;
            }
        }
    }

    Ok(())
}

/// Replaces every occurrence of each table entry's name with a Markdown link
/// `[name](url)`.
///
/// Entries are applied as a strictly ordered sequence of substitutions, not
/// as a set: earlier replacements may introduce substrings that later entries
/// match again.
pub fn link_keywords(text: &str, table: &ApiTable) -> String {
    let mut out = text.to_string();
    for entry in table.entries() {
        out = out.replace(&entry.name, &format!("[{}]({})", entry.name, entry.url));
    }
    out
}

/// Emits a grouped Markdown reference table for `entries`.
///
/// A section block (blank separator, heading, table header) is opened every
/// time the section changes from the previous emitted entry; entries are
/// assumed pre-sorted by section. `prefix` is prepended to every line of the
/// listing (`/// ` for the per-module variant) and `heading` is the Markdown
/// heading marker (`##` or `####`).
fn emit_grouped<'a>(
    entries: impl Iterator<Item = &'a ApiEntry>,
    prefix: &str,
    heading: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let mut section = "";

    for entry in entries {
        if section != entry.section {
            writeln!(out, "{}", prefix)?;
            writeln!(out, "{}{} {}", prefix, heading, entry.section)?;
            writeln!(out, "{}| API | Link |", prefix)?;
            writeln!(out, "{}|-----|------|", prefix)?;
            section = &entry.section;
        }
        writeln!(out, "{}| [{}]({}) | {} |", prefix, entry.name, entry.url, entry.url)?;
    }

    writeln!(out)?;
    Ok(())
}
