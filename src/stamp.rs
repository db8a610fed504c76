//! # Stamping Logic
//!
//! This module contains the core business logic of the version synchronizer.
//! It is responsible for:
//! 1. Incrementing the build counter in the version header (`update_header`).
//! 2. Propagating the new version into the Doxygen config (`update_doxyfile`).
//! 3. Propagating it into the UTF-16 resource script (`update_resource`).
//! 4. Propagating `major.minor` into the project file (`update_vcxproj`).
//!
//! Every target follows the same shape: read the whole file, transform lines
//! in memory, write the whole file back. `map_lines` is the one reusable
//! line-transform pass that all of the rewrites share, so the I/O scaffolding
//! is not duplicated per target. The write is NOT an atomic rename; a crash
//! mid-write can truncate the target. These files are regenerated on the next
//! build, so that risk is accepted rather than mitigated.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Datelike;
use log::{debug, info};

use crate::invariant_ppt::assert_invariant;
use crate::version::{self, Version};

/// Doxygen config key whose value carries the full version string.
const DOXY_PROJECT_NUMBER: &str = "PROJECT_NUMBER";

/// The set of files a stamp run may rewrite.
///
/// Only `header` is touched by default; the rest are rewritten when the
/// `--all` flag selects extended mode.
#[derive(Debug, Clone)]
pub struct StampTargets {
    /// The C header holding the `#define VERSION_*` lines (source of truth).
    pub header: PathBuf,
    /// The Doxygen configuration file.
    pub doxyfile: PathBuf,
    /// The resource definition script (UTF-16LE text).
    pub resource: PathBuf,
    /// The MSBuild project configuration file.
    pub vcxproj: PathBuf,
}

/// Runs one stamping pass and returns the post-update version.
///
/// Always bumps the build counter in the header. When `all` is set, the
/// Doxyfile, resource script and project file are rewritten with the new
/// version as well.
pub fn run(targets: &StampTargets, all: bool) -> Result<Version> {
    let version = update_header(&targets.header)?;

    assert_invariant(
        version.full().split('.').count() == 4,
        "Version string has exactly four components",
        Some("Stamp"),
    );

    if all {
        info!("Updating version in all files");
        update_doxyfile(&targets.doxyfile, &version)?;
        update_resource(&targets.resource, &version, chrono::Local::now().year())?;
        update_vcxproj(&targets.vcxproj, &version)?;
    }

    Ok(version)
}

/// Applies a per-line rewrite function over `text`, preserving each line's
/// original terminator (`\n` or `\r\n`) and leaving untouched lines
/// byte-identical.
///
/// The rewrite function sees the line without its terminator and returns
/// `Some(new_line)` to replace it or `None` to pass it through.
pub fn map_lines<F>(text: &str, mut f: F) -> Result<String>
where
    F: FnMut(&str) -> Result<Option<String>>,
{
    let mut out = String::with_capacity(text.len());

    for chunk in text.split_inclusive('\n') {
        let (body, eol) = if let Some(stripped) = chunk.strip_suffix("\r\n") {
            (stripped, "\r\n")
        } else if let Some(stripped) = chunk.strip_suffix('\n') {
            (stripped, "\n")
        } else {
            (chunk, "")
        };

        match f(body)? {
            Some(new_line) => {
                out.push_str(&new_line);
                out.push_str(eol);
            }
            None => out.push_str(chunk),
        }
    }

    Ok(out)
}

/// Reads a UTF-8 text file, runs `f` over its lines, and writes it back.
fn rewrite_text_file<F>(path: &Path, f: F) -> Result<()>
where
    F: FnMut(&str) -> Result<Option<String>>,
{
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let out = map_lines(&text, f)?;
    fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Increments `VERSION_BUILD` in the header and returns the re-parsed
/// version record.
///
/// If the old build line was `#define VERSION_BUILD 1045`, the new build
/// line will be `#define VERSION_BUILD 1046`. All other lines pass through
/// byte-for-byte.
pub fn update_header(path: &Path) -> Result<Version> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read version header {}", path.display()))?;

    let old = version::parse_header(&text)?;
    let (new_text, new_build) = version::bump_build_line(&text)?;

    assert_invariant(
        new_build == old.build + 1,
        "Build counter advances by exactly one per stamp",
        Some("Stamp"),
    );

    fs::write(path, &new_text)
        .with_context(|| format!("failed to write version header {}", path.display()))?;

    // Re-parse from the rewritten text so the returned record reflects what
    // is actually on disk, not what we think we wrote.
    let version = version::parse_header(&new_text)?;
    debug!("Stamped {} -> {}", path.display(), version);
    Ok(version)
}

/// Replaces the value of the `PROJECT_NUMBER` key in a Doxygen config.
///
/// The line is expected to look like `PROJECT_NUMBER         = 1.4.0.1044`;
/// it is rewritten to `PROJECT_NUMBER = <full version>`.
pub fn update_doxyfile(path: &Path, version: &Version) -> Result<()> {
    let full = version.full();
    rewrite_text_file(path, |line| {
        if line.starts_with(DOXY_PROJECT_NUMBER) {
            Ok(Some(format!("{} = {}", DOXY_PROJECT_NUMBER, full)))
        } else {
            Ok(None)
        }
    })?;
    debug!("Updated {} in {}", DOXY_PROJECT_NUMBER, path.display());
    Ok(())
}

/// Rewrites the version fields of a resource script.
///
/// The resource script is UTF-16LE text (the encoding the resource compiler
/// emits). Five fields are targeted:
/// - `FILEVERSION` and `PRODUCTVERSION` statements get the `1,4,0,1045`
///   numeric tuple;
/// - the quoted `"FileVersion"` and `"ProductVersion"` values get the dotted
///   string;
/// - the `"LegalCopyright"` value has its 4-digit year replaced with `year`.
///
/// Any line matching none of the five patterns is preserved byte-for-byte.
pub fn update_resource(path: &Path, version: &Version, year: i32) -> Result<()> {
    let (text, had_bom) = read_utf16le(path)?;

    let out = map_lines(&text, |line| Ok(rewrite_resource_line(line, version, year)))?;

    write_utf16le(path, &out, had_bom)?;
    debug!("Updated version fields in {}", path.display());
    Ok(())
}

/// Rewrites a single resource-script line, or returns `None` to pass it
/// through. Split out from `update_resource` so the substitution rules can be
/// tested without touching UTF-16 files.
fn rewrite_resource_line(line: &str, version: &Version, year: i32) -> Option<String> {
    const KEY_FILE_VERSION: &str = "VALUE \"FileVersion\",";
    const KEY_PRODUCT_VERSION: &str = "VALUE \"ProductVersion\",";
    const KEY_COPYRIGHT: &str = "VALUE \"LegalCopyright\",";
    const KEY_FILEVERSION_TUPLE: &str = " FILEVERSION ";
    const KEY_PRODUCTVERSION_TUPLE: &str = " PRODUCTVERSION ";

    if let Some(i) = line.find(KEY_FILE_VERSION) {
        Some(format!(
            "{}{} \"{}\"",
            &line[..i],
            KEY_FILE_VERSION,
            version.full()
        ))
    } else if let Some(i) = line.find(KEY_PRODUCT_VERSION) {
        Some(format!(
            "{}{} \"{}\"",
            &line[..i],
            KEY_PRODUCT_VERSION,
            version.full()
        ))
    } else if line.contains(KEY_COPYRIGHT) {
        Some(refresh_year(line, year))
    } else if let Some(i) = line.find(KEY_FILEVERSION_TUPLE) {
        Some(format!(
            "{}{}{}",
            &line[..i],
            KEY_FILEVERSION_TUPLE,
            version.tuple()
        ))
    } else if let Some(i) = line.find(KEY_PRODUCTVERSION_TUPLE) {
        Some(format!(
            "{}{}{}",
            &line[..i],
            KEY_PRODUCTVERSION_TUPLE,
            version.tuple()
        ))
    } else {
        None
    }
}

/// Replaces the first run of exactly four ASCII digits in `line` with `year`.
///
/// Used for the `"LegalCopyright"` value, where the copyright holder text is
/// kept as-is and only the calendar year is refreshed. A line with no 4-digit
/// run passes through unchanged.
fn refresh_year(line: &str, year: i32) -> String {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 4 {
                return format!("{}{}{}", &line[..start], year, &line[i..]);
            }
        } else {
            i += 1;
        }
    }
    line.to_string()
}

/// Rewrites the `<Version>` element of a project configuration file.
///
/// The PE file format only accepts major and minor, so the element content
/// becomes `major.minor` regardless of patch and build.
pub fn update_vcxproj(path: &Path, version: &Version) -> Result<()> {
    const KEY: &str = "<Version>";
    let short = version.short();

    rewrite_text_file(path, |line| {
        if let Some(i) = line.find(KEY) {
            Ok(Some(format!("{}{}{}</Version>", &line[..i], KEY, short)))
        } else {
            Ok(None)
        }
    })?;
    debug!("Updated <Version> in {}", path.display());
    Ok(())
}

/// Reads a UTF-16LE text file into a `String`, reporting whether it carried
/// a byte-order mark.
fn read_utf16le(path: &Path) -> Result<(String, bool)> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read resource file {}", path.display()))?;

    let (bytes, had_bom) = match bytes.strip_prefix(&[0xFF, 0xFE]) {
        Some(rest) => (rest, true),
        None => (bytes.as_slice(), false),
    };

    if bytes.len() % 2 != 0 {
        bail!(
            "{} is not valid UTF-16LE (odd byte count)",
            path.display()
        );
    }

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let text = String::from_utf16(&units)
        .with_context(|| format!("{} is not valid UTF-16LE", path.display()))?;
    Ok((text, had_bom))
}

/// Writes `text` back out as UTF-16LE, restoring the BOM if the original
/// file had one.
fn write_utf16le(path: &Path, text: &str, with_bom: bool) -> Result<()> {
    let mut bytes = Vec::with_capacity(text.len() * 2 + 2);
    if with_bom {
        bytes.extend_from_slice(&[0xFF, 0xFE]);
    }
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
