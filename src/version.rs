//! # Version Record
//!
//! This module owns the parsing of the `version.h` header and the version
//! value itself. The header is the single source of truth for the project
//! version; everything else (`Doxyfile`, resource script, project file) is
//! derived from it by the stamping logic in `stamp.rs`.
//!
//! The header is a plain C header containing lines like:
//!
//! ```text
//! #define VERSION_MAJOR 1
//! #define VERSION_MINOR 4
//! #define VERSION_PATCH 0
//! #define VERSION_BUILD 1044
//! ```
//!
//! A missing key simply leaves that field at zero. A key that is present but
//! followed by garbage is a hard error - silently stamping `0` into release
//! artifacts is worse than failing the build.

use anyhow::{Context, Result, bail};

/// Header key for the major version field.
pub const KEY_MAJOR: &str = "#define VERSION_MAJOR";
/// Header key for the minor version field.
pub const KEY_MINOR: &str = "#define VERSION_MINOR";
/// Header key for the patch version field.
pub const KEY_PATCH: &str = "#define VERSION_PATCH";
/// Header key for the build counter field.
pub const KEY_BUILD: &str = "#define VERSION_BUILD";

/// An immutable four-part version value.
///
/// `major`/`minor`/`patch` follow semantic versioning; `build` is a monotonic
/// counter that increments once per compilation. This tool never mutates the
/// first three fields - humans do that by editing the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub build: u64,
}

impl Version {
    /// The full dotted form used by the Doxyfile and the resource string
    /// fields, e.g. `1.4.0.1045`.
    pub fn full(&self) -> String {
        format!("{}.{}.{}.{}", self.major, self.minor, self.patch, self.build)
    }

    /// The two-part form used by the project file's `<Version>` element.
    ///
    /// The PE file format only carries major and minor, so patch and build
    /// are deliberately dropped here.
    pub fn short(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    /// The comma-separated tuple used by the resource script's `FILEVERSION`
    /// and `PRODUCTVERSION` statements, e.g. `1,4,0,1045`.
    pub fn tuple(&self) -> String {
        format!("{},{},{},{}", self.major, self.minor, self.patch, self.build)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full())
    }
}

/// Extracts the integer that follows `key` in `line`.
///
/// Returns `Ok(None)` when the key does not occur in the line at all, and an
/// error when the key is present but the remainder of the line is not a valid
/// integer. For `extract_int("#define VERSION_MINOR", "#define VERSION_MINOR    4")`
/// this returns `Ok(Some(4))`.
pub fn extract_int(key: &str, line: &str) -> Result<Option<u64>> {
    let Some(idx) = line.find(key) else {
        return Ok(None);
    };

    let rest = line[idx + key.len()..].trim();
    let value: u64 = rest
        .parse()
        .with_context(|| format!("malformed integer after `{}`: {:?}", key, rest))?;
    Ok(Some(value))
}

/// Parses a `Version` out of the full text of a version header.
///
/// Pure function: the header text goes in, a version record comes out. Each
/// field is matched independently; the last occurrence of a key wins, and a
/// key that never appears leaves its field at zero.
pub fn parse_header(text: &str) -> Result<Version> {
    let mut version = Version::default();

    for line in text.lines() {
        if let Some(v) = extract_int(KEY_MAJOR, line)? {
            version.major = v;
        }
        if let Some(v) = extract_int(KEY_MINOR, line)? {
            version.minor = v;
        }
        if let Some(v) = extract_int(KEY_PATCH, line)? {
            version.patch = v;
        }
        if let Some(v) = extract_int(KEY_BUILD, line)? {
            version.build = v;
        }
    }

    Ok(version)
}

/// Rewrites the `VERSION_BUILD` line of a header, incrementing the counter.
///
/// Returns the new header text and the incremented counter value. Only the
/// matching line changes; every other line passes through byte-for-byte.
/// A header with no `VERSION_BUILD` line at all is an error - incrementing
/// nothing would make the "counter advances every build" guarantee a lie.
pub fn bump_build_line(text: &str) -> Result<(String, u64)> {
    let mut bumped: Option<u64> = None;

    let out = crate::stamp::map_lines(text, |line| {
        if line.contains(KEY_BUILD) {
            let old = extract_int(KEY_BUILD, line)?.unwrap_or(0);
            let new = old + 1;
            bumped = Some(new);
            // Reconstruct the line rather than search-and-replace the digits,
            // so a build number that also appears in a comment is untouched.
            let idx = line.find(KEY_BUILD).unwrap_or(0);
            Ok(Some(format!("{}{} {}", &line[..idx], KEY_BUILD, new)))
        } else {
            Ok(None)
        }
    })?;

    match bumped {
        Some(new) => Ok((out, new)),
        None => bail!("no `{}` line found in version header", KEY_BUILD),
    }
}
