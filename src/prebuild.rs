//! # Pre-build Event
//!
//! The entry point the build driver invokes before every compilation. MSBuild
//! hands us four values (configuration, platform, solution directory, output
//! directory); we bump the build counter in the version header and, for
//! Release builds, stage the PGO instrumentation files from `Optimizer/`
//! into the output directory.
//!
//! Paths are resolved against the solution directory rather than the process
//! working directory, so the driver can invoke us from anywhere.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};
use walkdir::WalkDir;

use crate::stamp;
use crate::version::Version;

/// Name of the directory holding PGO instrumentation files, relative to the
/// solution directory.
const OPTIMIZER_DIR: &str = "Optimizer";

/// Runs the pre-build event and returns the freshly stamped version.
///
/// `platform` drives no behavior; it is part of the driver's calling
/// convention and is logged for diagnosis only.
pub fn run(
    configuration: &str,
    platform: &str,
    solution_dir: &Path,
    out_dir: &Path,
    header: &Path,
) -> Result<Version> {
    debug!("Configuration: {}", configuration);
    debug!("Platform: {}", platform);
    debug!("SolutionDir: {}", solution_dir.display());
    debug!("OutDir: {}", out_dir.display());

    let header_path = solution_dir.join(header);
    let version = stamp::update_header(&header_path)?;

    if configuration == "Release" {
        info!("Copying PGO instrumentation files");
        copy_optimizer_files(solution_dir, out_dir)?;
    }

    Ok(version)
}

/// Copies every file directly under `<solution_dir>/Optimizer` into
/// `out_dir`.
///
/// A missing `Optimizer/` directory means there is nothing to stage and is
/// not an error.
fn copy_optimizer_files(solution_dir: &Path, out_dir: &Path) -> Result<()> {
    let optimizer = solution_dir.join(OPTIMIZER_DIR);
    if !optimizer.is_dir() {
        debug!("No {} directory at {}, nothing to copy", OPTIMIZER_DIR, optimizer.display());
        return Ok(());
    }

    for entry in WalkDir::new(&optimizer)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.path().is_file() {
            continue;
        }
        let dest = out_dir.join(entry.file_name());
        fs::copy(entry.path(), &dest).with_context(|| {
            format!(
                "failed to copy {} to {}",
                entry.path().display(),
                dest.display()
            )
        })?;
        debug!("Copied {} -> {}", entry.path().display(), dest.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HEADER: &str = "\
#define VERSION_MAJOR 1
#define VERSION_MINOR 4
#define VERSION_PATCH 0
#define VERSION_BUILD 1044
";

    #[test]
    fn debug_build_stamps_but_copies_nothing() {
        let solution = tempdir().unwrap();
        let out = tempdir().unwrap();
        fs::write(solution.path().join("version.h"), HEADER).unwrap();
        fs::create_dir(solution.path().join(OPTIMIZER_DIR)).unwrap();
        fs::write(solution.path().join(OPTIMIZER_DIR).join("a.pgc"), b"pgo").unwrap();

        let v = run(
            "Debug",
            "x64",
            solution.path(),
            out.path(),
            Path::new("version.h"),
        )
        .unwrap();

        assert_eq!(v.build, 1045);
        assert!(!out.path().join("a.pgc").exists());
    }

    #[test]
    fn release_build_copies_optimizer_files() {
        let solution = tempdir().unwrap();
        let out = tempdir().unwrap();
        fs::write(solution.path().join("version.h"), HEADER).unwrap();
        let optimizer = solution.path().join(OPTIMIZER_DIR);
        fs::create_dir(&optimizer).unwrap();
        fs::write(optimizer.join("a.pgc"), b"pgo-a").unwrap();
        fs::write(optimizer.join("b.pgd"), b"pgo-b").unwrap();

        run(
            "Release",
            "x64",
            solution.path(),
            out.path(),
            Path::new("version.h"),
        )
        .unwrap();

        assert_eq!(fs::read(out.path().join("a.pgc")).unwrap(), b"pgo-a");
        assert_eq!(fs::read(out.path().join("b.pgd")).unwrap(), b"pgo-b");
    }

    #[test]
    fn missing_optimizer_dir_is_not_an_error() {
        let solution = tempdir().unwrap();
        let out = tempdir().unwrap();
        fs::write(solution.path().join("version.h"), HEADER).unwrap();

        assert!(run(
            "Release",
            "Win32",
            solution.path(),
            out.path(),
            Path::new("version.h"),
        )
        .is_ok());
    }

    #[test]
    fn missing_header_propagates() {
        let solution = tempdir().unwrap();
        let out = tempdir().unwrap();

        assert!(run(
            "Debug",
            "x64",
            solution.path(),
            out.path(),
            Path::new("version.h"),
        )
        .is_err());
    }
}
