//! # Buildstamp: The Main Entry Point
//!
//! This module handles Command Line Interface (CLI) parsing, logging
//! initialization, and dispatching commands to the appropriate sub-modules.
//! It is the orchestrator of the buildstamp utility.
//!
//! The binary is invoked once per build step by the build driver (an MSBuild
//! pre-build event, or a Doxygen `INPUT_FILTER` line); the driver treats any
//! non-zero exit as a failed step.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{LevelFilter, error};
use simplelog::{Config, SimpleLogger};

mod filter;
mod invariant_ppt;
mod prebuild;
mod stamp;
mod version;

/// The primary Command Line Interface (CLI) configuration.
///
/// Uses `clap` for sub-command parsing and help generation.
#[derive(Parser)]
#[command(name = "buildstamp")]
#[command(about = "Build-support tooling: version stamping and Doxygen input filtering", long_about = None)]
struct Cli {
    /// The sub-command to execute (stamp, filter, prebuild).
    #[command(subcommand)]
    command: Option<Commands>,

    /// Turn on verbose logging.
    ///
    /// - `-v`: Debug
    /// - `-vv`: Trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Available sub-commands for the buildstamp utility.
#[derive(Subcommand)]
enum Commands {
    /// Increment the build counter and synchronize version numbers.
    ///
    /// Normally only the version header is rewritten. With `--all`, the
    /// Doxygen config, the resource script, and the project file are
    /// updated to the new version as well.
    Stamp {
        /// The version header holding the `#define VERSION_*` lines.
        #[arg(long, default_value = "version.h")]
        header: PathBuf,

        /// Update all files, not just the version header.
        #[arg(long)]
        all: bool,

        /// The Doxygen configuration file (used with --all).
        #[arg(long, default_value = "Doxyfile")]
        doxyfile: PathBuf,

        /// The resource definition script, UTF-16LE text (used with --all).
        #[arg(long, default_value = "app.rc")]
        resource: PathBuf,

        /// The project configuration file (used with --all).
        #[arg(long, default_value = "app.vcxproj")]
        vcxproj: PathBuf,
    },
    /// Filter a source file for Doxygen, linking known API keywords.
    ///
    /// The filtered text goes to standard output, which is where Doxygen
    /// expects an INPUT_FILTER to put it.
    Filter {
        /// The source file to filter.
        source: PathBuf,

        /// The keyword-link table (CSV with Name,URL,Section columns).
        #[arg(long, default_value = "API_Documentation.csv")]
        table: PathBuf,
    },
    /// Run the pre-build event for the build driver.
    ///
    /// Bumps the build counter, and for Release configurations stages the
    /// PGO instrumentation files from `Optimizer/` into the output
    /// directory.
    Prebuild {
        /// The build configuration name (e.g. Debug, Release).
        configuration: String,

        /// The platform name (e.g. x64, Win32). Logged only.
        platform: String,

        /// The solution directory all paths are resolved against.
        solution_dir: PathBuf,

        /// The build output directory.
        out_dir: PathBuf,

        /// The version header, relative to the solution directory.
        #[arg(long, default_value = "version.h")]
        header: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Determine log level based on verbosity flag
    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // Initialize logger
    // We ignore the result here as logging failure shouldn't fail the build
    let _ = SimpleLogger::init(log_level, Config::default());

    match &cli.command {
        Some(Commands::Stamp {
            header,
            all,
            doxyfile,
            resource,
            vcxproj,
        }) => {
            let targets = stamp::StampTargets {
                header: header.clone(),
                doxyfile: doxyfile.clone(),
                resource: resource.clone(),
                vcxproj: vcxproj.clone(),
            };
            match stamp::run(&targets, *all) {
                Ok(version) => println!("Build: {}", version),
                Err(e) => {
                    error!("Failed to stamp version: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Filter { source, table }) => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            if let Err(e) = filter::run(source, table, &mut out) {
                error!("Failed to filter {}: {:#}", source.display(), e);
                std::process::exit(1);
            }
        }
        Some(Commands::Prebuild {
            configuration,
            platform,
            solution_dir,
            out_dir,
            header,
        }) => match prebuild::run(configuration, platform, solution_dir, out_dir, header) {
            Ok(version) => println!("Build: {}", version),
            Err(e) => {
                error!("Pre-build event failed: {:#}", e);
                std::process::exit(1);
            }
        },
        None => {
            // Default behavior if no command: print the help message
            use clap::CommandFactory;
            let _ = Cli::command().print_help();
        }
    }
}
