/*
Copyright 2024 CNR-ISAC

This file is part of osprey.

osprey is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

osprey is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with osprey. If not, see https://www.gnu.org/licenses/.
*/

//! osprey is a collection of post-processing utilities for the ocean
//! component (NEMO) of EC-Earth4: averaging raw model output into
//! reusable diagnostic files, projecting the ocean state forward in
//! time with EOFs and rolling back an experiment to an earlier leg.
//!
//! All heavy data lives on disk as NetCDF; the permanent archive of
//! averaged files doubles as the cache between invocations.

mod catalogue;
mod constants;
mod data;
mod errors;
mod means;
mod tools;
mod utils;

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

type Float = f64;

/// Command line interface of the osprey toolkit.
///
/// Every subcommand operates on one experiment below the run
/// directory, which can also be set once via `OSPREY_RUNDIR`.
#[derive(Parser, Debug)]
#[command(name = "osprey", version, about = "EC-Earth4/NEMO post-processing toolkit")]
struct Cli {
    /// Directory containing the experiment folders.
    #[arg(long, env = "OSPREY_RUNDIR")]
    rundir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read raw output, average it and cache the diagnostic product.
    Postread(tools::postread::PostreadArgs),
    /// Project a field forward in time using pre-computed EOFs.
    Project(tools::project::ProjectArgs),
    /// Roll an experiment back to an earlier leg.
    Rollback(tools::rollback::RollbackArgs),
}

/// The main program function.
///
/// To provide meaningful and high-quality error messages the
/// `env_logger` needs to be initiated before any log messages are
/// possible to occur, so the logger comes first and the tools after.
fn main() -> ExitCode {
    #[cfg(not(feature = "debug"))]
    let logger_env = Env::new().filter_or("OSPREY_LOG_LEVEL", "info");

    #[cfg(feature = "debug")]
    let logger_env = Env::new().filter_or("OSPREY_LOG_LEVEL", "debug");

    env_logger::Builder::from_env(logger_env)
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Postread(args) => tools::postread::run(&cli.rundir, &args),
        Command::Project(args) => tools::project::run(&cli.rundir, &args),
        Command::Rollback(args) => tools::rollback::run(&cli.rundir, &args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Tool execution failed with error: {}", err);
            ExitCode::FAILURE
        }
    }
}
