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

//! Driver of the `rollback` subcommand: rewinds an experiment to an
//! earlier leg by restoring its restart files and rewriting the leg
//! tracking document.
//!
//! The experiment directory is modified in place. The optional backup
//! of the whole experiment is the only safety net, rolling back twice
//! is otherwise irreversible.

use crate::errors::{ConfigError, RollbackError, ToolError};
use crate::utils::folders::Folders;
use log::{info, warn};
use serde_yaml::Value;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

/// Restart files living in the experiment root between legs.
const RUN_FILES: [&str; 5] = ["rstas.nc", "rstos.nc", "srf000*.????", "restart*.nc", "rcf"];

/// Files archived per leg under `restart/<leg:03>/`.
const ARCHIVED_FILES: [&str; 5] = ["rstas.nc", "rstos.nc", "srf000*.????", "rcf", "*restart*"];

#[derive(clap::Args, Debug)]
pub struct RollbackArgs {
    /// Experiment name.
    pub expname: String,

    /// Leg to roll back to.
    pub leg: u32,

    /// Create a backup of the whole experiment first (can be slow).
    #[arg(long)]
    pub backup: bool,

    /// Restore the experiment from an existing backup before rolling
    /// back.
    #[arg(long)]
    pub rerun: bool,
}

pub fn run(rundir: &Path, args: &RollbackArgs) -> Result<(), ToolError> {
    let dirs = Folders::new(rundir, &args.expname);
    let backup = rundir.join(format!("{}-backup", args.expname));

    if args.rerun {
        if !backup.is_dir() {
            return Err(RollbackError::MissingBackup(backup).into());
        }
        info!("Restoring the experiment from {}", backup.display());
        copy_tree(&backup, &dirs.exp).map_err(RollbackError::Io)?;
    }

    if args.backup {
        if backup.is_dir() {
            info!("Backup directory found, no need to recreate it");
        } else {
            info!("Creating a backup, it can be slow ...");
            copy_tree(&dirs.exp, &backup).map_err(RollbackError::Io)?;
        }
    }

    clean_run_files(&dirs.exp)?;

    let (current_year, target_year) = rewind_leginfo(&dirs.leginfo_file(), args.leg)?;

    restore_archived(&dirs, args.leg)?;

    remove_output_years(&dirs.exp.join("output"), target_year, current_year)?;

    info!("Experiment {} rolled back to leg {}", args.expname, args.leg);
    Ok(())
}

/// Removes the inter-leg restart files from the experiment root.
fn clean_run_files(exp: &Path) -> Result<(), RollbackError> {
    for entry in fs::read_dir(exp)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if RUN_FILES.iter().any(|p| wildcard_match(p, &name)) {
            info!("Removing {}", entry.path().display());
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Rewrites the leg tracking document to the requested leg, shifting
/// the start date by the year delta. Returns the years of the current
/// and of the target start dates. Rolling forward is refused.
fn rewind_leginfo(path: &Path, leg: u32) -> Result<(i32, i32), RollbackError> {
    let text = fs::read_to_string(path).map_err(ConfigError::CantOpenFile)?;
    let mut doc: Value = serde_yaml::from_str(&text).map_err(ConfigError::CantDeserialize)?;

    let node = doc
        .get_mut("base.context")
        .and_then(|v| v.get_mut("experiment"))
        .and_then(|v| v.get_mut("schedule"))
        .and_then(|v| v.get_mut("leg"))
        .ok_or(RollbackError::MalformedLegInfo("schedule leg section"))?;

    let current = node
        .get("num")
        .and_then(Value::as_u64)
        .ok_or(RollbackError::MalformedLegInfo("leg number"))? as u32;
    let start = node
        .get("start")
        .and_then(Value::as_str)
        .ok_or(RollbackError::MalformedLegInfo("leg start date"))?
        .to_owned();

    let current_year: i32 = start
        .get(..4)
        .and_then(|y| y.parse().ok())
        .ok_or(RollbackError::MalformedLegInfo("leg start date"))?;

    if leg > current {
        return Err(RollbackError::ForwardRollback {
            requested: leg,
            current,
        });
    }
    if leg == current {
        info!("Nothing to do on the leg information file");
        return Ok((current_year, current_year));
    }

    let target_year = current_year - (current - leg) as i32;
    let new_start = format!("{:04}{}", target_year, &start[4..]);

    info!("Updating the leg information to leg number {}", leg);
    node["num"] = Value::from(u64::from(leg));
    node["start"] = Value::from(new_start);

    let out = serde_yaml::to_string(&doc).map_err(ConfigError::CantDeserialize)?;
    fs::write(path, out).map_err(ConfigError::CantOpenFile)?;

    Ok((current_year, target_year))
}

/// Brings the archived restart files of the target leg back into the
/// experiment root. Coupler files are copied, atmosphere and ocean
/// restarts are symlinked; the NEMO names lose their `<exp>_<step>_`
/// prefix. Files already present are left alone.
fn restore_archived(dirs: &Folders, leg: u32) -> Result<(), RollbackError> {
    let archive = dirs.exp.join("restart").join(format!("{:03}", leg));
    if !archive.is_dir() {
        warn!("No restart archive at {}", archive.display());
        return Ok(());
    }

    let mut files: Vec<PathBuf> = fs::read_dir(&archive)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    files.sort();

    for file in files {
        let name = match file.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_owned(),
            None => continue,
        };
        if !ARCHIVED_FILES.iter().any(|p| wildcard_match(p, &name)) {
            continue;
        }

        let target = if name.contains("restart") && !name.starts_with("restart") {
            // X1_00000192_restart_ice.nc -> restart_ice.nc
            let stripped: Vec<&str> = name.splitn(3, '_').collect();
            dirs.exp.join(stripped.last().copied().unwrap_or(name.as_str()))
        } else {
            dirs.exp.join(&name)
        };

        if target.is_file() || target.is_symlink() {
            continue;
        }

        if matches!(name.as_str(), "rstas.nc" | "rstos.nc" | "rcf") {
            info!("Copying restart {}", file.display());
            fs::copy(&file, &target)?;
        } else {
            info!("Linking restart {}", file.display());
            symlink(&file, &target)?;
        }
    }

    Ok(())
}

/// Deletes raw output files of the years undone by the rollback.
fn remove_output_years(output: &Path, from_year: i32, to_year: i32) -> Result<(), RollbackError> {
    if !output.is_dir() {
        return Ok(());
    }

    for year in from_year..to_year {
        let pattern = format!("*{}*", year);
        for component in fs::read_dir(output)? {
            let component = component?.path();
            if !component.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&component)? {
                let entry = entry?;
                let name = entry.file_name();
                if !entry.file_type()?.is_file() {
                    continue;
                }
                if wildcard_match(&pattern, &name.to_string_lossy()) {
                    info!("Removing output file {}", entry.path().display());
                    fs::remove_file(entry.path())?;
                }
            }
        }
    }

    Ok(())
}

/// Shell-style matcher for the restart file patterns, supporting `*`
/// and `?` only.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    match_from(&p, &n)
}

fn match_from(pattern: &[char], name: &[char]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some(('*', rest)) => {
            (0..=name.len()).any(|skip| match_from(rest, &name[skip..]))
        }
        Some(('?', rest)) => match name.split_first() {
            Some((_, tail)) => match_from(rest, tail),
            None => false,
        },
        Some((c, rest)) => match name.split_first() {
            Some((first, tail)) => first == c && match_from(rest, tail),
            None => false,
        },
    }
}

/// Recursive copy keeping symlinks as symlinks, as the experiment
/// tree relies on links into the restart archive.
fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else if file_type.is_symlink() {
            if !target.is_symlink() {
                symlink(fs::read_link(entry.path())?, &target)?;
            }
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}
