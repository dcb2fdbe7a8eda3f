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

//! Driver of the `postread` subcommand.

use crate::catalogue::catalogue;
use crate::data::postreader::{post_read, PostReadRequest, VarLabel};
use crate::data::product::DiagKind;
use crate::data::reader::RawSource;
use crate::errors::{ConfigError, ToolError};
use crate::means::Metric;
use crate::utils::folders::Folders;
use log::info;
use std::path::Path;

#[derive(clap::Args, Debug)]
pub struct PostreadArgs {
    /// Experiment name.
    pub expname: String,

    /// Variable label, optionally with a subregion
    /// (e.g. `thetao` or `thetao-north`).
    pub varlabel: String,

    /// Diagnostic kind: timeseries, profile, hovmoller, map or field.
    pub diag: String,

    /// First year of the averaging window.
    pub startyear: i32,

    /// Last year of the averaging window.
    pub endyear: i32,

    /// Metric against the reference field: base, diff, rel or var.
    #[arg(long, default_value = "base")]
    pub metric: String,

    /// Read from rebuilt restart checkpoints instead of monthly means.
    #[arg(long)]
    pub restart: bool,

    /// Recompute even when a cached file exists.
    #[arg(long)]
    pub replace: bool,
}

pub fn run(rundir: &Path, args: &PostreadArgs) -> Result<(), ToolError> {
    if args.startyear > args.endyear {
        return Err(ConfigError::OutOfBounds("Start year is past the end year").into());
    }

    let dirs = Folders::new(rundir, &args.expname);
    let vars = catalogue();

    let request = PostReadRequest {
        startyear: args.startyear,
        endyear: args.endyear,
        varlabel: VarLabel::parse(&args.varlabel)?,
        diag: DiagKind::from_tag(&args.diag)?,
        replace: args.replace,
        metric: Metric::from_tag(&args.metric)?,
        source: if args.restart {
            RawSource::Restart
        } else {
            RawSource::Nemo
        },
    };

    let product = post_read(&dirs, &vars, &request)?;
    info!(
        "Diagnostic {} of {} [{}] ready in the permanent archive",
        args.diag, product.varlabel, product.units
    );

    Ok(())
}
