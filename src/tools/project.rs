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

//! Driver of the `project` subcommand.

use crate::catalogue::catalogue;
use crate::errors::{ConfigError, ToolError};
use crate::means::eof::{project_eofs, EofMode, EofRequest};
use crate::utils::folders::Folders;
use log::info;
use std::path::Path;

#[derive(clap::Args, Debug)]
pub struct ProjectArgs {
    /// Experiment name.
    pub expname: String,

    /// Variable to project.
    pub varname: String,

    /// Leg whose scratch directory holds the EOF decomposition.
    pub endleg: u32,

    /// Number of legs in the fitting window.
    pub yearspan: u32,

    /// Years between the end of the window and the forecast.
    pub yearleap: i32,

    /// Projection mode: full, first, reco, frac or fit.
    #[arg(long, default_value = "full")]
    pub mode: String,
}

pub fn run(rundir: &Path, args: &ProjectArgs) -> Result<(), ToolError> {
    if args.yearspan == 0 || args.yearspan > args.endleg {
        return Err(ConfigError::OutOfBounds(
            "Year span must cover at least one leg and start after the first leg",
        )
        .into());
    }

    let dirs = Folders::new(rundir, &args.expname);
    let vars = catalogue();

    let request = EofRequest {
        varname: args.varname.clone(),
        endleg: args.endleg,
        yearspan: args.yearspan,
        yearleap: args.yearleap,
        mode: EofMode::from_tag(&args.mode)?,
    };

    let path = project_eofs(&dirs, &vars, &request)?;
    info!("Projected field written to {}", path.display());

    Ok(())
}
