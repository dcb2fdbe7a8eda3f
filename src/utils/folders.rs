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

//! Module mapping an experiment name to its fixed set of directory
//! roles below the run directory.

use std::path::{Path, PathBuf};

/// Directory roles of a single experiment.
///
/// No directory is required to exist at construction time: the raw
/// output tree is only touched when reading, and the permanent archive
/// is created on demand by the post-reader.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Folders {
    /// Name of the experiment, e.g. `FE01`.
    pub expname: String,

    /// Directory containing all experiments.
    pub rundir: PathBuf,

    /// Experiment root, holding restarts and the leg-tracking file.
    pub exp: PathBuf,

    /// Raw NEMO output written by the model.
    pub data: PathBuf,

    /// Scratch space with one subdirectory per leg (EOF inputs live here).
    pub tmp: PathBuf,

    /// Permanent archive of averaged files; the on-disk cache.
    pub perm: PathBuf,
}

impl Folders {
    pub fn new(rundir: &Path, expname: &str) -> Self {
        let exp = rundir.join(expname);

        Folders {
            expname: expname.to_owned(),
            rundir: rundir.to_owned(),
            data: exp.join("output").join("nemo"),
            tmp: exp.join("tmp"),
            perm: exp.join("post"),
            exp,
        }
    }

    /// Scratch subdirectory of one leg, zero-padded to three digits
    /// as the runtime names them.
    pub fn leg_dir(&self, leg: u32) -> PathBuf {
        self.tmp.join(format!("{:03}", leg))
    }

    /// Reference-field configuration document, shared by all
    /// experiments of the run directory.
    pub fn meanfield_file(&self) -> PathBuf {
        self.rundir.join("meanfield.yaml")
    }

    /// Leg-tracking document of the experiment.
    pub fn leginfo_file(&self) -> PathBuf {
        self.exp.join("leginfo.yml")
    }
}
