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

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error returned by every tool driver.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Error while reading configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Error while reading input data: {0}")]
    Input(#[from] InputError),

    #[error("Error while computing diagnostic: {0}")]
    Diagnostic(#[from] DiagnosticError),

    #[error("Error while projecting EOFs: {0}")]
    Eof(#[from] EofError),

    #[error("Error while rolling back restart: {0}")]
    Rollback(#[from] RollbackError),
}

/// Errors raised while parsing YAML documents (reference-field
/// configuration and leg-tracking file).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot open configuration file: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot deserialize configuration file: {0}")]
    CantDeserialize(#[from] serde_yaml::Error),

    #[error("Configuration component is out of bounds: {0}")]
    OutOfBounds(&'static str),
}

/// Errors raised while reading raw model output or cached products.
///
/// A missing file or variable is always fatal: there is no fallback
/// raw source and no automatic retry.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Cannot access input file: {0}")]
    CantAccessFile(#[from] std::io::Error),

    #[error("NetCDF library error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("Input file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Variable {0} not found in input dataset")]
    MissingVariable(String),

    #[error("Coordinate {0} not found in input dataset")]
    MissingCoordinate(&'static str),

    #[error("Cannot parse time units attribute {0:?}")]
    BadTimeUnits(String),

    #[error("Unexpected shape of input variable {0}")]
    IncorrectShape(String),

    #[error("rebuild_nemo exited with {0}")]
    RebuildFailed(String),
}

/// Errors raised by the averaging engine and the cached post-reader.
#[derive(Error, Debug)]
pub enum DiagnosticError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Variable {0} is not listed in the catalogue")]
    UnknownVariable(String),

    #[error("Unknown diagnostic kind {0:?}")]
    UnknownDiagnostic(String),

    #[error("Unknown metric tag {0:?}")]
    UnknownMetric(String),

    #[error("Unknown subregion {0:?}")]
    UnknownSubregion(String),

    #[error("Diagnostic {diagname} is undefined for {dim} variable {varname}")]
    UnsupportedDiagnostic {
        diagname: &'static str,
        dim: &'static str,
        varname: String,
    },

    #[error("Reference field not found at {0}; compute it first with metric=base")]
    MissingReference(PathBuf),

    #[error("Shape of field does not match shape of the reference field")]
    ReferenceShapeMismatch,
}

/// Errors raised by the EOF projector.
#[derive(Error, Debug)]
pub enum EofError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Variable {0} is not listed in the catalogue")]
    UnknownVariable(String),

    #[error("Unknown projection mode {0:?}")]
    UnknownMode(String),

    #[error("cdo invocation failed: {0}")]
    Cdo(String),

    #[error("Linear fit needs at least two finite samples ({0} found)")]
    DegenerateFit(usize),
}

/// Errors raised by the restart rollback tool.
#[derive(Error, Debug)]
pub enum RollbackError {
    #[error("Filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Leg information file is malformed: missing {0}")]
    MalformedLegInfo(&'static str),

    #[error("Cannot go forward in time: requested leg {requested} is past leg {current}")]
    ForwardRollback { requested: u32, current: u32 },

    #[error("Backup directory {0} does not exist; create it first with --backup")]
    MissingBackup(PathBuf),
}
