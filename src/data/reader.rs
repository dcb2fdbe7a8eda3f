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

//! Module reading raw model output into gridded fields.
//!
//! Two sources are supported: the monthly mean files written by the
//! model (one per year and grid) and rebuilt restart checkpoints (one
//! per leg, reassembled from per-process fragments by the external
//! `rebuild_nemo` tool when missing).

use crate::catalogue::{self, Dimensionality, NemoGrid, VarDescriptor};
use crate::data::field::Field;
use crate::data::{attr_string, open_dataset, read_dyn, read_time, require_variable};
use crate::errors::{DiagnosticError, InputError};
use crate::means::regrid::regrid_to_t;
use crate::utils::folders::Folders;
use crate::utils::time::{leg_from_year, year_from_leg};
use crate::Float;
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayD, Axis, Ix1, Ix2};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Raw dataset collection a field can be read from.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RawSource {
    /// Monthly mean output files.
    Nemo,
    /// Rebuilt restart checkpoints.
    Restart,
}

/// Reads a variable from the requested raw source for a year range.
pub fn read_raw(
    dirs: &Folders,
    vars: &FxHashMap<&'static str, VarDescriptor>,
    varname: &str,
    startyear: i32,
    endyear: i32,
    source: RawSource,
) -> Result<Field, DiagnosticError> {
    match source {
        RawSource::Nemo => read_nemo(dirs, vars, varname, startyear, endyear),
        RawSource::Restart => read_restarts(dirs, vars, varname, startyear, endyear),
    }
}

/// Reads a variable from the monthly mean output, resolving derived
/// quantities through the catalogue recipe registry.
pub fn read_nemo(
    dirs: &Folders,
    vars: &FxHashMap<&'static str, VarDescriptor>,
    varname: &str,
    startyear: i32,
    endyear: i32,
) -> Result<Field, DiagnosticError> {
    let desc = catalogue::lookup(vars, varname)?;

    let recipe = match &desc.recipe {
        None => return read_plain(dirs, varname, desc, startyear, endyear),
        Some(recipe) => recipe,
    };

    debug!("Resolving derived variable {} from {:?}", varname, recipe.dependencies);

    let mut parts: Vec<ArrayD<Float>> = Vec::with_capacity(recipe.dependencies.len());
    let mut template: Option<Field> = None;

    for dep in recipe.dependencies {
        let dep_desc = catalogue::lookup(vars, dep)?;
        let dep_field = read_plain(dirs, dep, dep_desc, startyear, endyear)?;

        parts.push(regrid_to_t(&dep_field.values, dep_desc.grid, dep_desc.dim));
        template.get_or_insert(dep_field);
    }

    // coordinates are taken from the first dependency, which after
    // regridding sits on T points
    let template = template.expect("recipe with no dependencies");

    Ok(Field {
        name: varname.to_owned(),
        units: desc.units.to_owned(),
        long_name: desc.long_name.to_owned(),
        dim: desc.dim,
        values: (recipe.combine)(&parts),
        time: template.time,
        depth: template.depth,
        lat: template.lat,
        lon: template.lon,
        area: template.area,
    })
}

/// Reads a plain catalogue variable, one monthly mean file per year,
/// concatenated along time. Every missing file is fatal.
fn read_plain(
    dirs: &Folders,
    varname: &str,
    desc: &VarDescriptor,
    startyear: i32,
    endyear: i32,
) -> Result<Field, DiagnosticError> {
    let mut chunks: Vec<ArrayD<Float>> = Vec::new();
    let mut time: Vec<NaiveDateTime> = Vec::new();
    let mut coords: Option<(Option<Array1<Float>>, Array2<Float>, Array2<Float>, Array2<Float>)> =
        None;
    let mut attrs: Option<(String, String)> = None;

    for year in startyear..=endyear {
        let path = output_file(dirs, desc.grid, year);
        debug!("Reading {}", path.display());

        let file = open_dataset(&path)?;
        let var = require_variable(&file, varname)?;

        let values = read_dyn(&var).map_err(DiagnosticError::Input)?;
        let expected = match desc.dim {
            Dimensionality::TwoD => 3,
            Dimensionality::ThreeD => 4,
        };
        if values.ndim() != expected {
            return Err(InputError::IncorrectShape(varname.to_owned()).into());
        }

        time.extend(read_time(&file)?);
        chunks.push(values);

        if coords.is_none() {
            coords = Some(read_coordinates(&file, desc)?);
            attrs = Some((
                attr_string(&var, "units").unwrap_or_else(|| desc.units.to_owned()),
                attr_string(&var, "long_name").unwrap_or_else(|| desc.long_name.to_owned()),
            ));
        }
    }

    let views: Vec<_> = chunks.iter().map(|c| c.view()).collect();
    let values = ndarray::concatenate(Axis(0), &views)
        .map_err(|_| InputError::IncorrectShape(varname.to_owned()))?;

    let (depth, lat, lon, area) = coords.ok_or_else(|| {
        DiagnosticError::Input(InputError::FileNotFound(output_file(dirs, desc.grid, startyear)))
    })?;
    let (units, long_name) = attrs.expect("attributes read together with coordinates");

    info!(
        "Loaded {} [{}-{}]: {} time steps",
        varname,
        startyear,
        endyear,
        time.len()
    );

    Ok(Field {
        name: varname.to_owned(),
        units,
        long_name,
        dim: desc.dim,
        values,
        time,
        depth,
        lat,
        lon,
        area,
    })
}

/// Monthly mean file of one year on one grid.
fn output_file(dirs: &Folders, grid: NemoGrid, year: i32) -> PathBuf {
    dirs.data.join(format!(
        "{}_oce_1m_{}_{}-{}.nc",
        dirs.expname,
        grid.letter(),
        year,
        year
    ))
}

/// Reads the coordinate fields accompanying a variable: depth (3D
/// only), latitude, longitude and the horizontal cell areas.
fn read_coordinates(
    file: &netcdf::File,
    desc: &VarDescriptor,
) -> Result<(Option<Array1<Float>>, Array2<Float>, Array2<Float>, Array2<Float>), DiagnosticError> {
    let lat = read_coord_raw(file, &["nav_lat", "lat"])?
        .ok_or(InputError::MissingCoordinate("lat"))?;
    let lon = read_coord_raw(file, &["nav_lon", "lon"])?
        .ok_or(InputError::MissingCoordinate("lon"))?;
    let (lat, lon) = horizontal_grid(lat, lon)?;

    let depth = match desc.dim {
        Dimensionality::TwoD => None,
        Dimensionality::ThreeD => Some(
            read_coord_1d(file, &[desc.grid.depth_name(), "nav_lev", "z"])
                .ok_or(InputError::MissingCoordinate("depth"))?,
        ),
    };

    // without cell areas in the file the reductions fall back to
    // uniform weights; a present area must match the grid
    let area = match read_coord_raw(file, &["area", "e1te2t"])? {
        Some(area) => {
            let area = area
                .into_dimensionality::<Ix2>()
                .map_err(|_| InputError::IncorrectShape("area".to_owned()))?;
            if area.dim() != lat.dim() {
                return Err(InputError::IncorrectShape("area".to_owned()).into());
            }
            area
        }
        None => Array2::ones(lat.dim()),
    };

    Ok((depth, lat, lon, area))
}

/// Normalizes the horizontal coordinates to the 2-D curvilinear
/// convention: a pair of 2-D fields passes through, a pair of plain
/// axes is expanded into a `(ny, nx)` grid.
fn horizontal_grid(
    lat: ArrayD<Float>,
    lon: ArrayD<Float>,
) -> Result<(Array2<Float>, Array2<Float>), InputError> {
    match (lat.ndim(), lon.ndim()) {
        (2, 2) => {
            let lat = lat.into_dimensionality::<Ix2>().expect("checked 2-D");
            let lon = lon.into_dimensionality::<Ix2>().expect("checked 2-D");
            if lat.dim() != lon.dim() {
                return Err(InputError::IncorrectShape("nav_lat/nav_lon".to_owned()));
            }
            Ok((lat, lon))
        }
        (1, 1) => {
            let lat = lat.into_dimensionality::<Ix1>().expect("checked 1-D");
            let lon = lon.into_dimensionality::<Ix1>().expect("checked 1-D");
            let (ny, nx) = (lat.len(), lon.len());
            Ok((
                Array2::from_shape_fn((ny, nx), |(j, _)| lat[j]),
                Array2::from_shape_fn((ny, nx), |(_, i)| lon[i]),
            ))
        }
        _ => Err(InputError::IncorrectShape("nav_lat/nav_lon".to_owned())),
    }
}

fn read_coord_1d(file: &netcdf::File, names: &[&str]) -> Option<Array1<Float>> {
    for name in names {
        if let Some(var) = file.variable(name) {
            let values = read_dyn(&var).ok()?;
            return values.into_dimensionality::<Ix1>().ok();
        }
    }

    None
}

/// Reads the first present coordinate variable of a candidate list,
/// without constraining its dimensionality.
fn read_coord_raw(file: &netcdf::File, names: &[&str]) -> Result<Option<ArrayD<Float>>, InputError> {
    for name in names {
        if let Some(var) = file.variable(name) {
            return Ok(Some(read_dyn(&var)?));
        }
    }

    Ok(None)
}

/// Reads a variable from rebuilt restart checkpoints over a range of
/// legs, rebuilding the missing ones from per-process fragments.
pub fn read_restarts(
    dirs: &Folders,
    vars: &FxHashMap<&'static str, VarDescriptor>,
    varname: &str,
    startyear: i32,
    endyear: i32,
) -> Result<Field, DiagnosticError> {
    let desc = catalogue::lookup(vars, varname)?;
    let restart_var = restart_name(varname);

    let startleg = leg_from_year(startyear)?;
    let endleg = leg_from_year(endyear)?;

    let mut chunks: Vec<ArrayD<Float>> = Vec::new();
    let mut time: Vec<NaiveDateTime> = Vec::new();
    let mut coords: Option<(Option<Array1<Float>>, Array2<Float>, Array2<Float>, Array2<Float>)> =
        None;

    for leg in startleg..=endleg {
        let path = dirs.leg_dir(leg).join("restart.nc");
        if !path.is_file() {
            warn!("Restart file not found, rebuilding leg {:03}", leg);
            rebuild(dirs, leg)?;
        }

        let file = open_dataset(&path)?;
        let var = require_variable(&file, restart_var)?;

        // restarts carry a single snapshot without a time axis
        let mut values = read_dyn(&var).map_err(DiagnosticError::Input)?;
        let expected = match desc.dim {
            Dimensionality::TwoD => 2,
            Dimensionality::ThreeD => 3,
        };
        if values.ndim() == expected + 1 && values.shape()[0] == 1 {
            values = values.remove_axis(Axis(0));
        }
        if values.ndim() != expected {
            return Err(InputError::IncorrectShape(restart_var.to_owned()).into());
        }

        chunks.push(values.insert_axis(Axis(0)));
        time.push(
            NaiveDate::from_ymd_opt(year_from_leg(leg), 1, 1)
                .expect("valid leg year")
                .and_hms_opt(0, 0, 0)
                .expect("valid midnight"),
        );

        if coords.is_none() {
            coords = Some(read_coordinates(&file, desc)?);
        }
    }

    let views: Vec<_> = chunks.iter().map(|c| c.view()).collect();
    let values = ndarray::concatenate(Axis(0), &views)
        .map_err(|_| InputError::IncorrectShape(restart_var.to_owned()))?;

    let (depth, lat, lon, area) = coords.ok_or_else(|| {
        DiagnosticError::Input(InputError::FileNotFound(dirs.leg_dir(startleg).join("restart.nc")))
    })?;

    Ok(Field {
        name: varname.to_owned(),
        units: desc.units.to_owned(),
        long_name: desc.long_name.to_owned(),
        dim: desc.dim,
        values,
        time,
        depth,
        lat,
        lon,
        area,
    })
}

/// Prognostic name of a catalogue variable inside a restart file.
fn restart_name(varname: &str) -> &str {
    match varname {
        "thetao" => "tn",
        "so" => "sn",
        "zos" => "sshn",
        other => other,
    }
}

/// Reassembles the restart of one leg from its per-process fragments
/// by shelling out to the NEMO rebuild tool.
fn rebuild(dirs: &Folders, leg: u32) -> Result<(), DiagnosticError> {
    let leg_dir = dirs.leg_dir(leg);
    let base = format!("{}_restart", dirs.expname);

    let fragments = count_fragments(&leg_dir, &base).map_err(InputError::CantAccessFile)?;
    if fragments == 0 {
        return Err(
            InputError::FileNotFound(leg_dir.join(format!("{}_0000.nc", base))).into(),
        );
    }

    info!("Rebuilding {} from {} fragments in {}", base, fragments, leg_dir.display());

    let status = Command::new("rebuild_nemo")
        .current_dir(&leg_dir)
        .arg(&base)
        .arg(fragments.to_string())
        .status()
        .map_err(InputError::CantAccessFile)?;

    if !status.success() {
        return Err(InputError::RebuildFailed(status.to_string()).into());
    }

    std::fs::rename(leg_dir.join(format!("{}.nc", base)), leg_dir.join("restart.nc"))
        .map_err(InputError::CantAccessFile)?;

    Ok(())
}

fn count_fragments(leg_dir: &Path, base: &str) -> std::io::Result<usize> {
    let mut count = 0;

    for entry in std::fs::read_dir(leg_dir)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(base) && name.ends_with(".nc") && name.len() > base.len() + 3 {
            count += 1;
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::catalogue;
    use crate::means::{horizontal_mean, subregion_weights, Subregion};
    use float_cmp::assert_approx_eq;
    use ndarray::arr1;
    use std::fs;
    use tempfile::tempdir;

    /// Monthly mean file on a rectangular grid with plain 1-D
    /// latitude/longitude axes instead of curvilinear fields.
    fn write_rectilinear(dirs: &Folders, varname: &str, year: i32) {
        fs::create_dir_all(&dirs.data).unwrap();
        let path = dirs
            .data
            .join(format!("{}_oce_1m_T_{}-{}.nc", dirs.expname, year, year));

        let mut file = netcdf::create(&path).unwrap();
        file.add_dimension("time_counter", 1).unwrap();
        file.add_dimension("y", 2).unwrap();
        file.add_dimension("x", 3).unwrap();

        let mut time = file
            .add_variable::<Float>("time_counter", &["time_counter"])
            .unwrap();
        time.put_attribute("units", format!("days since {}-01-01 00:00:00", year).as_str())
            .unwrap();
        time.put_values(&[15.5], ..).unwrap();

        let mut lat = file.add_variable::<Float>("lat", &["y"]).unwrap();
        lat.put_values(&[-10.0, 10.0], ..).unwrap();
        let mut lon = file.add_variable::<Float>("lon", &["x"]).unwrap();
        lon.put_values(&[0.0, 120.0, 240.0], ..).unwrap();

        let mut var = file
            .add_variable::<Float>(varname, &["time_counter", "y", "x"])
            .unwrap();
        var.put_values(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], ..).unwrap();
    }

    #[test]
    fn one_dimensional_axes_expand_to_the_full_grid() {
        let rundir = tempdir().unwrap();
        let dirs = Folders::new(rundir.path(), "X1");
        let vars = catalogue();

        write_rectilinear(&dirs, "sos", 1990);
        let field = read_nemo(&dirs, &vars, "sos", 1990, 1990).unwrap();

        // ny and nx differ; every coordinate field must follow the
        // variable shape, not a square of either axis
        assert_eq!(field.values.shape(), &[1, 2, 3]);
        assert_eq!(field.lat.dim(), (2, 3));
        assert_eq!(field.lon.dim(), (2, 3));
        assert_eq!(field.area.dim(), (2, 3));
        assert_approx_eq!(Float, field.lat[[0, 2]], -10.0, epsilon = 1e-12);
        assert_approx_eq!(Float, field.lon[[1, 1]], 120.0, epsilon = 1e-12);

        // the reductions accept the expanded grid
        let weights = subregion_weights(&field.area, &field.lat, Subregion::Global);
        let mean = horizontal_mean(&field.values, &weights);
        assert_approx_eq!(Float, mean[[0]], 3.5, epsilon = 1e-12);
    }

    #[test]
    fn mixed_coordinate_ranks_are_rejected() {
        let two_d = ndarray::Array2::<Float>::zeros((2, 3)).into_dyn();
        let one_d = arr1(&[0.0, 1.0, 2.0]).into_dyn();

        assert!(matches!(
            horizontal_grid(two_d.clone(), one_d.clone()),
            Err(InputError::IncorrectShape(_))
        ));
        assert!(matches!(
            horizontal_grid(one_d, two_d),
            Err(InputError::IncorrectShape(_))
        ));
    }

    #[test]
    fn restart_years_before_the_run_are_rejected() {
        let rundir = tempdir().unwrap();
        let dirs = Folders::new(rundir.path(), "X1");
        let vars = catalogue();

        assert!(matches!(
            read_restarts(&dirs, &vars, "thetao", 1950, 1951),
            Err(DiagnosticError::Config(_))
        ));
    }
}
