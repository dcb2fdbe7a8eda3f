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

//! Module with the EOF projector: extrapolates a field into the
//! future from a precomputed EOF decomposition, or reconstructs it
//! from the basis as a fidelity check.
//!
//! The decomposition itself is produced upstream by cdo; this module
//! only consumes its output files under the leg scratch directory.

use crate::catalogue::{Dimensionality, NemoGrid, VarDescriptor};
use crate::constants::EOF_VARIANCE_THRESHOLD;
use crate::data::{attr_string, open_dataset, read_dyn, read_time, require_variable};
use crate::errors::{EofError, InputError};
use crate::means::{linear_fit, polyval1};
use crate::utils::folders::Folders;
use crate::utils::remove_existing_file;
use crate::utils::time::{decimal_year, decimal_years, forecast_date, forecast_year, year_from_leg};
use crate::Float;
use log::info;
use ndarray::{Array1, Array2, ArrayD, Axis};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// How the basis is combined into the projected field.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EofMode {
    /// Extrapolate every coefficient series to the forecast year.
    Full,
    /// As `Full`, leading mode only.
    First,
    /// Rebuild the last observed frame from the basis, no
    /// extrapolation.
    Reco,
    /// As `Full`, restricted to the leading modes carrying most of the
    /// variance.
    Frac,
    /// Ignore the basis, fit the raw field point by point.
    Fit,
}

impl EofMode {
    pub fn from_tag(tag: &str) -> Result<Self, EofError> {
        match tag {
            "full" => Ok(EofMode::Full),
            "first" => Ok(EofMode::First),
            "reco" => Ok(EofMode::Reco),
            "frac" => Ok(EofMode::Frac),
            "fit" => Ok(EofMode::Fit),
            other => Err(EofError::UnknownMode(other.to_owned())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EofMode::Full => "full",
            EofMode::First => "first",
            EofMode::Reco => "reco",
            EofMode::Frac => "frac",
            EofMode::Fit => "fit",
        }
    }
}

/// One projection request.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EofRequest {
    pub varname: String,
    pub endleg: u32,
    pub yearspan: u32,
    pub yearleap: i32,
    pub mode: EofMode,
}

/// The EOF basis: slices stacked along the leading axis, plus the
/// horizontal coordinates they are defined on.
struct Pattern {
    values: ArrayD<Float>,
    lat: Array2<Float>,
    lon: Array2<Float>,
    depth: Option<Array1<Float>>,
    units: String,
    long_name: String,
}

impl Pattern {
    fn n_modes(&self) -> usize {
        self.values.shape()[0]
    }

    fn slice(&self, i: usize) -> ArrayD<Float> {
        self.values.index_axis(Axis(0), i).to_owned()
    }
}

/// Projects a field to the forecast year and writes the result to
/// `<var>_eof.nc` under the scratch directory of the final leg.
/// Returns the path of the written file.
pub fn project_eofs(
    dirs: &Folders,
    vars: &FxHashMap<&'static str, VarDescriptor>,
    req: &EofRequest,
) -> Result<PathBuf, EofError> {
    let desc = vars
        .get(req.varname.as_str())
        .ok_or_else(|| EofError::UnknownVariable(req.varname.clone()))?;

    let startleg = req.endleg + 1 - req.yearspan;
    let startyear = year_from_leg(startleg);
    let endyear = year_from_leg(req.endleg);
    let neofs = (endyear - startyear + 1) as usize;

    let foreyear = forecast_year(endyear, req.yearleap);
    let foretime = decimal_year(&forecast_date(foreyear));
    info!("Time window: {}-{} ({} modes)", startyear, endyear, neofs);
    info!("Forecast year: {}", foreyear);

    let leg_dir = dirs.leg_dir(req.endleg);
    let field = match req.mode {
        EofMode::Full => {
            let pattern = read_pattern(&leg_dir, &req.varname, desc)?;
            accumulate(&leg_dir, &req.varname, &pattern, neofs, Some(foretime))?
        }
        EofMode::First => {
            let pattern = read_pattern(&leg_dir, &req.varname, desc)?;
            accumulate(&leg_dir, &req.varname, &pattern, 1, Some(foretime))?
        }
        EofMode::Reco => {
            let pattern = read_pattern(&leg_dir, &req.varname, desc)?;
            accumulate(&leg_dir, &req.varname, &pattern, neofs, None)?
        }
        EofMode::Frac => {
            let pattern = read_pattern(&leg_dir, &req.varname, desc)?;
            let weights = variance_weights(&leg_dir, &req.varname)?;
            let feofs = modes_for_threshold(&weights, EOF_VARIANCE_THRESHOLD).min(neofs);
            info!("Modes retained by variance fraction: {}", feofs);
            accumulate(&leg_dir, &req.varname, &pattern, feofs, Some(foretime))?
        }
        EofMode::Fit => fit_raw(&leg_dir, &req.varname, desc, foretime)?,
    };

    let path = leg_dir.join(format!("{}_eof.nc", req.varname));
    write_eof(&path, &req.varname, &field, foretime)?;

    Ok(path)
}

/// Sums `theta_i * pattern_i` over the first `n` modes. With a
/// forecast time each theta is the degree-1 extrapolation of the
/// coefficient series; without one it is the last observed
/// coefficient.
fn accumulate(
    leg_dir: &Path,
    varname: &str,
    pattern: &Pattern,
    n: usize,
    foretime: Option<Float>,
) -> Result<Pattern, EofError> {
    let mut values = ArrayD::zeros(pattern.slice(0).raw_dim());

    for i in 0..n.min(pattern.n_modes()) {
        let filename = leg_dir.join(format!("{}_series_{:05}.nc", varname, i));
        info!("Reading coefficient series {}", filename.display());
        let (time, series) = read_series(&filename, varname)?;

        let theta = match foretime {
            Some(t) => {
                let (slope, intercept) = linear_fit(&time, &series)?;
                polyval1(slope, intercept, t)
            }
            None => *series.last().ok_or(EofError::DegenerateFit(0))?,
        };

        values = values + pattern.slice(i) * theta;
    }

    Ok(Pattern {
        values,
        lat: pattern.lat.clone(),
        lon: pattern.lon.clone(),
        depth: pattern.depth.clone(),
        units: pattern.units.clone(),
        long_name: pattern.long_name.clone(),
    })
}

/// Degree-1 fit of the raw field, point by point. Grid points without
/// enough finite samples (land) stay NaN instead of failing the whole
/// projection.
fn fit_raw(
    leg_dir: &Path,
    varname: &str,
    desc: &VarDescriptor,
    foretime: Float,
) -> Result<Pattern, EofError> {
    let raw = read_pattern_file(&leg_dir.join(format!("{}.nc", varname)), varname, desc)?;
    let time: Vec<Float> = decimal_years(&raw.1);
    let pattern = raw.0;

    let n_time = pattern.values.shape()[0];
    let mut values = pattern.slice(0);

    for (idx, out) in values.indexed_iter_mut() {
        let mut t = Vec::with_capacity(n_time);
        let mut y = Vec::with_capacity(n_time);
        for step in 0..n_time {
            let sample = pattern.values.index_axis(Axis(0), step)[&idx];
            if sample.is_finite() {
                t.push(time[step]);
                y.push(sample);
            }
        }
        *out = match linear_fit(&t, &y) {
            Ok((slope, intercept)) => polyval1(slope, intercept, foretime),
            Err(_) => Float::NAN,
        };
    }

    Ok(Pattern {
        values,
        lat: pattern.lat,
        lon: pattern.lon,
        depth: pattern.depth,
        units: pattern.units,
        long_name: pattern.long_name,
    })
}

fn read_pattern(leg_dir: &Path, varname: &str, desc: &VarDescriptor) -> Result<Pattern, EofError> {
    let path = leg_dir.join(format!("{}_pattern.nc", varname));
    Ok(read_pattern_file(&path, varname, desc)?.0)
}

/// Reads a stacked field file. NEMO writes grid-suffixed coordinate
/// names (`nav_lat_grid_T`, `depthu`, ...) which are normalized here;
/// the plain names are accepted as well.
fn read_pattern_file(
    path: &Path,
    varname: &str,
    desc: &VarDescriptor,
) -> Result<(Pattern, Vec<chrono::NaiveDateTime>), EofError> {
    let file = open_dataset(path)?;
    let var = require_variable(&file, varname)?;
    let values = read_dyn(&var)?;

    let expected = match desc.dim {
        Dimensionality::TwoD => 3,
        Dimensionality::ThreeD => 4,
    };
    if values.ndim() != expected {
        return Err(EofError::Input(InputError::IncorrectShape(
            varname.to_owned(),
        )));
    }

    let units = attr_string(&var, "units").unwrap_or_else(|| desc.units.to_owned());
    let long_name = attr_string(&var, "long_name").unwrap_or_else(|| desc.long_name.to_owned());

    let lat = read_coord_2d(&file, &coord_candidates(desc.grid, "nav_lat"), "lat")?;
    let lon = read_coord_2d(&file, &coord_candidates(desc.grid, "nav_lon"), "lon")?;

    let depth = match desc.dim {
        Dimensionality::TwoD => None,
        Dimensionality::ThreeD => {
            let names = [desc.grid.depth_name(), "z", "nav_lev"];
            Some(read_coord_1d(&file, &names, "depth")?)
        }
    };

    let time = read_time(&file)?;

    Ok((
        Pattern {
            values,
            lat,
            lon,
            depth,
            units,
            long_name,
        },
        time,
    ))
}

fn coord_candidates(grid: NemoGrid, base: &'static str) -> [String; 2] {
    [format!("{}_grid_{}", base, grid.letter()), base.to_owned()]
}

fn read_coord_2d(
    file: &netcdf::File,
    names: &[String],
    what: &'static str,
) -> Result<Array2<Float>, EofError> {
    for name in names {
        if let Some(var) = file.variable(name) {
            let values = read_dyn(&var)?;
            return values
                .into_dimensionality()
                .map_err(|_| EofError::Input(InputError::IncorrectShape(name.clone())));
        }
    }
    Err(EofError::Input(InputError::MissingCoordinate(what)))
}

fn read_coord_1d(
    file: &netcdf::File,
    names: &[&str],
    what: &'static str,
) -> Result<Array1<Float>, EofError> {
    for name in names {
        if let Some(var) = file.variable(name) {
            let values = read_dyn(&var)?;
            return values
                .into_dimensionality()
                .map_err(|_| EofError::Input(InputError::IncorrectShape((*name).to_owned())));
        }
    }
    Err(EofError::Input(InputError::MissingCoordinate(what)))
}

/// Reads one coefficient series as decimal-year time and values. The
/// spatial axes of a series file are singletons and are squeezed away.
fn read_series(path: &Path, varname: &str) -> Result<(Vec<Float>, Vec<Float>), EofError> {
    let file = open_dataset(path)?;
    let var = require_variable(&file, varname)?;
    let values = read_dyn(&var)?;

    let n_time = values.shape()[0];
    if values.len() != n_time {
        return Err(EofError::Input(InputError::IncorrectShape(
            varname.to_owned(),
        )));
    }

    let time = decimal_years(&read_time(&file)?);
    let series = values.iter().copied().collect();

    Ok((time, series))
}

/// Per-mode variance shares obtained from cdo. A non-zero exit or an
/// output without "Mean" lines is fatal.
fn variance_weights(leg_dir: &Path, varname: &str) -> Result<Vec<Float>, EofError> {
    let variance = format!("{}_variance.nc", varname);
    let output = Command::new("cdo")
        .current_dir(leg_dir)
        .args(["info", "-div", &variance, "-timsum", &variance])
        .output()
        .map_err(|e| EofError::Cdo(e.to_string()))?;

    if !output.status.success() {
        return Err(EofError::Cdo(format!(
            "exit status {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let weights = parse_cdo_means(&String::from_utf8_lossy(&output.stdout))?;
    if weights.is_empty() {
        return Err(EofError::Cdo("no Mean lines in cdo output".to_owned()));
    }

    Ok(weights)
}

/// Extracts the per-record means from `cdo info` output. The mean sits
/// in the fourth colon-separated column of every line carrying the
/// "Mean" keyword.
fn parse_cdo_means(output: &str) -> Result<Vec<Float>, EofError> {
    let mut means = Vec::new();
    for line in output.lines() {
        if !line.contains("Mean") {
            continue;
        }
        let column = line
            .split(':')
            .nth(3)
            .ok_or_else(|| EofError::Cdo(format!("malformed info line {:?}", line)))?;
        let value: Float = column
            .trim()
            .parse()
            .map_err(|_| EofError::Cdo(format!("malformed info line {:?}", line)))?;
        means.push(value);
    }
    Ok(means)
}

/// Number of leading modes needed to reach the variance threshold.
fn modes_for_threshold(weights: &[Float], threshold: Float) -> usize {
    let total: Float = weights.iter().sum();
    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative / total >= threshold {
            return i + 1;
        }
    }
    weights.len()
}

/// Writes the projected frame with axis order `[time, (z,) y, x]`,
/// replacing any previous projection.
fn write_eof(path: &Path, varname: &str, field: &Pattern, foretime: Float) -> Result<(), EofError> {
    remove_existing_file(path).map_err(InputError::CantAccessFile)?;

    let shape = field.values.shape().to_vec();
    let (ny, nx) = (shape[shape.len() - 2], shape[shape.len() - 1]);

    let mut file = netcdf::create(path).map_err(InputError::NetCdf)?;
    file.add_dimension("time", 1).map_err(InputError::NetCdf)?;
    if let Some(depth) = &field.depth {
        file.add_dimension("z", depth.len())
            .map_err(InputError::NetCdf)?;
    }
    file.add_dimension("y", ny).map_err(InputError::NetCdf)?;
    file.add_dimension("x", nx).map_err(InputError::NetCdf)?;

    {
        let mut time = file
            .add_variable::<Float>("time", &["time"])
            .map_err(InputError::NetCdf)?;
        time.put_attribute("units", "years")
            .map_err(InputError::NetCdf)?;
        time.put_values(&[foretime], ..).map_err(InputError::NetCdf)?;
    }

    if let Some(depth) = &field.depth {
        let mut var = file
            .add_variable::<Float>("z", &["z"])
            .map_err(InputError::NetCdf)?;
        var.put_attribute("units", "m").map_err(InputError::NetCdf)?;
        var.put_values(depth.as_slice().unwrap_or(&depth.to_vec()), ..)
            .map_err(InputError::NetCdf)?;
    }

    for (name, coord) in [("nav_lat", &field.lat), ("nav_lon", &field.lon)] {
        let mut var = file
            .add_variable::<Float>(name, &["y", "x"])
            .map_err(InputError::NetCdf)?;
        var.put_attribute("units", "deg").map_err(InputError::NetCdf)?;
        let flat = coord.as_standard_layout();
        var.put_values(flat.as_slice().unwrap(), ..)
            .map_err(InputError::NetCdf)?;
    }

    let dims: Vec<&str> = if field.depth.is_some() {
        vec!["time", "z", "y", "x"]
    } else {
        vec!["time", "y", "x"]
    };
    let mut var = file
        .add_variable::<Float>(varname, &dims)
        .map_err(InputError::NetCdf)?;
    var.put_attribute("units", field.units.as_str())
        .map_err(InputError::NetCdf)?;
    var.put_attribute("long_name", field.long_name.as_str())
        .map_err(InputError::NetCdf)?;
    let flat = field.values.as_standard_layout();
    var.put_values(flat.as_slice().unwrap(), ..)
        .map_err(InputError::NetCdf)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::catalogue;
    use float_cmp::assert_approx_eq;
    use std::fs;
    use tempfile::tempdir;

    /// Two 2x2 basis slices stacked along the time axis, grid-suffixed
    /// coordinate names as NEMO writes them.
    fn write_pattern(dir: &Path, varname: &str, slices: &[[Float; 4]]) {
        let mut file = netcdf::create(dir.join(format!("{}_pattern.nc", varname))).unwrap();
        file.add_dimension("time_counter", slices.len()).unwrap();
        file.add_dimension("y_grid_T", 2).unwrap();
        file.add_dimension("x_grid_T", 2).unwrap();

        let mut time = file
            .add_variable::<Float>("time_counter", &["time_counter"])
            .unwrap();
        time.put_attribute("units", "days since 1990-01-01 00:00:00")
            .unwrap();
        let steps: Vec<Float> = (0..slices.len()).map(|i| i as Float).collect();
        time.put_values(&steps, ..).unwrap();

        let mut lat = file
            .add_variable::<Float>("nav_lat_grid_T", &["y_grid_T", "x_grid_T"])
            .unwrap();
        lat.put_values(&[-45.0, -45.0, 45.0, 45.0], ..).unwrap();
        let mut lon = file
            .add_variable::<Float>("nav_lon_grid_T", &["y_grid_T", "x_grid_T"])
            .unwrap();
        lon.put_values(&[0.0, 90.0, 0.0, 90.0], ..).unwrap();

        let mut var = file
            .add_variable::<Float>(varname, &["time_counter", "y_grid_T", "x_grid_T"])
            .unwrap();
        var.put_attribute("units", "PSU").unwrap();
        let flat: Vec<Float> = slices.iter().flatten().copied().collect();
        var.put_values(&flat, ..).unwrap();
    }

    fn write_series(dir: &Path, varname: &str, index: usize, years: &[i32], values: &[Float]) {
        let path = dir.join(format!("{}_series_{:05}.nc", varname, index));
        let mut file = netcdf::create(path).unwrap();
        file.add_dimension("time_counter", values.len()).unwrap();
        file.add_dimension("lat", 1).unwrap();
        file.add_dimension("lon", 1).unwrap();

        let mut time = file
            .add_variable::<Float>("time_counter", &["time_counter"])
            .unwrap();
        time.put_attribute("units", format!("days since {}-01-01 00:00:00", years[0]).as_str())
            .unwrap();
        let days: Vec<Float> = years
            .iter()
            .map(|y| ((y - years[0]) as Float) * 365.25)
            .collect();
        time.put_values(&days, ..).unwrap();

        let mut var = file
            .add_variable::<Float>(varname, &["time_counter", "lat", "lon"])
            .unwrap();
        var.put_values(values, ..).unwrap();
    }

    #[test]
    fn reco_rebuilds_the_last_frame() {
        let rundir = tempdir().unwrap();
        let dirs = Folders::new(rundir.path(), "X1");
        let vars = catalogue();

        // endleg 3 with yearspan 2 covers 1990-1991, two modes
        let leg_dir = dirs.leg_dir(3);
        fs::create_dir_all(&leg_dir).unwrap();
        write_pattern(&leg_dir, "sos", &[[1.0; 4], [0.0, 1.0, 0.0, 1.0]]);
        write_series(&leg_dir, "sos", 0, &[1990, 1991], &[5.0, 3.0]);
        write_series(&leg_dir, "sos", 1, &[1990, 1991], &[1.0, 2.0]);

        let req = EofRequest {
            varname: "sos".to_owned(),
            endleg: 3,
            yearspan: 2,
            yearleap: 10,
            mode: EofMode::Reco,
        };
        let path = project_eofs(&dirs, &vars, &req).unwrap();
        assert_eq!(path, leg_dir.join("sos_eof.nc"));

        // 3.0 * ones + 2.0 * checkerboard
        let file = netcdf::open(&path).unwrap();
        let values: Vec<Float> = file.variable("sos").unwrap().get_values(..).unwrap();
        let expected = [3.0, 5.0, 3.0, 5.0];
        for (v, e) in values.iter().zip(expected) {
            assert_approx_eq!(Float, *v, e, epsilon = 1e-9);
        }
    }

    #[test]
    fn full_mode_extrapolates_the_coefficients() {
        let rundir = tempdir().unwrap();
        let dirs = Folders::new(rundir.path(), "X1");
        let vars = catalogue();

        let leg_dir = dirs.leg_dir(2);
        fs::create_dir_all(&leg_dir).unwrap();
        write_pattern(&leg_dir, "sos", &[[1.0; 4]]);
        // theta(t) = 2 (t - 1990); at the forecast year 2000 it is 20
        write_series(&leg_dir, "sos", 0, &[1990, 1991, 1992], &[0.0, 2.0, 4.0]);

        let req = EofRequest {
            varname: "sos".to_owned(),
            endleg: 2,
            yearspan: 1,
            yearleap: 10,
            mode: EofMode::Full,
        };
        let path = project_eofs(&dirs, &vars, &req).unwrap();

        let file = netcdf::open(&path).unwrap();
        let values: Vec<Float> = file.variable("sos").unwrap().get_values(..).unwrap();
        for &v in &values {
            // the series is sampled at Jan 1, the forecast at Jan 16,
            // so the fit lands within days of the nominal value
            assert!((v - 20.0).abs() < 0.2, "value {} too far from 20", v);
        }

        let time: Vec<Float> = file.variable("time").unwrap().get_values(..).unwrap();
        assert!(time[0] > 2000.0 && time[0] < 2000.1);
    }

    #[test]
    fn rewriting_replaces_the_previous_projection() {
        let rundir = tempdir().unwrap();
        let dirs = Folders::new(rundir.path(), "X1");
        let vars = catalogue();

        let leg_dir = dirs.leg_dir(2);
        fs::create_dir_all(&leg_dir).unwrap();
        write_pattern(&leg_dir, "sos", &[[1.0; 4]]);
        write_series(&leg_dir, "sos", 0, &[1990, 1991], &[4.0, 4.0]);

        let req = EofRequest {
            varname: "sos".to_owned(),
            endleg: 2,
            yearspan: 1,
            yearleap: 5,
            mode: EofMode::Reco,
        };
        project_eofs(&dirs, &vars, &req).unwrap();
        let path = project_eofs(&dirs, &vars, &req).unwrap();

        let file = netcdf::open(&path).unwrap();
        let values: Vec<Float> = file.variable("sos").unwrap().get_values(..).unwrap();
        assert_eq!(values.len(), 4);
        assert_approx_eq!(Float, values[0], 4.0, epsilon = 1e-9);
    }

    #[test]
    fn unknown_variable_and_mode_are_rejected() {
        let rundir = tempdir().unwrap();
        let dirs = Folders::new(rundir.path(), "X1");
        let vars = catalogue();

        let req = EofRequest {
            varname: "nessie".to_owned(),
            endleg: 2,
            yearspan: 1,
            yearleap: 1,
            mode: EofMode::Full,
        };
        assert!(matches!(
            project_eofs(&dirs, &vars, &req),
            Err(EofError::UnknownVariable(_))
        ));

        assert!(matches!(
            EofMode::from_tag("backwards"),
            Err(EofError::UnknownMode(_))
        ));
    }

    #[test]
    fn cdo_means_parsing_and_threshold() {
        // only lines carrying the keyword count
        let output = "\
   1 : Mean : 1990-01-01 :     0.70000 : sos\n\
   some unrelated header line\n\
   2 : Mean : 1990-01-01 :     0.25000 : sos\n\
   3 : Mean : 1990-01-01 :     0.05000 : sos\n";
        let weights = parse_cdo_means(output).unwrap();
        assert_eq!(weights.len(), 3);
        assert_approx_eq!(Float, weights[0], 0.7, epsilon = 1e-9);

        assert_eq!(modes_for_threshold(&[0.7, 0.25, 0.05], 0.9), 2);
        assert_eq!(modes_for_threshold(&[0.5, 0.3, 0.2], 0.9), 3);
        assert_eq!(modes_for_threshold(&[1.0], 0.9), 1);
    }

    #[test]
    fn fit_mode_extrapolates_per_point_and_keeps_land_masked() {
        let rundir = tempdir().unwrap();
        let dirs = Folders::new(rundir.path(), "X1");
        let vars = catalogue();

        let leg_dir = dirs.leg_dir(2);
        fs::create_dir_all(&leg_dir).unwrap();

        // raw field with a linear trend at sea points and a land point
        // that is missing at every step
        let mut file = netcdf::create(leg_dir.join("sos.nc")).unwrap();
        file.add_dimension("time_counter", 3).unwrap();
        file.add_dimension("y_grid_T", 2).unwrap();
        file.add_dimension("x_grid_T", 2).unwrap();
        let mut time = file
            .add_variable::<Float>("time_counter", &["time_counter"])
            .unwrap();
        time.put_attribute("units", "days since 1990-01-01 00:00:00")
            .unwrap();
        time.put_values(&[0.0, 365.25, 730.5], ..).unwrap();
        let mut lat = file
            .add_variable::<Float>("nav_lat_grid_T", &["y_grid_T", "x_grid_T"])
            .unwrap();
        lat.put_values(&[-45.0, -45.0, 45.0, 45.0], ..).unwrap();
        let mut lon = file
            .add_variable::<Float>("nav_lon_grid_T", &["y_grid_T", "x_grid_T"])
            .unwrap();
        lon.put_values(&[0.0, 90.0, 0.0, 90.0], ..).unwrap();
        let mut var = file
            .add_variable::<Float>("sos", &["time_counter", "y_grid_T", "x_grid_T"])
            .unwrap();
        let land = 1.0e31;
        var.put_values(
            &[
                10.0, land, 10.0, 10.0, //
                11.0, land, 11.0, 11.0, //
                12.0, land, 12.0, 12.0,
            ],
            ..,
        )
        .unwrap();
        drop(file);

        let req = EofRequest {
            varname: "sos".to_owned(),
            endleg: 2,
            yearspan: 1,
            yearleap: 8,
            mode: EofMode::Fit,
        };
        let path = project_eofs(&dirs, &vars, &req).unwrap();

        let file = netcdf::open(&path).unwrap();
        let values: Vec<Float> = file.variable("sos").unwrap().get_values(..).unwrap();
        // trend of 1 per year from 1990, forecast at 1998
        assert!((values[0] - 18.0).abs() < 0.2);
        assert!(values[1].is_nan());
        assert!((values[2] - 18.0).abs() < 0.2);
    }
}
