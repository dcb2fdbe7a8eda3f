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

//! Module with the cached post-reader, the orchestrator of the
//! toolkit: check the cache, else read raw output, optionally compare
//! against a reference field, average, persist and re-read.
//!
//! The permanent archive is the cache; there is no in-memory state
//! between invocations. Whatever comes back from this module has been
//! round-tripped through the on-disk format by construction.

use crate::catalogue::{Dimensionality, VarDescriptor};
use crate::data::field::Field;
use crate::data::product::{cache_path, DiagKind, Product, ProductData};
use crate::data::reader::{read_raw, RawSource};
use crate::errors::{ConfigError, DiagnosticError, InputError};
use crate::means::{
    cost, horizontal_mean, nan_mean_axis0, nan_mean_last_axis, subregion_weights, time_mean,
    Metric, Subregion,
};
use crate::utils::folders::Folders;
use crate::utils::time::decimal_years;
use crate::Float;
use log::info;
use ndarray::{Array1, ArrayD, Ix1, Ix2, Ix3};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Variable label of a request: a catalogue name with an optional
/// subregion suffix, e.g. `thetao` or `thetao-north`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct VarLabel {
    pub varname: String,
    pub subregion: Subregion,
    label: String,
}

impl VarLabel {
    pub fn parse(label: &str) -> Result<Self, DiagnosticError> {
        let (varname, subregion) = match label.split_once('-') {
            Some((name, region)) => (name, Subregion::from_label(region)?),
            None => (label, Subregion::Global),
        };

        Ok(VarLabel {
            varname: varname.to_owned(),
            subregion,
            label: label.to_owned(),
        })
    }

    /// The label as it appears in cache file names.
    pub fn as_str(&self) -> &str {
        &self.label
    }
}

/// Reference-field document consulted when the metric is not `base`.
/// Names the experiment and year range of the time-averaged field the
/// raw data is compared against.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct RefField {
    pub expname: String,
    pub startyear: i32,
    pub endyear: i32,
}

#[derive(Deserialize)]
struct MeanFieldFile {
    meanfield: RefField,
}

impl RefField {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read(path)?;
        let parsed: MeanFieldFile = serde_yaml::from_slice(&data)?;

        if parsed.meanfield.startyear > parsed.meanfield.endyear {
            return Err(ConfigError::OutOfBounds(
                "Reference start year is past the reference end year",
            ));
        }

        Ok(parsed.meanfield)
    }
}

/// One post-reader invocation.
#[derive(Clone, PartialEq, Debug)]
pub struct PostReadRequest {
    pub startyear: i32,
    pub endyear: i32,
    pub varlabel: VarLabel,
    pub diag: DiagKind,
    pub replace: bool,
    pub metric: Metric,
    pub source: RawSource,
}

/// Main entry of the post-reader.
///
/// On a cache hit with `replace == false` the averaged file is loaded
/// directly and all computation is skipped. Otherwise the raw field is
/// read, optionally combined with the reference field, reduced,
/// persisted and re-read from disk before being returned.
pub fn post_read(
    dirs: &Folders,
    vars: &FxHashMap<&'static str, VarDescriptor>,
    req: &PostReadRequest,
) -> Result<Product, DiagnosticError> {
    let path = cache_path(
        &dirs.perm,
        req.diag,
        req.varlabel.as_str(),
        req.metric.as_str(),
        req.startyear,
        req.endyear,
    );

    if !req.replace && path.is_file() {
        info!("Averaged data found at {}", path.display());
        return Ok(Product::read(&path, req.diag, req.varlabel.as_str())?);
    }
    info!("Averaged data not found. Creating new file ...");

    let mut field = read_raw(
        dirs,
        vars,
        &req.varlabel.varname,
        req.startyear,
        req.endyear,
        req.source,
    )?;

    if req.metric != Metric::Base {
        let reference = read_reference(dirs, &req.varlabel)?;
        cost(&mut field.values, &reference, req.metric)?;
    }

    let product = averaging(&field, &req.varlabel, req.diag)?;

    fs::create_dir_all(&dirs.perm).map_err(InputError::CantAccessFile)?;
    info!("File to be saved at {}", path.display());
    product.write(&path)?;

    // re-read so the caller gets exactly what round-trips through the
    // on-disk format
    Ok(Product::read(&path, req.diag, req.varlabel.as_str())?)
}

/// Loads the reference field named by the reference-field document.
/// The reference is never computed recursively: a missing file is
/// fatal.
fn read_reference(dirs: &Folders, varlabel: &VarLabel) -> Result<ArrayD<Float>, DiagnosticError> {
    let refcfg = RefField::from_file(&dirs.meanfield_file())?;
    let ref_dirs = Folders::new(&dirs.rundir, &refcfg.expname);

    let path = cache_path(
        &ref_dirs.perm,
        DiagKind::Field,
        varlabel.as_str(),
        Metric::Base.as_str(),
        refcfg.startyear,
        refcfg.endyear,
    );
    if !path.is_file() {
        return Err(DiagnosticError::MissingReference(path));
    }

    let product = Product::read(&path, DiagKind::Field, varlabel.as_str())?;
    match product.data {
        ProductData::Field2d { values, .. } => Ok(values.into_dyn()),
        ProductData::Field3d { values, .. } => Ok(values.into_dyn()),
        _ => Err(DiagnosticError::MissingReference(path)),
    }
}

/// The averaging engine: reduces a gridded field into the requested
/// diagnostic product. Every kind/dimensionality pairing is spelled
/// out; pairings with no defined reduction are rejected.
pub fn averaging(
    field: &Field,
    varlabel: &VarLabel,
    diag: DiagKind,
) -> Result<Product, DiagnosticError> {
    let shape_err = || DiagnosticError::Input(InputError::IncorrectShape(varlabel.as_str().to_owned()));
    let weights = subregion_weights(&field.area, &field.lat, varlabel.subregion);

    let data = match (diag, field.dim) {
        (DiagKind::Timeseries, Dimensionality::TwoD) => ProductData::Timeseries {
            time: Array1::from_vec(decimal_years(&field.time)),
            values: horizontal_mean(&field.values, &weights)
                .into_dimensionality::<Ix1>()
                .map_err(|_| shape_err())?,
        },
        (DiagKind::Timeseries, Dimensionality::ThreeD) => ProductData::Timeseries {
            time: Array1::from_vec(decimal_years(&field.time)),
            values: nan_mean_last_axis(&horizontal_mean(&field.values, &weights))
                .into_dimensionality::<Ix1>()
                .map_err(|_| shape_err())?,
        },
        (DiagKind::Profile, Dimensionality::ThreeD) => ProductData::Profile {
            depth: require_depth(field, varlabel)?,
            values: nan_mean_axis0(&horizontal_mean(&field.values, &weights))
                .into_dimensionality::<Ix1>()
                .map_err(|_| shape_err())?,
        },
        (DiagKind::Hovmoller, Dimensionality::ThreeD) => ProductData::Hovmoller {
            time: Array1::from_vec(decimal_years(&field.time)),
            depth: require_depth(field, varlabel)?,
            values: horizontal_mean(&field.values, &weights)
                .into_dimensionality::<Ix2>()
                .map_err(|_| shape_err())?,
        },
        (DiagKind::Map, Dimensionality::TwoD) => ProductData::Map {
            lat: field.lat.clone(),
            lon: field.lon.clone(),
            values: time_mean(&field.values)
                .into_dimensionality::<Ix2>()
                .map_err(|_| shape_err())?,
        },
        (DiagKind::Map, Dimensionality::ThreeD) => ProductData::Map {
            lat: field.lat.clone(),
            lon: field.lon.clone(),
            values: nan_mean_axis0(&time_mean(&field.values))
                .into_dimensionality::<Ix2>()
                .map_err(|_| shape_err())?,
        },
        (DiagKind::Field, Dimensionality::TwoD) => ProductData::Field2d {
            lat: field.lat.clone(),
            lon: field.lon.clone(),
            values: time_mean(&field.values)
                .into_dimensionality::<Ix2>()
                .map_err(|_| shape_err())?,
        },
        (DiagKind::Field, Dimensionality::ThreeD) => ProductData::Field3d {
            lat: field.lat.clone(),
            lon: field.lon.clone(),
            depth: require_depth(field, varlabel)?,
            values: time_mean(&field.values)
                .into_dimensionality::<Ix3>()
                .map_err(|_| shape_err())?,
        },
        (DiagKind::Profile | DiagKind::Hovmoller, Dimensionality::TwoD) => {
            return Err(DiagnosticError::UnsupportedDiagnostic {
                diagname: diag.as_str(),
                dim: field.dim.as_str(),
                varname: varlabel.varname.clone(),
            })
        }
    };

    Ok(Product {
        varlabel: varlabel.as_str().to_owned(),
        units: field.units.clone(),
        long_name: field.long_name.clone(),
        data,
    })
}

fn require_depth(field: &Field, varlabel: &VarLabel) -> Result<Array1<Float>, DiagnosticError> {
    field
        .depth
        .clone()
        .ok_or_else(|| DiagnosticError::Input(InputError::IncorrectShape(varlabel.as_str().to_owned())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::catalogue;
    use float_cmp::assert_approx_eq;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    /// Writes a synthetic 2D monthly mean file with one time step.
    fn write_nemo_2d(dirs: &Folders, varname: &str, year: i32, value: Float) {
        fs::create_dir_all(&dirs.data).unwrap();
        let path = dirs
            .data
            .join(format!("{}_oce_1m_T_{}-{}.nc", dirs.expname, year, year));

        let mut file = netcdf::create(&path).unwrap();
        file.add_dimension("time_counter", 1).unwrap();
        file.add_dimension("y", 2).unwrap();
        file.add_dimension("x", 2).unwrap();

        let mut time = file
            .add_variable::<Float>("time_counter", &["time_counter"])
            .unwrap();
        time.put_attribute("units", format!("days since {}-01-01 00:00:00", year).as_str())
            .unwrap();
        time.put_values(&[15.5], ..).unwrap();

        let mut lat = file.add_variable::<Float>("nav_lat", &["y", "x"]).unwrap();
        lat.put_values(&[-45.0, -45.0, 45.0, 45.0], ..).unwrap();
        let mut lon = file.add_variable::<Float>("nav_lon", &["y", "x"]).unwrap();
        lon.put_values(&[0.0, 90.0, 0.0, 90.0], ..).unwrap();

        let mut var = file
            .add_variable::<Float>(varname, &["time_counter", "y", "x"])
            .unwrap();
        var.put_attribute("units", "PSU").unwrap();
        var.put_attribute("long_name", "Sea-surface salinity").unwrap();
        var.put_values(&[value; 4], ..).unwrap();
    }

    /// Writes a synthetic 3D monthly mean file with one time step and
    /// two depth levels.
    fn write_nemo_3d(dirs: &Folders, varname: &str, year: i32, value: Float) {
        fs::create_dir_all(&dirs.data).unwrap();
        let path = dirs
            .data
            .join(format!("{}_oce_1m_T_{}-{}.nc", dirs.expname, year, year));

        let mut file = netcdf::create(&path).unwrap();
        file.add_dimension("time_counter", 1).unwrap();
        file.add_dimension("deptht", 2).unwrap();
        file.add_dimension("y", 2).unwrap();
        file.add_dimension("x", 2).unwrap();

        let mut time = file
            .add_variable::<Float>("time_counter", &["time_counter"])
            .unwrap();
        time.put_attribute("units", format!("days since {}-01-01 00:00:00", year).as_str())
            .unwrap();
        time.put_values(&[15.5], ..).unwrap();

        let mut depth = file.add_variable::<Float>("deptht", &["deptht"]).unwrap();
        depth.put_values(&[100.0, 500.0], ..).unwrap();

        let mut lat = file.add_variable::<Float>("nav_lat", &["y", "x"]).unwrap();
        lat.put_values(&[-45.0, -45.0, 45.0, 45.0], ..).unwrap();
        let mut lon = file.add_variable::<Float>("nav_lon", &["y", "x"]).unwrap();
        lon.put_values(&[0.0, 90.0, 0.0, 90.0], ..).unwrap();

        let mut var = file
            .add_variable::<Float>(varname, &["time_counter", "deptht", "y", "x"])
            .unwrap();
        var.put_attribute("units", "degC").unwrap();
        var.put_attribute("long_name", "Temperature").unwrap();
        var.put_values(&[value; 8], ..).unwrap();
    }

    fn experiment(rundir: &TempDir, expname: &str) -> Folders {
        Folders::new(rundir.path(), expname)
    }

    fn timeseries_request(startyear: i32, endyear: i32) -> PostReadRequest {
        PostReadRequest {
            startyear,
            endyear,
            varlabel: VarLabel::parse("thetao").unwrap(),
            diag: DiagKind::Timeseries,
            replace: false,
            metric: Metric::Base,
            source: RawSource::Nemo,
        }
    }

    #[test]
    fn end_to_end_timeseries_with_cache_hit() {
        let rundir = tempdir().unwrap();
        let dirs = experiment(&rundir, "X1");
        let vars = catalogue();

        for year in 1990..=1992 {
            write_nemo_3d(&dirs, "thetao", year, 17.0);
        }

        let req = timeseries_request(1990, 1992);
        let first = post_read(&dirs, &vars, &req).unwrap();

        let cached: PathBuf = dirs.perm.join("timeseries_thetao_base_1990-1992.nc");
        assert!(cached.is_file());

        match &first.data {
            ProductData::Timeseries { time, values } => {
                assert_eq!(time.len(), 3);
                // decimal years, one mid-January step per year
                assert!(time[0] > 1990.0 && time[0] < 1990.1);
                assert!(time[2] > 1992.0 && time[2] < 1992.1);
                for &v in values.iter() {
                    assert_approx_eq!(Float, v, 17.0, epsilon = 1e-9);
                }
            }
            other => panic!("unexpected product shape: {:?}", other),
        }
        assert_eq!(first.units, "degC");
        assert_eq!(first.long_name, "Temperature");

        // second call is served from the cache even with the raw data
        // changed underneath
        for year in 1990..=1992 {
            write_nemo_3d(&dirs, "thetao", year, 99.0);
        }
        let second = post_read(&dirs, &vars, &req).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn replace_always_recomputes() {
        let rundir = tempdir().unwrap();
        let dirs = experiment(&rundir, "X1");
        let vars = catalogue();

        write_nemo_3d(&dirs, "thetao", 1990, 1.0);
        let mut req = timeseries_request(1990, 1990);
        post_read(&dirs, &vars, &req).unwrap();

        write_nemo_3d(&dirs, "thetao", 1990, 2.0);
        req.replace = true;
        let recomputed = post_read(&dirs, &vars, &req).unwrap();

        match recomputed.data {
            ProductData::Timeseries { ref values, .. } => {
                assert_approx_eq!(Float, values[0], 2.0, epsilon = 1e-9);
            }
            other => panic!("unexpected product shape: {:?}", other),
        }

        // the stale file was overwritten, a plain read sees the new value
        req.replace = false;
        let reread = post_read(&dirs, &vars, &req).unwrap();
        assert_eq!(recomputed, reread);
    }

    #[test]
    fn map_of_constant_field_is_the_constant() {
        let rundir = tempdir().unwrap();
        let dirs = experiment(&rundir, "X1");
        let vars = catalogue();

        write_nemo_2d(&dirs, "sos", 1990, 35.0);

        let req = PostReadRequest {
            startyear: 1990,
            endyear: 1990,
            varlabel: VarLabel::parse("sos").unwrap(),
            diag: DiagKind::Map,
            replace: false,
            metric: Metric::Base,
            source: RawSource::Nemo,
        };
        let product = post_read(&dirs, &vars, &req).unwrap();

        match product.data {
            ProductData::Map { values, .. } => {
                for &v in values.iter() {
                    assert_approx_eq!(Float, v, 35.0, epsilon = 1e-9);
                }
            }
            other => panic!("unexpected product shape: {:?}", other),
        }
    }

    #[test]
    fn subregion_restricts_the_space_mean() {
        let rundir = tempdir().unwrap();
        let dirs = experiment(&rundir, "X1");
        let vars = catalogue();

        // southern row -45, northern row +45; constant per row
        fs::create_dir_all(&dirs.data).unwrap();
        let path = dirs.data.join("X1_oce_1m_T_1990-1990.nc");
        let mut file = netcdf::create(&path).unwrap();
        file.add_dimension("time_counter", 1).unwrap();
        file.add_dimension("y", 2).unwrap();
        file.add_dimension("x", 2).unwrap();
        let mut time = file
            .add_variable::<Float>("time_counter", &["time_counter"])
            .unwrap();
        time.put_attribute("units", "days since 1990-01-01 00:00:00").unwrap();
        time.put_values(&[15.5], ..).unwrap();
        let mut lat = file.add_variable::<Float>("nav_lat", &["y", "x"]).unwrap();
        lat.put_values(&[-45.0, -45.0, 45.0, 45.0], ..).unwrap();
        let mut lon = file.add_variable::<Float>("nav_lon", &["y", "x"]).unwrap();
        lon.put_values(&[0.0, 90.0, 0.0, 90.0], ..).unwrap();
        let mut var = file
            .add_variable::<Float>("sos", &["time_counter", "y", "x"])
            .unwrap();
        var.put_values(&[30.0, 30.0, 38.0, 38.0], ..).unwrap();
        drop(file);

        let req = PostReadRequest {
            startyear: 1990,
            endyear: 1990,
            varlabel: VarLabel::parse("sos-north").unwrap(),
            diag: DiagKind::Timeseries,
            replace: false,
            metric: Metric::Base,
            source: RawSource::Nemo,
        };
        let product = post_read(&dirs, &vars, &req).unwrap();

        assert_eq!(product.varlabel, "sos-north");
        match product.data {
            ProductData::Timeseries { values, .. } => {
                assert_approx_eq!(Float, values[0], 38.0, epsilon = 1e-9);
            }
            other => panic!("unexpected product shape: {:?}", other),
        }
    }

    #[test]
    fn hovmoller_keeps_time_and_depth() {
        let rundir = tempdir().unwrap();
        let dirs = experiment(&rundir, "X1");
        let vars = catalogue();

        for year in 1990..=1991 {
            write_nemo_3d(&dirs, "thetao", year, 17.0);
        }

        let req = PostReadRequest {
            startyear: 1990,
            endyear: 1991,
            varlabel: VarLabel::parse("thetao").unwrap(),
            diag: DiagKind::Hovmoller,
            replace: false,
            metric: Metric::Base,
            source: RawSource::Nemo,
        };
        let product = post_read(&dirs, &vars, &req).unwrap();

        assert!(dirs.perm.join("hovmoller_thetao_base_1990-1991.nc").is_file());
        match product.data {
            ProductData::Hovmoller { time, depth, values } => {
                assert_eq!(time.len(), 2);
                assert_eq!(depth.len(), 2);
                assert_approx_eq!(Float, depth[0], 100.0, epsilon = 1e-9);
                assert_eq!(values.dim(), (2, 2));
                for &v in values.iter() {
                    assert_approx_eq!(Float, v, 17.0, epsilon = 1e-9);
                }
            }
            other => panic!("unexpected product shape: {:?}", other),
        }
    }

    #[test]
    fn depth_diagnostics_of_2d_variable_are_rejected() {
        let rundir = tempdir().unwrap();
        let dirs = experiment(&rundir, "X1");
        let vars = catalogue();

        write_nemo_2d(&dirs, "sos", 1990, 35.0);

        for diag in [DiagKind::Profile, DiagKind::Hovmoller] {
            let req = PostReadRequest {
                startyear: 1990,
                endyear: 1990,
                varlabel: VarLabel::parse("sos").unwrap(),
                diag,
                replace: false,
                metric: Metric::Base,
                source: RawSource::Nemo,
            };

            match post_read(&dirs, &vars, &req) {
                Err(DiagnosticError::UnsupportedDiagnostic { diagname, dim, .. }) => {
                    assert_eq!(diagname, diag.as_str());
                    assert_eq!(dim, "2D");
                }
                other => panic!("expected unsupported-diagnostic error, got {:?}", other),
            }
        }
    }

    #[test]
    fn missing_reference_is_fatal() {
        let rundir = tempdir().unwrap();
        let dirs = experiment(&rundir, "X1");
        let vars = catalogue();

        write_nemo_2d(&dirs, "sos", 1990, 35.0);
        fs::write(
            dirs.meanfield_file(),
            "meanfield:\n  expname: R0\n  startyear: 1980\n  endyear: 1989\n",
        )
        .unwrap();

        let req = PostReadRequest {
            startyear: 1990,
            endyear: 1990,
            varlabel: VarLabel::parse("sos").unwrap(),
            diag: DiagKind::Timeseries,
            replace: false,
            metric: Metric::Diff,
            source: RawSource::Nemo,
        };

        assert!(matches!(
            post_read(&dirs, &vars, &req),
            Err(DiagnosticError::MissingReference(_))
        ));
    }

    #[test]
    fn diff_metric_subtracts_the_reference() {
        let rundir = tempdir().unwrap();
        let dirs = experiment(&rundir, "X1");
        let ref_dirs = experiment(&rundir, "R0");
        let vars = catalogue();

        write_nemo_2d(&ref_dirs, "sos", 1980, 34.0);
        write_nemo_2d(&dirs, "sos", 1990, 35.0);
        fs::write(
            dirs.meanfield_file(),
            "meanfield:\n  expname: R0\n  startyear: 1980\n  endyear: 1980\n",
        )
        .unwrap();

        // populate the reference archive first, as the workflow requires
        let ref_req = PostReadRequest {
            startyear: 1980,
            endyear: 1980,
            varlabel: VarLabel::parse("sos").unwrap(),
            diag: DiagKind::Field,
            replace: false,
            metric: Metric::Base,
            source: RawSource::Nemo,
        };
        post_read(&ref_dirs, &vars, &ref_req).unwrap();

        let req = PostReadRequest {
            startyear: 1990,
            endyear: 1990,
            varlabel: VarLabel::parse("sos").unwrap(),
            diag: DiagKind::Timeseries,
            replace: false,
            metric: Metric::Diff,
            source: RawSource::Nemo,
        };
        let product = post_read(&dirs, &vars, &req).unwrap();

        match product.data {
            ProductData::Timeseries { values, .. } => {
                assert_approx_eq!(Float, values[0], 1.0, epsilon = 1e-9);
            }
            other => panic!("unexpected product shape: {:?}", other),
        }

        // the metric tag is part of the cache key
        assert!(dirs.perm.join("timeseries_sos_diff_1990-1990.nc").is_file());
    }

    #[test]
    fn varlabel_parsing() {
        let plain = VarLabel::parse("thetao").unwrap();
        assert_eq!(plain.varname, "thetao");
        assert_eq!(plain.subregion, Subregion::Global);
        assert_eq!(plain.as_str(), "thetao");

        let banded = VarLabel::parse("thetao-tropics").unwrap();
        assert_eq!(banded.varname, "thetao");
        assert_eq!(banded.subregion, Subregion::Tropics);
        assert_eq!(banded.as_str(), "thetao-tropics");

        assert!(VarLabel::parse("thetao-atlantis").is_err());
    }
}
