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

//! Module with the diagnostic products of the averaging engine and
//! their on-disk NetCDF format.
//!
//! The file name, `{diag}_{varlabel}_{metric}_{start}-{end}.nc`, is
//! the cache key of the post-reader: whatever sits under that name in
//! the permanent archive is the sole source of truth for the product.

use crate::constants::PRODUCT_DESCRIPTION;
use crate::data::{attr_string, open_dataset, read_dyn, require_variable};
use crate::errors::{DiagnosticError, InputError};
use crate::utils::remove_existing_file;
use crate::Float;
use ndarray::{Array1, Array2, Array3, Ix1, Ix2, Ix3};
use std::path::{Path, PathBuf};

/// Shape of a reduced data product.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DiagKind {
    Timeseries,
    Profile,
    Hovmoller,
    Map,
    Field,
}

impl DiagKind {
    pub fn from_tag(tag: &str) -> Result<Self, DiagnosticError> {
        match tag {
            "timeseries" => Ok(DiagKind::Timeseries),
            "profile" => Ok(DiagKind::Profile),
            "hovmoller" => Ok(DiagKind::Hovmoller),
            "map" => Ok(DiagKind::Map),
            "field" => Ok(DiagKind::Field),
            other => Err(DiagnosticError::UnknownDiagnostic(other.to_owned())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagKind::Timeseries => "timeseries",
            DiagKind::Profile => "profile",
            DiagKind::Hovmoller => "hovmoller",
            DiagKind::Map => "map",
            DiagKind::Field => "field",
        }
    }
}

/// Canonical cache file name of a diagnostic product.
pub fn cache_filename(
    diag: DiagKind,
    varlabel: &str,
    metric: &str,
    startyear: i32,
    endyear: i32,
) -> String {
    format!("{}_{}_{}_{}-{}.nc", diag.as_str(), varlabel, metric, startyear, endyear)
}

/// The data of a diagnostic product, one variant per shape. The time
/// axis is always in decimal years.
#[derive(Clone, PartialEq, Debug)]
pub enum ProductData {
    Timeseries {
        time: Array1<Float>,
        values: Array1<Float>,
    },
    Profile {
        depth: Array1<Float>,
        values: Array1<Float>,
    },
    Hovmoller {
        time: Array1<Float>,
        depth: Array1<Float>,
        values: Array2<Float>,
    },
    Map {
        lat: Array2<Float>,
        lon: Array2<Float>,
        values: Array2<Float>,
    },
    Field2d {
        lat: Array2<Float>,
        lon: Array2<Float>,
        values: Array2<Float>,
    },
    Field3d {
        lat: Array2<Float>,
        lon: Array2<Float>,
        depth: Array1<Float>,
        values: Array3<Float>,
    },
}

/// A diagnostic product together with the metadata that must survive
/// the round trip through the on-disk format.
#[derive(Clone, PartialEq, Debug)]
pub struct Product {
    pub varlabel: String,
    pub units: String,
    pub long_name: String,
    pub data: ProductData,
}

impl Product {
    /// Writes the product, replacing any file already at the path.
    pub fn write(&self, path: &Path) -> Result<(), InputError> {
        remove_existing_file(path)?;

        let mut file = netcdf::create(path)?;
        file.add_attribute("description", PRODUCT_DESCRIPTION)?;

        match &self.data {
            ProductData::Timeseries { time, values } => {
                file.add_dimension("time", time.len())?;
                put_time(&mut file, time)?;
                self.put_data(&mut file, &["time"], values.as_slice().unwrap())?;
            }
            ProductData::Profile { depth, values } => {
                file.add_dimension("z", depth.len())?;
                put_depth(&mut file, depth)?;
                self.put_data(&mut file, &["z"], values.as_slice().unwrap())?;
            }
            ProductData::Hovmoller { time, depth, values } => {
                file.add_dimension("time", time.len())?;
                file.add_dimension("z", depth.len())?;
                put_time(&mut file, time)?;
                put_depth(&mut file, depth)?;
                let flat = values.as_standard_layout();
                self.put_data(&mut file, &["time", "z"], flat.as_slice().unwrap())?;
            }
            ProductData::Map { lat, lon, values } | ProductData::Field2d { lat, lon, values } => {
                let (ny, nx) = values.dim();
                file.add_dimension("y", ny)?;
                file.add_dimension("x", nx)?;
                put_horizontal(&mut file, lat, lon)?;
                let flat = values.as_standard_layout();
                self.put_data(&mut file, &["y", "x"], flat.as_slice().unwrap())?;
            }
            ProductData::Field3d { lat, lon, depth, values } => {
                let (nz, ny, nx) = values.dim();
                file.add_dimension("z", nz)?;
                file.add_dimension("y", ny)?;
                file.add_dimension("x", nx)?;
                put_depth(&mut file, depth)?;
                put_horizontal(&mut file, lat, lon)?;
                let flat = values.as_standard_layout();
                self.put_data(&mut file, &["z", "y", "x"], flat.as_slice().unwrap())?;
            }
        }

        Ok(())
    }

    fn put_data(
        &self,
        file: &mut netcdf::FileMut,
        dims: &[&str],
        values: &[Float],
    ) -> Result<(), InputError> {
        let mut var = file.add_variable::<Float>(&self.varlabel, dims)?;
        var.put_attribute("units", self.units.as_str())?;
        var.put_attribute("long_name", self.long_name.as_str())?;
        var.put_values(values, ..)?;

        Ok(())
    }

    /// Reads a product back from disk. The diagnostic kind is part of
    /// the file name, so it is supplied by the caller rather than
    /// guessed from the content.
    pub fn read(path: &Path, diag: DiagKind, varlabel: &str) -> Result<Self, InputError> {
        let file = open_dataset(path)?;

        let var = require_variable(&file, varlabel)?;
        let units = attr_string(&var, "units").unwrap_or_default();
        let long_name = attr_string(&var, "long_name").unwrap_or_default();
        let raw = read_dyn(&var)?;

        let shape_err = || InputError::IncorrectShape(varlabel.to_owned());

        let data = match diag {
            DiagKind::Timeseries => ProductData::Timeseries {
                time: get_1d(&file, "time")?,
                values: raw.into_dimensionality::<Ix1>().map_err(|_| shape_err())?,
            },
            DiagKind::Profile => ProductData::Profile {
                depth: get_1d(&file, "z")?,
                values: raw.into_dimensionality::<Ix1>().map_err(|_| shape_err())?,
            },
            DiagKind::Hovmoller => ProductData::Hovmoller {
                time: get_1d(&file, "time")?,
                depth: get_1d(&file, "z")?,
                values: raw.into_dimensionality::<Ix2>().map_err(|_| shape_err())?,
            },
            DiagKind::Map => ProductData::Map {
                lat: get_2d(&file, "lat")?,
                lon: get_2d(&file, "lon")?,
                values: raw.into_dimensionality::<Ix2>().map_err(|_| shape_err())?,
            },
            DiagKind::Field => {
                let lat = get_2d(&file, "lat")?;
                let lon = get_2d(&file, "lon")?;
                match raw.ndim() {
                    2 => ProductData::Field2d {
                        lat,
                        lon,
                        values: raw.into_dimensionality::<Ix2>().map_err(|_| shape_err())?,
                    },
                    3 => ProductData::Field3d {
                        lat,
                        lon,
                        depth: get_1d(&file, "z")?,
                        values: raw.into_dimensionality::<Ix3>().map_err(|_| shape_err())?,
                    },
                    _ => return Err(shape_err()),
                }
            }
        };

        Ok(Product {
            varlabel: varlabel.to_owned(),
            units,
            long_name,
            data,
        })
    }
}

fn put_time(file: &mut netcdf::FileMut, time: &Array1<Float>) -> Result<(), InputError> {
    let mut var = file.add_variable::<Float>("time", &["time"])?;
    var.put_attribute("units", "years")?;
    var.put_attribute("long_name", "years")?;
    var.put_values(time.as_slice().unwrap(), ..)?;

    Ok(())
}

fn put_depth(file: &mut netcdf::FileMut, depth: &Array1<Float>) -> Result<(), InputError> {
    let mut var = file.add_variable::<Float>("z", &["z"])?;
    var.put_attribute("units", "m")?;
    var.put_attribute("long_name", "depth")?;
    var.put_values(depth.as_slice().unwrap(), ..)?;

    Ok(())
}

fn put_horizontal(
    file: &mut netcdf::FileMut,
    lat: &Array2<Float>,
    lon: &Array2<Float>,
) -> Result<(), InputError> {
    let mut lat_var = file.add_variable::<Float>("lat", &["y", "x"])?;
    lat_var.put_attribute("units", "deg")?;
    lat_var.put_attribute("long_name", "latitude")?;
    lat_var.put_values(lat.as_standard_layout().as_slice().unwrap(), ..)?;

    let mut lon_var = file.add_variable::<Float>("lon", &["y", "x"])?;
    lon_var.put_attribute("units", "deg")?;
    lon_var.put_attribute("long_name", "longitude")?;
    lon_var.put_values(lon.as_standard_layout().as_slice().unwrap(), ..)?;

    Ok(())
}

fn get_1d(file: &netcdf::File, name: &str) -> Result<Array1<Float>, InputError> {
    let var = require_variable(file, name)?;
    read_dyn(&var)?
        .into_dimensionality::<Ix1>()
        .map_err(|_| InputError::IncorrectShape(name.to_owned()))
}

fn get_2d(file: &netcdf::File, name: &str) -> Result<Array2<Float>, InputError> {
    let var = require_variable(file, name)?;
    read_dyn(&var)?
        .into_dimensionality::<Ix2>()
        .map_err(|_| InputError::IncorrectShape(name.to_owned()))
}

/// Full cache path of a product inside a permanent archive directory.
pub fn cache_path(
    perm: &Path,
    diag: DiagKind,
    varlabel: &str,
    metric: &str,
    startyear: i32,
    endyear: i32,
) -> PathBuf {
    perm.join(cache_filename(diag, varlabel, metric, startyear, endyear))
}
