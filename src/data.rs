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

//! Module responsible for everything that touches NetCDF files: the
//! gridded field model, the raw readers, the diagnostic products and
//! the cached post-reader. Shared low-level plumbing (value reads
//! with fill handling, calendar decoding) lives here.

pub mod field;
pub mod postreader;
pub mod product;
pub mod reader;

use crate::constants::FILL_THRESHOLD;
use crate::errors::InputError;
use crate::Float;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use ndarray::{ArrayD, IxDyn};
use std::path::Path;

/// Opens a dataset, turning the not-found case into the explicit
/// missing-file error of the taxonomy (the cache check relies on it).
pub(crate) fn open_dataset(path: &Path) -> Result<netcdf::File, InputError> {
    if !path.is_file() {
        return Err(InputError::FileNotFound(path.to_owned()));
    }

    Ok(netcdf::open(path)?)
}

/// Looks up a variable, turning the absent case into an error.
pub(crate) fn require_variable<'f>(
    file: &'f netcdf::File,
    name: &str,
) -> Result<netcdf::Variable<'f>, InputError> {
    file.variable(name)
        .ok_or_else(|| InputError::MissingVariable(name.to_owned()))
}

/// Reads a string attribute of a variable, if present.
pub(crate) fn attr_string(var: &netcdf::Variable, name: &str) -> Option<String> {
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(value) => Some(value),
        _ => None,
    }
}

/// Reads a numeric attribute of a variable, if present.
pub(crate) fn attr_float(var: &netcdf::Variable, name: &str) -> Option<Float> {
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Double(value) => Some(value),
        netcdf::AttributeValue::Float(value) => Some(Float::from(value)),
        netcdf::AttributeValue::Int(value) => Some(Float::from(value)),
        netcdf::AttributeValue::Short(value) => Some(Float::from(value)),
        _ => None,
    }
}

/// Reads the full content of a variable into a dynamic-dimensional
/// array, replacing fill values with NaN.
pub(crate) fn read_dyn(var: &netcdf::Variable) -> Result<ArrayD<Float>, InputError> {
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let mut values: Vec<Float> = var.get_values(..)?;

    let fill = attr_float(var, "_FillValue");
    for v in &mut values {
        let missing = v.abs() >= FILL_THRESHOLD || fill.map_or(false, |f| *v == f);
        if missing {
            *v = Float::NAN;
        }
    }

    ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|_| InputError::IncorrectShape(var.name()))
}

/// Decodes a CF time variable (`<unit> since <epoch>`) into calendar
/// dates. Tries `time_counter` first, the name NEMO gives its record
/// dimension, then plain `time`.
pub(crate) fn read_time(file: &netcdf::File) -> Result<Vec<NaiveDateTime>, InputError> {
    let var = file
        .variable("time_counter")
        .or_else(|| file.variable("time"))
        .ok_or(InputError::MissingCoordinate("time"))?;

    let units =
        attr_string(&var, "units").ok_or_else(|| InputError::BadTimeUnits(String::new()))?;
    let (seconds_per_unit, epoch) = parse_time_units(&units)?;

    let offsets: Vec<Float> = var.get_values(..)?;

    Ok(offsets
        .iter()
        .map(|&off| epoch + Duration::seconds((off * seconds_per_unit) as i64))
        .collect())
}

/// Parses a CF units attribute such as `seconds since 1900-01-01`.
fn parse_time_units(units: &str) -> Result<(Float, NaiveDateTime), InputError> {
    let bad = || InputError::BadTimeUnits(units.to_owned());

    let mut parts = units.splitn(2, " since ");
    let unit = parts.next().ok_or_else(bad)?.trim();
    let origin = parts.next().ok_or_else(bad)?.trim();

    let seconds_per_unit = match unit {
        "seconds" | "second" => 1.0,
        "minutes" | "minute" => 60.0,
        "hours" | "hour" => 3600.0,
        "days" | "day" => 86400.0,
        _ => return Err(bad()),
    };

    let epoch = NaiveDateTime::parse_from_str(origin, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(origin, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(origin, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).unwrap())
        })
        .map_err(|_| bad())?;

    Ok((seconds_per_unit, epoch))
}

#[cfg(test)]
mod tests {
    use super::parse_time_units;
    use chrono::NaiveDate;

    #[test]
    fn cf_time_units() {
        let (mult, epoch) = parse_time_units("seconds since 1900-01-01 00:00:00").unwrap();
        assert_eq!(mult, 1.0);
        assert_eq!(epoch.date(), NaiveDate::from_ymd_opt(1900, 1, 1).unwrap());

        let (mult, _) = parse_time_units("days since 1990-01-01").unwrap();
        assert_eq!(mult, 86400.0);

        assert!(parse_time_units("fortnights since 1990-01-01").is_err());
        assert!(parse_time_units("just some text").is_err());
    }
}
