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

//! Module with the in-memory representation of a gridded field, the
//! unit of exchange between the readers and the averaging engine.

use crate::catalogue::Dimensionality;
use crate::Float;
use chrono::NaiveDateTime;
use ndarray::{Array1, Array2, ArrayD};

/// A labeled multi-dimensional array with axis order
/// `[time, (z,) y, x]`, together with its coordinate fields and the
/// horizontal cell areas used as reduction weights.
#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub units: String,
    pub long_name: String,
    pub dim: Dimensionality,

    pub values: ArrayD<Float>,
    pub time: Vec<NaiveDateTime>,
    pub depth: Option<Array1<Float>>,
    pub lat: Array2<Float>,
    pub lon: Array2<Float>,
    pub area: Array2<Float>,
}

impl Field {
    pub fn n_time(&self) -> usize {
        self.time.len()
    }

    /// Number of vertical levels; one for a horizontal field.
    pub fn n_levels(&self) -> usize {
        self.depth.as_ref().map_or(1, |d| d.len())
    }
}
