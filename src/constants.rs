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

//! Constants of the simulation calendar and of the NetCDF conventions
//! used throughout the toolkit.

use crate::Float;

/// Calendar year covered by the first simulation leg.
pub const FIRST_SIMULATION_YEAR: i32 = 1990;

/// Leg number of the first simulation year. The EC-Earth4 runtime
/// numbers the spin-up leg 1, so the first produced year sits in leg 2.
pub const FIRST_LEG: u32 = 2;

/// Cumulative variance share retained by the `frac` projection mode.
pub const EOF_VARIANCE_THRESHOLD: Float = 0.9;

/// Values with a magnitude at or above this threshold are treated as
/// missing, whatever the `_FillValue` attribute says. Matches the
/// CF default fill value of roughly 9.97e36.
pub const FILL_THRESHOLD: Float = 1.0e30;

/// Global `description` attribute attached to every averaged file.
pub const PRODUCT_DESCRIPTION: &str = "ECE4/NEMO averaged data";
