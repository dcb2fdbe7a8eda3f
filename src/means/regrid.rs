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

//! Module regridding staggered C-grid fields to T points.
//!
//! NEMO staggers velocities half a cell away from tracer points: U
//! along x, V along y, W along depth. A T-point value is recovered as
//! the midpoint average of the two adjacent staggered values; at the
//! first (or last, for W) index the staggered value is kept as is.

use crate::catalogue::{Dimensionality, NemoGrid};
use crate::Float;
use ndarray::{ArrayD, Axis, Zip};

/// Regrids a field with axis order `[time, (z,) y, x]` from its native
/// grid to T points.
pub fn regrid_to_t(values: &ArrayD<Float>, grid: NemoGrid, dim: Dimensionality) -> ArrayD<Float> {
    let ndim = values.ndim();

    match grid {
        NemoGrid::T => values.clone(),
        // U sits east of the T point: average with the western neighbour
        NemoGrid::U => average_with_previous(values, ndim - 1),
        // V sits north of the T point: average with the southern neighbour
        NemoGrid::V => average_with_previous(values, ndim - 2),
        // W sits on level interfaces: average with the interface below
        NemoGrid::W => match dim {
            Dimensionality::ThreeD => average_with_next(values, 1),
            Dimensionality::TwoD => values.clone(),
        },
    }
}

fn average_with_previous(values: &ArrayD<Float>, axis: usize) -> ArrayD<Float> {
    let mut out = values.clone();
    let len = values.len_of(Axis(axis));

    for i in (1..len).rev() {
        let previous = values.index_axis(Axis(axis), i - 1);
        let mut slot = out.index_axis_mut(Axis(axis), i);
        Zip::from(&mut slot).and(&previous).for_each(|v, &p| *v = 0.5 * (*v + p));
    }

    out
}

fn average_with_next(values: &ArrayD<Float>, axis: usize) -> ArrayD<Float> {
    let mut out = values.clone();
    let len = values.len_of(Axis(axis));

    for i in 0..len.saturating_sub(1) {
        let next = values.index_axis(Axis(axis), i + 1);
        let mut slot = out.index_axis_mut(Axis(axis), i);
        Zip::from(&mut slot).and(&next).for_each(|v, &n| *v = 0.5 * (*v + n));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    #[test]
    fn u_to_t_averages_along_x() {
        // one time step, 1x3 horizontal strip
        let mut u = Array::zeros(IxDyn(&[1, 1, 3]));
        u[[0, 0, 0]] = 1.0;
        u[[0, 0, 1]] = 3.0;
        u[[0, 0, 2]] = 5.0;

        let t = regrid_to_t(&u, NemoGrid::U, Dimensionality::TwoD);

        assert_eq!(t[[0, 0, 0]], 1.0);
        assert_eq!(t[[0, 0, 1]], 2.0);
        assert_eq!(t[[0, 0, 2]], 4.0);
    }

    #[test]
    fn w_to_t_averages_along_depth() {
        let mut w = Array::zeros(IxDyn(&[1, 3, 1, 1]));
        w[[0, 0, 0, 0]] = 2.0;
        w[[0, 1, 0, 0]] = 4.0;
        w[[0, 2, 0, 0]] = 6.0;

        let t = regrid_to_t(&w, NemoGrid::W, Dimensionality::ThreeD);

        assert_eq!(t[[0, 0, 0, 0]], 3.0);
        assert_eq!(t[[0, 1, 0, 0]], 5.0);
        assert_eq!(t[[0, 2, 0, 0]], 6.0);
    }

    #[test]
    fn t_grid_is_untouched() {
        let v = Array::from_elem(IxDyn(&[1, 2, 2]), 7.0);
        let t = regrid_to_t(&v, NemoGrid::T, Dimensionality::TwoD);
        assert_eq!(v, t);
    }
}
