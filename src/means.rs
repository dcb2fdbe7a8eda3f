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

//! Module with the numerical primitives of the averaging engine:
//! missing-value aware reductions over space and time, cost metrics
//! against a reference field and the degree-1 least-squares fit used
//! by the EOF projector.
//!
//! All reductions skip non-finite samples, mirroring how land points
//! are masked in the ocean output.

pub mod eof;
pub mod regrid;

use crate::errors::{DiagnosticError, EofError};
use crate::Float;
use ndarray::{Array2, ArrayD, Axis, IxDyn, Zip};

/// Named latitude band a space mean can be restricted to. Parsed from
/// the subregion part of a `name-subregion` variable label.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Subregion {
    Global,
    North,
    South,
    Tropics,
}

impl Subregion {
    pub fn from_label(label: &str) -> Result<Self, DiagnosticError> {
        match label {
            "global" => Ok(Subregion::Global),
            "north" => Ok(Subregion::North),
            "south" => Ok(Subregion::South),
            "tropics" => Ok(Subregion::Tropics),
            other => Err(DiagnosticError::UnknownSubregion(other.to_owned())),
        }
    }

    /// Whether a grid point at the given latitude belongs to the band.
    pub fn contains(&self, lat: Float) -> bool {
        match self {
            Subregion::Global => true,
            Subregion::North => lat > 30.0,
            Subregion::South => lat < -30.0,
            Subregion::Tropics => (-30.0..=30.0).contains(&lat),
        }
    }
}

/// Cost function comparing a field against a reference field,
/// selected by the metric tag of the post-reader.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Metric {
    /// No comparison, the field itself.
    Base,
    /// Absolute difference `x - r`.
    Diff,
    /// Relative value `x / r`.
    Rel,
    /// Variance-normalized squared difference `(x - r)^2 / r^2`.
    Var,
}

impl Metric {
    pub fn from_tag(tag: &str) -> Result<Self, DiagnosticError> {
        match tag {
            "base" => Ok(Metric::Base),
            "diff" => Ok(Metric::Diff),
            "rel" => Ok(Metric::Rel),
            "var" => Ok(Metric::Var),
            other => Err(DiagnosticError::UnknownMetric(other.to_owned())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Base => "base",
            Metric::Diff => "diff",
            Metric::Rel => "rel",
            Metric::Var => "var",
        }
    }

    fn apply(&self, x: Float, r: Float) -> Float {
        match self {
            Metric::Base => x,
            Metric::Diff => x - r,
            Metric::Rel => x / r,
            Metric::Var => (x - r) * (x - r) / (r * r),
        }
    }
}

/// Combines every time slice of a raw field with a time-invariant
/// reference field, in place. The reference must match the shape of a
/// single slice.
pub fn cost(
    values: &mut ArrayD<Float>,
    reference: &ArrayD<Float>,
    metric: Metric,
) -> Result<(), DiagnosticError> {
    if values.shape()[1..] != *reference.shape() {
        return Err(DiagnosticError::ReferenceShapeMismatch);
    }

    for mut slice in values.axis_iter_mut(Axis(0)) {
        Zip::from(&mut slice)
            .and(reference)
            .for_each(|x, &r| *x = metric.apply(*x, r));
    }

    Ok(())
}

/// Horizontal cell weights for a space mean: cell areas with points
/// outside the requested subregion zeroed out.
pub fn subregion_weights(area: &Array2<Float>, lat: &Array2<Float>, subregion: Subregion) -> Array2<Float> {
    let mut weights = area.clone();
    Zip::from(&mut weights).and(lat).for_each(|w, &point_lat| {
        if !subregion.contains(point_lat) {
            *w = 0.0;
        }
    });

    weights
}

/// Weighted mean over the two trailing horizontal axes, skipping
/// non-finite samples. Leading axes (time, depth) are retained.
pub fn horizontal_mean(values: &ArrayD<Float>, weights: &Array2<Float>) -> ArrayD<Float> {
    let shape = values.shape().to_vec();
    let n = shape.len();
    let cells = shape[n - 2] * shape[n - 1];
    let lead: usize = shape[..n - 2].iter().product();

    let standard = values.as_standard_layout();
    let flat = standard.view().into_shape((lead, cells)).unwrap();
    let wflat = weights.view().into_shape(cells).unwrap();

    let mut out = Vec::with_capacity(lead);
    for row in flat.rows() {
        let mut vsum = 0.0;
        let mut wsum = 0.0;
        for (&v, &w) in row.iter().zip(wflat.iter()) {
            if v.is_finite() && w > 0.0 {
                vsum += w * v;
                wsum += w;
            }
        }
        out.push(if wsum > 0.0 { vsum / wsum } else { Float::NAN });
    }

    ArrayD::from_shape_vec(IxDyn(&shape[..n - 2]), out).unwrap()
}

/// Plain mean over the leading (time) axis, skipping non-finite
/// samples per grid point.
pub fn time_mean(values: &ArrayD<Float>) -> ArrayD<Float> {
    nan_mean_axis0(values)
}

/// Plain mean over the leading axis, skipping non-finite samples.
/// Used for the time axis and, on already horizontally-reduced data,
/// for the depth axis.
pub fn nan_mean_axis0(values: &ArrayD<Float>) -> ArrayD<Float> {
    let out_shape = values.shape()[1..].to_vec();
    let mut sums = ArrayD::<Float>::zeros(IxDyn(&out_shape));
    let mut counts = ArrayD::<Float>::zeros(IxDyn(&out_shape));

    for slice in values.axis_iter(Axis(0)) {
        Zip::from(&mut sums)
            .and(&mut counts)
            .and(&slice)
            .for_each(|s, c, &v| {
                if v.is_finite() {
                    *s += v;
                    *c += 1.0;
                }
            });
    }

    Zip::from(&mut sums).and(&counts).for_each(|s, &c| {
        *s = if c > 0.0 { *s / c } else { Float::NAN };
    });

    sums
}

/// Plain mean over the trailing axis, skipping non-finite samples.
pub fn nan_mean_last_axis(values: &ArrayD<Float>) -> ArrayD<Float> {
    let shape = values.shape().to_vec();
    let n = shape.len();
    let last = shape[n - 1];
    let lead: usize = shape[..n - 1].iter().product();

    let standard = values.as_standard_layout();
    let flat = standard.view().into_shape((lead, last)).unwrap();

    let mut out = Vec::with_capacity(lead);
    for row in flat.rows() {
        let mut sum = 0.0;
        let mut count = 0.0;
        for &v in row.iter() {
            if v.is_finite() {
                sum += v;
                count += 1.0;
            }
        }
        out.push(if count > 0.0 { sum / count } else { Float::NAN });
    }

    ArrayD::from_shape_vec(IxDyn(&shape[..n - 1]), out).unwrap()
}

/// Ordinary least-squares fit of a degree-1 polynomial, skipping
/// non-finite samples. Returns `(slope, intercept)`.
pub fn linear_fit(x: &[Float], y: &[Float]) -> Result<(Float, Float), EofError> {
    let samples: Vec<(Float, Float)> = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect();

    if samples.len() < 2 {
        return Err(EofError::DegenerateFit(samples.len()));
    }

    let n = samples.len() as Float;
    let xm = samples.iter().map(|(a, _)| a).sum::<Float>() / n;
    let ym = samples.iter().map(|(_, b)| b).sum::<Float>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (a, b) in &samples {
        sxx += (a - xm) * (a - xm);
        sxy += (a - xm) * (b - ym);
    }

    if sxx == 0.0 {
        return Err(EofError::DegenerateFit(samples.len()));
    }

    let slope = sxy / sxx;
    let intercept = ym - slope * xm;

    Ok((slope, intercept))
}

/// Evaluates a degree-1 polynomial at a scalar coordinate.
pub fn polyval1(slope: Float, intercept: Float, x: Float) -> Float {
    slope * x + intercept
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use ndarray::{arr2, Array, IxDyn};

    fn uniform_weights(ny: usize, nx: usize) -> Array2<Float> {
        Array2::ones((ny, nx))
    }

    #[test]
    fn horizontal_mean_of_constant_is_constant() {
        let values = Array::from_elem(IxDyn(&[2, 3, 3]), 4.5);
        let mean = horizontal_mean(&values, &uniform_weights(3, 3));

        assert_eq!(mean.shape(), &[2]);
        assert_approx_eq!(Float, mean[[0]], 4.5, epsilon = 1e-12);
        assert_approx_eq!(Float, mean[[1]], 4.5, epsilon = 1e-12);
    }

    #[test]
    fn horizontal_mean_skips_masked_points() {
        let mut values = Array::from_elem(IxDyn(&[1, 2, 2]), 2.0);
        values[[0, 0, 0]] = Float::NAN;
        let mean = horizontal_mean(&values, &uniform_weights(2, 2));

        assert_approx_eq!(Float, mean[[0]], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn horizontal_mean_respects_weights() {
        let mut values = Array::zeros(IxDyn(&[1, 1, 2]));
        values[[0, 0, 0]] = 1.0;
        values[[0, 0, 1]] = 3.0;
        let weights = arr2(&[[3.0, 1.0]]);

        let mean = horizontal_mean(&values, &weights);
        assert_approx_eq!(Float, mean[[0]], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn time_mean_skips_missing_steps() {
        let mut values = Array::zeros(IxDyn(&[3, 2, 2]));
        values.index_axis_mut(Axis(0), 0).fill(1.0);
        values.index_axis_mut(Axis(0), 1).fill(3.0);
        values.index_axis_mut(Axis(0), 2).fill(Float::NAN);

        let mean = time_mean(&values);
        assert_eq!(mean.shape(), &[2, 2]);
        assert_approx_eq!(Float, mean[[0, 0]], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn subregion_bands() {
        assert!(Subregion::North.contains(45.0));
        assert!(!Subregion::North.contains(10.0));
        assert!(Subregion::South.contains(-60.0));
        assert!(Subregion::Tropics.contains(0.0));
        assert!(Subregion::Global.contains(-89.0));
        assert!(Subregion::from_label("atlantis").is_err());
    }

    #[test]
    fn cost_metrics() {
        let mut diff = Array::from_elem(IxDyn(&[1, 2]), 3.0);
        let reference = Array::from_elem(IxDyn(&[2]), 2.0);
        cost(&mut diff, &reference, Metric::Diff).unwrap();
        assert_approx_eq!(Float, diff[[0, 0]], 1.0, epsilon = 1e-12);

        let mut rel = Array::from_elem(IxDyn(&[1, 2]), 3.0);
        cost(&mut rel, &reference, Metric::Rel).unwrap();
        assert_approx_eq!(Float, rel[[0, 0]], 1.5, epsilon = 1e-12);

        let mut var = Array::from_elem(IxDyn(&[1, 2]), 3.0);
        cost(&mut var, &reference, Metric::Var).unwrap();
        assert_approx_eq!(Float, var[[0, 0]], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn cost_rejects_mismatched_reference() {
        let mut values = Array::zeros(IxDyn(&[1, 2]));
        let reference = Array::zeros(IxDyn(&[3]));
        assert!(cost(&mut values, &reference, Metric::Diff).is_err());
    }

    #[test]
    fn linear_fit_recovers_known_trend() {
        let x = [1990.0, 1991.0, 1992.0, 1993.0];
        let y = [10.0, 12.0, 14.0, 16.0];
        let (slope, intercept) = linear_fit(&x, &y).unwrap();

        assert_approx_eq!(Float, slope, 2.0, epsilon = 1e-9);
        assert_approx_eq!(Float, polyval1(slope, intercept, 2000.0), 30.0, epsilon = 1e-6);
    }

    #[test]
    fn linear_fit_skips_non_finite_samples() {
        let x = [1990.0, 1991.0, 1992.0, 1993.0];
        let y = [10.0, Float::NAN, 14.0, 16.0];
        let (slope, _) = linear_fit(&x, &y).unwrap();

        assert_approx_eq!(Float, slope, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn linear_fit_needs_two_samples() {
        assert!(linear_fit(&[1990.0], &[1.0]).is_err());
        assert!(linear_fit(&[1990.0, 1990.0], &[1.0, 2.0]).is_err());
    }
}
