use crate::error::{check_range, InputError};
use crate::field::SystemField;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// `n` evenly spaced values over `[min, max]`, endpoints included. `n >= 2`.
pub(crate) fn linspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    debug_assert!(n >= 2);
    let step = (max - min) / (n - 1) as f64;
    (0..n).map(|i| min + step * i as f64).collect()
}

/// f(x) sampled over a 1D range, for the phase-line graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineGraph {
    pub xs: Vec<f64>,
    /// f(xs[i]); NaN where the field is undefined.
    pub fx: Vec<f64>,
}

/// Both components of a 2D field sampled over a regular grid.
///
/// This is the data behind the vector-field arrows and the nullclines: the
/// dx/dt = 0 and dy/dt = 0 curves are the zero contours of `u` and `v`,
/// extracted by the rendering layer. Values are row-major with y as the outer
/// index; undefined cells hold NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldGrid {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub u: Vec<f64>,
    pub v: Vec<f64>,
}

impl FieldGrid {
    /// (u, v) at grid cell (ix, iy).
    pub fn at(&self, ix: usize, iy: usize) -> (f64, f64) {
        let idx = iy * self.xs.len() + ix;
        (self.u[idx], self.v[idx])
    }
}

/// Samples a 1D field over `resolution` evenly spaced points.
pub fn sample_line_field(
    field: &SystemField,
    range: (f64, f64),
    resolution: usize,
) -> Result<LineGraph> {
    if field.dimension() != 1 {
        return Err(InputError::DimensionMismatch {
            expected: 1,
            got: field.dimension(),
        }
        .into());
    }
    check_range(range.0, range.1)?;
    if resolution < 2 {
        return Err(InputError::TooFewSamples {
            min: 2,
            got: resolution,
        }
        .into());
    }

    let xs = linspace(range.0, range.1, resolution);
    let mut fx = Vec::with_capacity(resolution);
    let mut out = [0.0];
    for &x in &xs {
        field.eval_or_nan(&[x], &mut out);
        fx.push(out[0]);
    }
    Ok(LineGraph { xs, fx })
}

/// Samples a 2D field over a resolution x resolution grid. A cell where the
/// field is undefined is recorded as NaN; the grid is never aborted.
pub fn sample_plane_field(
    field: &SystemField,
    x_range: (f64, f64),
    y_range: (f64, f64),
    resolution: usize,
) -> Result<FieldGrid> {
    if field.dimension() != 2 {
        return Err(InputError::DimensionMismatch {
            expected: 2,
            got: field.dimension(),
        }
        .into());
    }
    check_range(x_range.0, x_range.1)?;
    check_range(y_range.0, y_range.1)?;
    if resolution < 2 {
        return Err(InputError::TooFewSamples {
            min: 2,
            got: resolution,
        }
        .into());
    }

    let xs = linspace(x_range.0, x_range.1, resolution);
    let ys = linspace(y_range.0, y_range.1, resolution);
    let mut u = Vec::with_capacity(resolution * resolution);
    let mut v = Vec::with_capacity(resolution * resolution);
    let mut out = [0.0, 0.0];
    for &y in &ys {
        for &x in &xs {
            field.eval_or_nan(&[x, y], &mut out);
            u.push(out[0]);
            v.push(out[1]);
        }
    }
    Ok(FieldGrid { xs, ys, u, v })
}
