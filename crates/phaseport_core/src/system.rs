use crate::equilibrium::{self, Equilibrium1D, Equilibrium2D};
use crate::error::InputError;
use crate::field::{NamedSystem, SprottVariant, SystemField};
use crate::sampler::{self, FieldGrid, LineGraph};
use crate::trajectory::{integrate_trajectory, IntegrationSettings, Trajectory};
use anyhow::Result;
use nalgebra::{Matrix2, Vector2};

/// Output samples for a 3D trajectory solve, long enough to draw a smooth
/// strange attractor.
pub const DEFAULT_3D_POINTS: usize = 5000;

/// A 1D session object: the field plus the last computed equilibrium set.
///
/// The cache is replaced wholesale after a search completes, never updated
/// incrementally, so readers always observe a consistent set. A failed search
/// leaves the previous result in place.
pub struct System1D {
    field: SystemField,
    equilibria: Option<Vec<Equilibrium1D>>,
}

impl System1D {
    pub fn new(field: SystemField) -> Result<Self> {
        if field.dimension() != 1 {
            return Err(InputError::DimensionMismatch {
                expected: 1,
                got: field.dimension(),
            }
            .into());
        }
        Ok(Self {
            field,
            equilibria: None,
        })
    }

    pub fn field(&self) -> &SystemField {
        &self.field
    }

    /// Runs the multi-seed search and replaces the cached set on success.
    pub fn find_equilibria(
        &mut self,
        range: (f64, f64),
        n_seeds: usize,
    ) -> Result<&[Equilibrium1D]> {
        let found = equilibrium::find_equilibria_1d(&self.field, range, n_seeds)?;
        self.equilibria = Some(found);
        Ok(self.equilibria.as_deref().unwrap_or_default())
    }

    /// The result of the most recent successful search, if any.
    pub fn last_equilibria(&self) -> Option<&[Equilibrium1D]> {
        self.equilibria.as_deref()
    }

    pub fn solve(
        &self,
        x0: f64,
        t_span: (f64, f64),
        n_points: usize,
        settings: IntegrationSettings,
    ) -> Result<Trajectory> {
        integrate_trajectory(&self.field, &[x0], t_span, n_points, settings)
    }

    /// Samples f(x) for the phase-line plot.
    pub fn graph(&self, range: (f64, f64), resolution: usize) -> Result<LineGraph> {
        sampler::sample_line_field(&self.field, range, resolution)
    }
}

/// A 2D session object, mirroring `System1D`.
pub struct System2D {
    field: SystemField,
    equilibria: Option<Vec<Equilibrium2D>>,
}

impl System2D {
    pub fn custom(
        f: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
        g: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            field: SystemField::custom_2d(f, g),
            equilibria: None,
        }
    }

    pub fn linear(a: Matrix2<f64>, b: Vector2<f64>) -> Self {
        Self {
            field: SystemField::linear_2d(a, b),
            equilibria: None,
        }
    }

    pub fn new(field: SystemField) -> Result<Self> {
        if field.dimension() != 2 {
            return Err(InputError::DimensionMismatch {
                expected: 2,
                got: field.dimension(),
            }
            .into());
        }
        Ok(Self {
            field,
            equilibria: None,
        })
    }

    pub fn field(&self) -> &SystemField {
        &self.field
    }

    /// For a linear system X' = AX + b the unique equilibrium -A^-1 b, solved
    /// directly instead of by seed scan. `None` for non-linear fields and for
    /// singular A (a line or plane of equilibria, which the seed scan handles).
    pub fn linear_equilibrium(&self) -> Option<Equilibrium2D> {
        let SystemField::Linear2D { a, b } = &self.field else {
            return None;
        };
        let inverse = a.try_inverse()?;
        let point = -(inverse * b);
        Some(Equilibrium2D {
            point: [point[0], point[1]],
            classification: equilibrium::classify_2d(&self.field, point[0], point[1]),
        })
    }

    pub fn find_equilibria(
        &mut self,
        x_range: (f64, f64),
        y_range: (f64, f64),
        n_seeds: usize,
    ) -> Result<&[Equilibrium2D]> {
        let found = equilibrium::find_equilibria_2d(&self.field, x_range, y_range, n_seeds)?;
        self.equilibria = Some(found);
        Ok(self.equilibria.as_deref().unwrap_or_default())
    }

    pub fn last_equilibria(&self) -> Option<&[Equilibrium2D]> {
        self.equilibria.as_deref()
    }

    pub fn solve(
        &self,
        initial: [f64; 2],
        t_span: (f64, f64),
        n_points: usize,
        settings: IntegrationSettings,
    ) -> Result<Trajectory> {
        integrate_trajectory(&self.field, &initial, t_span, n_points, settings)
    }

    /// Samples both field components over a regular grid; the same grid feeds
    /// the arrow plot and the nullcline contours.
    pub fn vector_field(
        &self,
        x_range: (f64, f64),
        y_range: (f64, f64),
        resolution: usize,
    ) -> Result<FieldGrid> {
        sampler::sample_plane_field(&self.field, x_range, y_range, resolution)
    }
}

/// A named 3D system. Equilibria come from closed forms, so there is no cache
/// to manage.
pub struct System3D {
    named: NamedSystem,
    field: SystemField,
}

impl System3D {
    pub fn new(named: NamedSystem) -> Self {
        Self {
            named,
            field: SystemField::Named3D(named),
        }
    }

    pub fn lorenz(sigma: f64, rho: f64, beta: f64) -> Self {
        Self::new(NamedSystem::lorenz(sigma, rho, beta))
    }

    pub fn rossler(a: f64, b: f64, c: f64) -> Self {
        Self::new(NamedSystem::rossler(a, b, c))
    }

    pub fn chua(alpha: f64, beta: f64, m0: f64, m1: f64) -> Self {
        Self::new(NamedSystem::chua(alpha, beta, m0, m1))
    }

    pub fn sprott(variant: SprottVariant) -> Self {
        Self::new(NamedSystem::Sprott(variant))
    }

    pub fn field(&self) -> &SystemField {
        &self.field
    }

    pub fn equilibria(&self) -> Vec<[f64; 3]> {
        self.named.equilibria()
    }

    pub fn solve(
        &self,
        initial: [f64; 3],
        t_span: (f64, f64),
        settings: IntegrationSettings,
    ) -> Result<Trajectory> {
        integrate_trajectory(&self.field, &initial, t_span, DEFAULT_3D_POINTS, settings)
    }
}
