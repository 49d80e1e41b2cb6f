use crate::field::SystemField;

/// Dormand-Prince 5(4) embedded pair.
///
/// Holds its stage buffers so repeated steps allocate nothing. After a call to
/// `try_step`, `k1` is the field at the step start and `k7` the field at the
/// proposed end state, which is what the Hermite dense output needs.
pub struct DormandPrince45 {
    pub(crate) k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    k5: Vec<f64>,
    k6: Vec<f64>,
    pub(crate) k7: Vec<f64>,
    tmp: Vec<f64>,
}

impl DormandPrince45 {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            k5: vec![0.0; dim],
            k6: vec![0.0; dim],
            k7: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }

    /// Attempts one step of (signed) size `h` from `state`, writing the
    /// 5th-order result into `out` and returning the mixed error norm. A norm
    /// of at most 1.0 means the step is acceptable at the given tolerances.
    pub fn try_step(
        &mut self,
        field: &SystemField,
        state: &[f64],
        h: f64,
        atol: f64,
        rtol: f64,
        out: &mut [f64],
    ) -> f64 {
        let dim = state.len();

        // Dormand-Prince coefficients.
        let a21 = 1.0 / 5.0;
        let a31 = 3.0 / 40.0;
        let a32 = 9.0 / 40.0;
        let a41 = 44.0 / 45.0;
        let a42 = -56.0 / 15.0;
        let a43 = 32.0 / 9.0;
        let a51 = 19372.0 / 6561.0;
        let a52 = -25360.0 / 2187.0;
        let a53 = 64448.0 / 6561.0;
        let a54 = -212.0 / 729.0;
        let a61 = 9017.0 / 3168.0;
        let a62 = -355.0 / 33.0;
        let a63 = 46732.0 / 5247.0;
        let a64 = 49.0 / 176.0;
        let a65 = -5103.0 / 18656.0;

        // 5th-order weights (also the a7 row: the pair is FSAL).
        let b1 = 35.0 / 384.0;
        let b3 = 500.0 / 1113.0;
        let b4 = 125.0 / 192.0;
        let b5 = -2187.0 / 6784.0;
        let b6 = 11.0 / 84.0;

        // 4th-order weights for the error estimate.
        let e1 = 5179.0 / 57600.0;
        let e3 = 7571.0 / 16695.0;
        let e4 = 393.0 / 640.0;
        let e5 = -92097.0 / 339200.0;
        let e6 = 187.0 / 2100.0;
        let e7 = 1.0 / 40.0;

        field.eval_into(state, &mut self.k1);

        for i in 0..dim {
            self.tmp[i] = state[i] + h * a21 * self.k1[i];
        }
        field.eval_into(&self.tmp, &mut self.k2);

        for i in 0..dim {
            self.tmp[i] = state[i] + h * (a31 * self.k1[i] + a32 * self.k2[i]);
        }
        field.eval_into(&self.tmp, &mut self.k3);

        for i in 0..dim {
            self.tmp[i] =
                state[i] + h * (a41 * self.k1[i] + a42 * self.k2[i] + a43 * self.k3[i]);
        }
        field.eval_into(&self.tmp, &mut self.k4);

        for i in 0..dim {
            self.tmp[i] = state[i]
                + h * (a51 * self.k1[i] + a52 * self.k2[i] + a53 * self.k3[i] + a54 * self.k4[i]);
        }
        field.eval_into(&self.tmp, &mut self.k5);

        for i in 0..dim {
            self.tmp[i] = state[i]
                + h * (a61 * self.k1[i]
                    + a62 * self.k2[i]
                    + a63 * self.k3[i]
                    + a64 * self.k4[i]
                    + a65 * self.k5[i]);
        }
        field.eval_into(&self.tmp, &mut self.k6);

        for i in 0..dim {
            out[i] = state[i]
                + h * (b1 * self.k1[i]
                    + b3 * self.k3[i]
                    + b4 * self.k4[i]
                    + b5 * self.k5[i]
                    + b6 * self.k6[i]);
        }
        field.eval_into(out, &mut self.k7);

        // Error = y5 - y4, scaled per component by atol + rtol * |y|.
        let mut err_sq = 0.0;
        for i in 0..dim {
            let y4 = state[i]
                + h * (e1 * self.k1[i]
                    + e3 * self.k3[i]
                    + e4 * self.k4[i]
                    + e5 * self.k5[i]
                    + e6 * self.k6[i]
                    + e7 * self.k7[i]);
            let scale = atol + rtol * state[i].abs().max(out[i].abs());
            let delta = (out[i] - y4) / scale;
            err_sq += delta * delta;
        }
        (err_sq / dim as f64).sqrt()
    }
}

/// I-controller for the adaptive step size: factor = safety * err^(-1/5),
/// clamped so a single step never grows or shrinks too violently.
#[derive(Debug, Clone, Copy)]
pub struct StepController {
    pub safety: f64,
    pub min_factor: f64,
    pub max_factor: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            min_factor: 0.2,
            max_factor: 5.0,
        }
    }
}

impl StepController {
    pub fn factor(&self, error: f64) -> f64 {
        if error <= 0.0 {
            return self.max_factor;
        }
        (self.safety * error.powf(-0.2)).clamp(self.min_factor, self.max_factor)
    }
}
