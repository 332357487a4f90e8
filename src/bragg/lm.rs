//! Levenberg-Marquardt least squares for six-parameter surface models.

use nalgebra::{Matrix6, Vector6};

/// Damping schedule and stopping rules.
#[derive(Clone, Copy, Debug)]
pub struct LmConfig {
    pub max_iterations: usize,
    /// Stop once the largest parameter update falls below this value.
    pub convergence_threshold: f64,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            convergence_threshold: 1e-8,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LmResult {
    pub params: [f64; 6],
    pub chi2: f64,
    pub converged: bool,
    pub iterations: usize,
}

/// Model `z = f(x, y; p)` fitted by [`optimize`].
pub trait LmModel {
    fn evaluate(&self, x: f64, y: f64, p: &[f64; 6]) -> f64;
    fn jacobian_row(&self, x: f64, y: f64, p: &[f64; 6]) -> [f64; 6];
    /// Projects parameters back into their valid domain after a step.
    fn constrain(&self, _p: &mut [f64; 6]) {}
}

/// Sample `(x, y, z)` of the data being fitted.
pub type Sample = (f64, f64, f64);

fn chi2<M: LmModel>(model: &M, data: &[Sample], p: &[f64; 6]) -> f64 {
    data.iter()
        .map(|&(x, y, z)| {
            let r = z - model.evaluate(x, y, p);
            r * r
        })
        .sum()
}

pub fn optimize<M: LmModel>(model: &M, data: &[Sample], initial: [f64; 6], config: &LmConfig) -> LmResult {
    let mut params = initial;
    let mut lambda = config.initial_lambda;
    let mut prev_chi2 = chi2(model, data, &params);
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..config.max_iterations {
        iterations = iter + 1;
        let mut hessian = Matrix6::<f64>::zeros();
        let mut gradient = Vector6::<f64>::zeros();
        for &(x, y, z) in data {
            let j = Vector6::from(model.jacobian_row(x, y, &params));
            let r = z - model.evaluate(x, y, &params);
            hessian += j * j.transpose();
            gradient += j * r;
        }
        let mut damped = hessian;
        for i in 0..6 {
            damped[(i, i)] *= 1.0 + lambda;
        }
        let Some(delta) = damped.lu().solve(&gradient) else {
            break;
        };

        let mut candidate = params;
        for (p, d) in candidate.iter_mut().zip(delta.iter()) {
            *p += d;
        }
        model.constrain(&mut candidate);
        let new_chi2 = chi2(model, data, &candidate);

        if new_chi2.is_finite() && new_chi2 < prev_chi2 {
            params = candidate;
            prev_chi2 = new_chi2;
            lambda *= config.lambda_down;
            if delta.amax() < config.convergence_threshold {
                converged = true;
                break;
            }
        } else {
            lambda *= config.lambda_up;
            if lambda > 1e10 {
                break;
            }
        }
    }

    LmResult {
        params,
        chi2: prev_chi2,
        converged,
        iterations,
    }
}
