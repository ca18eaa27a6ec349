//! Monte Carlo integration over boxes of two to six dimensions.
//!
//! Samples are drawn uniformly from the bounding box. With a `condition`,
//! only points where it holds (non-zero and not NaN) contribute, and the
//! region's volume is estimated from the accepted fraction.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Integrand, IntegrateError, VARIABLES, compile_in};

pub const DEFAULT_SAMPLES: usize = 100_000;
pub const MAX_SAMPLES: usize = 10_000_000;

fn default_samples() -> usize {
    DEFAULT_SAMPLES
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegralMultiRequest {
    #[serde(default)]
    pub function: String,
    /// `[[x_min, x_max], [y_min, y_max], ...]`.
    #[serde(default)]
    pub bounds: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default = "default_samples")]
    pub num_samples: usize,
    /// Fixed seed for reproducible estimates; random when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegralMultiResult {
    pub result: f64,
    pub error_estimate: f64,
    /// Box volume, scaled by the accepted fraction under a condition.
    pub volume: f64,
    pub method: &'static str,
    pub seed: u64,
}

pub fn integrate_multi(request: &IntegralMultiRequest) -> Result<IntegralMultiResult, IntegrateError> {
    if request.function.trim().is_empty() {
        return Err(IntegrateError::MissingFunction);
    }
    let ndim = request.bounds.len();
    match ndim {
        0 => return Err(IntegrateError::MissingBounds),
        1 => return Err(IntegrateError::UseOneDimensional),
        n if n > VARIABLES.len() => {
            return Err(IntegrateError::TooManyDimensions { max: VARIABLES.len() });
        }
        _ => {}
    }
    let mut bounds = Vec::with_capacity(ndim);
    for b in &request.bounds {
        let &[lo, hi] = b.as_slice() else {
            return Err(IntegrateError::BadBounds);
        };
        if !lo.is_finite() || !hi.is_finite() {
            return Err(IntegrateError::NonFiniteBounds);
        }
        bounds.push((lo, hi));
    }
    if request.num_samples == 0 || request.num_samples > MAX_SAMPLES {
        return Err(IntegrateError::SampleCount { max: MAX_SAMPLES });
    }

    let variables = &VARIABLES[..ndim];
    let mut f = Integrand::new(compile_in(&request.function, variables, IntegrateError::Expression)?);
    let mut condition = request
        .condition
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(|c| compile_in(c, variables, IntegrateError::Condition).map(Integrand::new))
        .transpose()?;

    let seed = request.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut point = vec![0.0; ndim];
    let mut stats = RunningStats::default();
    for _ in 0..request.num_samples {
        for (p, &(lo, hi)) in point.iter_mut().zip(&bounds) {
            *p = lo + (hi - lo) * rng.r#gen::<f64>();
        }
        if let Some(cond) = condition.as_mut() {
            let c = cond.at(&point);
            if c == 0.0 || c.is_nan() {
                continue;
            }
        }
        let v = f.at(&point);
        if !v.is_finite() {
            return Err(IntegrateError::NotFinite);
        }
        stats.push(v);
    }
    if stats.count == 0 {
        return Err(IntegrateError::EmptyRegion);
    }

    let box_volume: f64 = bounds.iter().map(|(lo, hi)| hi - lo).product();
    let volume = box_volume * stats.count as f64 / request.num_samples as f64;
    let result = stats.mean * volume;
    let error_estimate = stats.std_dev() * volume.abs() / (stats.count as f64).sqrt();
    debug!(
        ndim,
        samples = request.num_samples,
        accepted = stats.count,
        seed,
        "monte carlo integral"
    );

    Ok(IntegralMultiResult {
        result,
        error_estimate,
        volume,
        method: "monte_carlo",
        seed,
    })
}

/// Welford accumulator; `std_dev` is the population deviation.
#[derive(Debug, Default)]
struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn push(&mut self, v: f64) {
        self.count += 1;
        let delta = v - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (v - self.mean);
    }

    fn std_dev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.m2 / self.count as f64).sqrt()
    }
}
