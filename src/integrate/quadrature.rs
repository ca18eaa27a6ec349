//! One-dimensional integration rules.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Integrand, IntegrateError, compile_in};
use crate::math::grid::linspace;

/// Sample count of the fixed-grid trapezoid rule.
pub const TRAPEZOID_POINTS: usize = 1000;

/// Sample count of the fixed-grid Simpson rule (odd, so intervals pair up).
pub const SIMPSON_POINTS: usize = 1001;

/// Absolute and relative target accuracy of the adaptive rules.
const TOLERANCE: f64 = 1.49e-8;

/// Evaluation budget of adaptive Simpson.
const MAX_QUAD_EVALS: usize = 100_000;

/// Bisection depth of adaptive Simpson.
const MAX_QUAD_DEPTH: u32 = 50;

/// Rows of the Romberg tableau (`2^(rows - 1) + 1` samples at most).
const ROMBERG_ROWS: usize = 11;

const NON_FINITE_SAMPLES: &str = "Function has infinite or undefined values in integration range";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QuadratureMethod {
    /// Adaptive Simpson with an error estimate.
    #[default]
    Quad,
    Trapezoid,
    Simpson,
    Romberg,
}

impl QuadratureMethod {
    pub const ALL: [QuadratureMethod; 4] = [
        QuadratureMethod::Quad,
        QuadratureMethod::Trapezoid,
        QuadratureMethod::Simpson,
        QuadratureMethod::Romberg,
    ];

    pub fn id(self) -> &'static str {
        match self {
            QuadratureMethod::Quad => "quad",
            QuadratureMethod::Trapezoid => "trapezoid",
            QuadratureMethod::Simpson => "simpson",
            QuadratureMethod::Romberg => "romberg",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_id(id: &str) -> Option<Self> {
        let id = id.trim().to_lowercase();
        Self::ALL.into_iter().find(|m| m.id() == id)
    }

    pub fn description(self) -> &'static str {
        match self {
            QuadratureMethod::Quad => "Adaptive quadrature (recommended)",
            QuadratureMethod::Trapezoid => "Trapezoidal rule",
            QuadratureMethod::Simpson => "Simpson's rule",
            QuadratureMethod::Romberg => "Romberg integration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integral1dRequest {
    #[serde(default)]
    pub function: String,
    /// `[a, b]`; `a > b` integrates backwards.
    #[serde(default)]
    pub bounds: Vec<f64>,
    /// Defaults to `quad`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// Outcome of a 1D integral.
///
/// A diverging integrand is a result, not an error: `diverged` is set,
/// `result` is `null` and `warning` says why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Integral1dResult {
    pub result: Option<f64>,
    pub error_estimate: Option<f64>,
    pub warning: Option<String>,
    pub diverged: bool,
}

impl Integral1dResult {
    fn diverged(warning: &str) -> Self {
        Self {
            result: None,
            error_estimate: None,
            warning: Some(warning.to_string()),
            diverged: true,
        }
    }

    fn finite(result: f64, error_estimate: Option<f64>, warning: Option<String>) -> Self {
        if !result.is_finite() {
            return Self::diverged("Integral diverges or is undefined");
        }
        Self {
            result: Some(result),
            error_estimate,
            warning,
            diverged: false,
        }
    }
}

pub fn integrate_1d(request: &Integral1dRequest) -> Result<Integral1dResult, IntegrateError> {
    if request.function.trim().is_empty() {
        return Err(IntegrateError::MissingFunction);
    }
    let &[a, b] = request.bounds.as_slice() else {
        return Err(IntegrateError::BadBounds);
    };
    if !a.is_finite() || !b.is_finite() {
        return Err(IntegrateError::NonFiniteBounds);
    }
    let method = match request.method.as_deref() {
        None => QuadratureMethod::default(),
        Some(name) => QuadratureMethod::from_id(name)
            .ok_or_else(|| IntegrateError::UnknownMethod(name.trim().to_lowercase()))?,
    };

    let program = compile_in(&request.function, &["x"], IntegrateError::Expression)?;
    let mut f = Integrand::new(program);
    let mut at = |x: f64| f.at(&[x]);

    let result = match method {
        QuadratureMethod::Quad => adaptive_simpson(&mut at, a, b),
        QuadratureMethod::Trapezoid => trapezoid(&mut at, a, b),
        QuadratureMethod::Simpson => simpson(&mut at, a, b),
        QuadratureMethod::Romberg => romberg(&mut at, a, b),
    };
    debug!(
        method = method.id(),
        a,
        b,
        diverged = result.diverged,
        "integrated"
    );
    Ok(result)
}

/// Function values on `linspace(a, b, n)`, or `None` if any is non-finite.
fn sample_grid(f: &mut impl FnMut(f64) -> f64, a: f64, b: f64, n: usize) -> Option<(Vec<f64>, Vec<f64>)> {
    let xs = linspace(a, b, n);
    let ys: Vec<f64> = xs.iter().map(|&x| f(x)).collect();
    ys.iter().all(|y| y.is_finite()).then_some((xs, ys))
}

fn trapezoid(f: &mut impl FnMut(f64) -> f64, a: f64, b: f64) -> Integral1dResult {
    let Some((xs, ys)) = sample_grid(f, a, b, TRAPEZOID_POINTS) else {
        return Integral1dResult::diverged(NON_FINITE_SAMPLES);
    };
    let area: f64 = xs
        .windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| 0.5 * (x[1] - x[0]) * (y[0] + y[1]))
        .sum();
    Integral1dResult::finite(area, None, None)
}

fn simpson(f: &mut impl FnMut(f64) -> f64, a: f64, b: f64) -> Integral1dResult {
    let Some((_, ys)) = sample_grid(f, a, b, SIMPSON_POINTS) else {
        return Integral1dResult::diverged(NON_FINITE_SAMPLES);
    };
    let n = ys.len() - 1;
    let h = (b - a) / n as f64;
    let inner: f64 = ys[1..n]
        .iter()
        .enumerate()
        .map(|(i, y)| if i % 2 == 0 { 4.0 * y } else { 2.0 * y })
        .sum();
    Integral1dResult::finite(h / 3.0 * (ys[0] + inner + ys[n]), None, None)
}

struct Segment {
    a: f64,
    b: f64,
    fa: f64,
    fm: f64,
    fb: f64,
    whole: f64,
    tol: f64,
    depth: u32,
}

/// Adaptive Simpson over an explicit work list.
///
/// Each accepted panel contributes its Richardson-corrected estimate and
/// `|delta| / 15` to the error estimate.
fn adaptive_simpson(f: &mut impl FnMut(f64) -> f64, a: f64, b: f64) -> Integral1dResult {
    let m = 0.5 * (a + b);
    let (fa, fm, fb) = (f(a), f(m), f(b));
    if !(fa.is_finite() && fm.is_finite() && fb.is_finite()) {
        return Integral1dResult::diverged(NON_FINITE_SAMPLES);
    }
    let whole = (b - a) / 6.0 * (fa + 4.0 * fm + fb);
    let mut pending = vec![Segment {
        a,
        b,
        fa,
        fm,
        fb,
        whole,
        tol: TOLERANCE.max(TOLERANCE * whole.abs()),
        depth: 0,
    }];

    let mut evals = 3;
    let mut total = 0.0;
    let mut error = 0.0;
    let mut exhausted = false;
    while let Some(seg) = pending.pop() {
        let m = 0.5 * (seg.a + seg.b);
        let lm = 0.5 * (seg.a + m);
        let rm = 0.5 * (m + seg.b);
        let (flm, frm) = (f(lm), f(rm));
        evals += 2;
        if !(flm.is_finite() && frm.is_finite()) {
            return Integral1dResult::diverged(NON_FINITE_SAMPLES);
        }
        let left = (m - seg.a) / 6.0 * (seg.fa + 4.0 * flm + seg.fm);
        let right = (seg.b - m) / 6.0 * (seg.fm + 4.0 * frm + seg.fb);
        let delta = left + right - seg.whole;

        let converged = delta.abs() <= 15.0 * seg.tol;
        let out_of_budget = seg.depth >= MAX_QUAD_DEPTH || evals + 2 * pending.len() >= MAX_QUAD_EVALS;
        if converged || out_of_budget {
            exhausted |= !converged;
            total += left + right + delta / 15.0;
            error += delta.abs() / 15.0;
            continue;
        }
        let tol = 0.5 * seg.tol;
        let depth = seg.depth + 1;
        pending.push(Segment {
            a: seg.a,
            b: m,
            fa: seg.fa,
            fm: flm,
            fb: seg.fm,
            whole: left,
            tol,
            depth,
        });
        pending.push(Segment {
            a: m,
            b: seg.b,
            fa: seg.fm,
            fm: frm,
            fb: seg.fb,
            whole: right,
            tol,
            depth,
        });
    }

    let warning = if error > 0.01 * total.abs() {
        Some("Large integration error; result may be inaccurate".to_string())
    } else if exhausted {
        Some("Maximum number of subdivisions reached; result may be inaccurate".to_string())
    } else {
        None
    };
    debug!(evals, error, "adaptive simpson finished");
    Integral1dResult::finite(total, (error > 0.0).then_some(error), warning)
}

/// Romberg extrapolation of successively halved trapezoid sums.
fn romberg(f: &mut impl FnMut(f64) -> f64, a: f64, b: f64) -> Integral1dResult {
    let (fa, fb) = (f(a), f(b));
    if !(fa.is_finite() && fb.is_finite()) {
        return Integral1dResult::diverged(NON_FINITE_SAMPLES);
    }
    let mut prev = vec![0.5 * (b - a) * (fa + fb)];
    let mut last_change = f64::INFINITY;

    for k in 1..ROMBERG_ROWS {
        let panels = 1usize << k;
        let h = (b - a) / panels as f64;
        let mut midpoints = 0.0;
        for i in (1..panels).step_by(2) {
            let y = f(a + h * i as f64);
            if !y.is_finite() {
                return Integral1dResult::diverged(NON_FINITE_SAMPLES);
            }
            midpoints += y;
        }

        let mut row = Vec::with_capacity(k + 1);
        row.push(0.5 * prev[0] + h * midpoints);
        let mut factor = 1.0;
        for j in 1..=k {
            factor *= 4.0;
            row.push(row[j - 1] + (row[j - 1] - prev[j - 1]) / (factor - 1.0));
        }

        let best = row[k];
        last_change = (best - prev[k - 1]).abs();
        prev = row;
        if last_change <= TOLERANCE.max(TOLERANCE * best.abs()) {
            return Integral1dResult::finite(best, Some(last_change), None);
        }
    }

    let best = prev[prev.len() - 1];
    Integral1dResult::finite(
        best,
        Some(last_change),
        Some("Romberg integration did not converge; result may be inaccurate".to_string()),
    )
}
