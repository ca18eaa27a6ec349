//! Parameter covariance from a least-squares Jacobian.
//!
//! At the optimum of `minimize Σ r_i(p)²` the (unscaled) covariance of the
//! estimate is `(JᵀJ)⁻¹`. We never form `JᵀJ`: with the thin SVD `J = U S Vᵀ`
//! the inverse is `V S⁻² Vᵀ`, which stays accurate when `JᵀJ` is poorly
//! conditioned.

use nalgebra::DMatrix;

/// `(JᵀJ)⁻¹` for an `m × n` Jacobian with `m ≥ n`.
///
/// Returns `None` when `J` is rank deficient: a zero singular value, or one
/// below `eps · max(m, n) · s_max`.
pub fn covariance_from_jacobian(jacobian: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let (m, n) = jacobian.shape();
    if n == 0 || m < n || !jacobian.iter().all(|v| v.is_finite()) {
        return None;
    }

    let svd = jacobian.clone().svd(false, true);
    let v_t = svd.v_t?;
    let s = &svd.singular_values;

    let s_max = s.max();
    let tol = f64::EPSILON * m.max(n) as f64 * s_max;
    if s_max <= 0.0 || s.iter().any(|&sv| sv <= tol) {
        return None;
    }

    // V · diag(1/s²) · Vᵀ
    let mut scaled = v_t.transpose();
    for (j, &sv) in s.iter().enumerate() {
        let inv = 1.0 / (sv * sv);
        scaled.column_mut(j).scale_mut(inv);
    }
    let cov = &scaled * &v_t;

    // Round-off leaves the product slightly asymmetric.
    Some((&cov + cov.transpose()) * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_normal_equation_inverse() {
        // Design matrix of y = a·x + b on x = [0, 1, 2].
        let j = DMatrix::from_row_slice(3, 2, &[0.0, 1.0, 1.0, 1.0, 2.0, 1.0]);
        let cov = covariance_from_jacobian(&j).unwrap();
        let expected = (j.transpose() * &j).try_inverse().unwrap();
        for (a, b) in cov.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12, "{a} vs {b}");
        }
        assert_eq!(cov[(0, 1)], cov[(1, 0)]);
    }

    #[test]
    fn rank_deficient_jacobian_is_rejected() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        assert!(covariance_from_jacobian(&j).is_none());
        assert!(covariance_from_jacobian(&DMatrix::zeros(3, 2)).is_none());
    }

    #[test]
    fn underdetermined_jacobian_is_rejected() {
        let j = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        assert!(covariance_from_jacobian(&j).is_none());
    }
}
