//! Evaluation grids.

/// `steps` evenly spaced points from `min` to `max` (both inclusive).
///
/// A single step yields `[min]`; zero steps yield an empty grid.
pub fn linspace(min: f64, max: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (steps as f64 - 1.0);
            let mut out: Vec<f64> = (0..steps).map(|i| min + step * i as f64).collect();
            // Pin the last sample so it is exactly `max`.
            out[steps - 1] = max;
            out
        }
    }
}

/// `(min, max)` of a slice, ignoring NaN. Empty input gives `(+inf, -inf)`.
pub fn range(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_includes_endpoints() {
        let v = linspace(-1.0, 3.0, 5);
        assert_eq!(v, vec![-1.0, 0.0, 1.0, 2.0, 3.0]);
        let v = linspace(0.1, 0.7, 200);
        assert_eq!(v.len(), 200);
        assert_eq!(v[0], 0.1);
        assert_eq!(v[199], 0.7);
    }

    #[test]
    fn degenerate_grids() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(2.0, 5.0, 1), vec![2.0]);
        assert_eq!(linspace(4.0, 4.0, 3), vec![4.0; 3]);
    }

    #[test]
    fn range_of_values() {
        assert_eq!(range(&[3.0, -1.0, 2.0]), (-1.0, 3.0));
    }
}
