//! Standardisation and ridge least squares.
//!
//! The sequence forecaster regresses the next normalised value on the
//! previous `L` normalised values. With `L` around 30 the normal equations
//! are tiny, so they are solved directly by Gaussian elimination.

use crate::model::HydroError;

/// Below this magnitude a pivot is treated as zero.
const PIVOT_EPSILON: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Scaler
// ---------------------------------------------------------------------------

/// Zero-mean, unit-variance transform with retained parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardScaler {
    pub mean: f64,
    /// Population standard deviation, or 1.0 for a constant series.
    pub scale: f64,
}

impl StandardScaler {
    pub fn fit(values: &[f64]) -> Result<Self, HydroError> {
        if values.is_empty() {
            return Err(HydroError::InsufficientData { needed: 1, found: 0 });
        }
        if let Some(bad) = values.iter().position(|v| !v.is_finite()) {
            return Err(HydroError::MalformedSeries(format!(
                "non-finite value at index {}",
                bad
            )));
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let scale = if std > 0.0 { std } else { 1.0 };
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }

    pub fn inverse(&self, value: f64) -> f64 {
        value * self.scale + self.mean
    }
}

// ---------------------------------------------------------------------------
// Ridge regression
// ---------------------------------------------------------------------------

/// Linear model `y = intercept + coefficients · x`, fitted with an L2
/// penalty on the coefficients (the intercept is not penalised).
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl RidgeRegression {
    /// Fits on `rows` (all of equal length) against `targets`.
    pub fn fit(rows: &[&[f64]], targets: &[f64], lambda: f64) -> Result<Self, HydroError> {
        if rows.is_empty() || rows.len() != targets.len() {
            return Err(HydroError::InsufficientData {
                needed: 1,
                found: rows.len().min(targets.len()),
            });
        }
        let p = rows[0].len();
        if rows.iter().any(|r| r.len() != p) {
            return Err(HydroError::MalformedSeries("ragged feature rows".into()));
        }

        // Augmented system over [x_0 .. x_{p-1}, 1].
        let dim = p + 1;
        let mut a = vec![vec![0.0; dim]; dim];
        let mut b = vec![0.0; dim];
        let mut features = vec![1.0; dim];
        for (row, &y) in rows.iter().zip(targets) {
            features[..p].copy_from_slice(row);
            for i in 0..dim {
                b[i] += features[i] * y;
                for j in i..dim {
                    a[i][j] += features[i] * features[j];
                }
            }
        }
        for i in 0..dim {
            for j in 0..i {
                a[i][j] = a[j][i];
            }
        }
        for (i, row) in a.iter_mut().enumerate().take(p) {
            row[i] += lambda.max(0.0);
        }

        let mut solution = solve(a, b)?;
        let intercept = solution.pop().unwrap_or(0.0);
        Ok(Self {
            coefficients: solution,
            intercept,
        })
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

/// Solves `a · x = b` by Gaussian elimination with partial pivoting.
pub fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, HydroError> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if !(a[pivot][col].abs() > PIVOT_EPSILON) {
            return Err(HydroError::SingularSystem);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaler_round_trips_and_standardises() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let scaler = StandardScaler::fit(&values).unwrap();
        assert!((scaler.mean - 5.0).abs() < 1e-12);
        assert!((scaler.scale - 2.0).abs() < 1e-12);
        assert!((scaler.inverse(scaler.transform(7.5)) - 7.5).abs() < 1e-12);
    }

    #[test]
    fn test_constant_series_gets_unit_scale() {
        let scaler = StandardScaler::fit(&[3.0; 6]).unwrap();
        assert_eq!(scaler.scale, 1.0);
        assert_eq!(scaler.transform(3.0), 0.0);
    }

    #[test]
    fn test_scaler_rejects_empty_and_non_finite() {
        assert!(matches!(
            StandardScaler::fit(&[]),
            Err(HydroError::InsufficientData { .. })
        ));
        assert!(matches!(
            StandardScaler::fit(&[1.0, f64::NAN]),
            Err(HydroError::MalformedSeries(_))
        ));
    }

    #[test]
    fn test_solve_small_system() {
        // 2x + y = 5, x + 3y = 10  →  x = 1, y = 3
        let x = solve(vec![vec![2.0, 1.0], vec![1.0, 3.0]], vec![5.0, 10.0]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_solve_detects_singular_matrix() {
        let err = solve(vec![vec![1.0, 2.0], vec![2.0, 4.0]], vec![1.0, 2.0]).unwrap_err();
        assert_eq!(err, HydroError::SingularSystem);
    }

    #[test]
    fn test_ridge_recovers_linear_relationship() {
        // y = 1 + 2·x0 − 0.5·x1
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i as f64 * 0.37).sin(), (i as f64 * 0.11).cos()])
            .collect();
        let targets: Vec<f64> = rows.iter().map(|r| 1.0 + 2.0 * r[0] - 0.5 * r[1]).collect();
        let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();

        let model = RidgeRegression::fit(&refs, &targets, 1e-9).unwrap();
        assert!((model.intercept - 1.0).abs() < 1e-4);
        assert!((model.coefficients[0] - 2.0).abs() < 1e-4);
        assert!((model.coefficients[1] + 0.5).abs() < 1e-4);
        assert!((model.predict(&[0.5, 0.5]) - 1.75).abs() < 1e-4);
    }

    #[test]
    fn test_ridge_rejects_mismatched_inputs() {
        let row: &[f64] = &[1.0, 2.0];
        assert!(RidgeRegression::fit(&[row], &[], 0.1).is_err());
        assert!(RidgeRegression::fit(&[], &[], 0.1).is_err());
    }
}
