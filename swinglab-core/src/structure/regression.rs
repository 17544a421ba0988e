//! Linear regression channel over trailing closes.
//!
//! Fits close = slope·x + intercept by least squares and reports the band two
//! standard deviations of the residuals below the fitted value at the last bar.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionChannel {
    pub slope: f64,
    pub fitted_last: f64,
    pub std_dev: f64,
}

impl RegressionChannel {
    /// Channel over the trailing `period` closes (needs at least 2).
    pub fn fit(bars: &[Bar], period: usize) -> Option<Self> {
        let take = period.min(bars.len());
        if take < 2 {
            return None;
        }
        let ys: Vec<f64> = bars[bars.len() - take..].iter().map(|b| b.close).collect();
        let (slope, intercept) = least_squares(&ys)?;

        let n = ys.len() as f64;
        let var = ys
            .iter()
            .enumerate()
            .map(|(x, y)| {
                let r = y - (slope * x as f64 + intercept);
                r * r
            })
            .sum::<f64>()
            / n;

        Some(Self {
            slope,
            fitted_last: slope * (n - 1.0) + intercept,
            std_dev: var.sqrt(),
        })
    }

    pub fn lower_band(&self) -> f64 {
        self.fitted_last - 2.0 * self.std_dev
    }

    pub fn upper_band(&self) -> f64 {
        self.fitted_last + 2.0 * self.std_dev
    }

    /// Close within 0.5% above the lower band, or below it.
    pub fn at_lower(&self, close: f64) -> bool {
        close <= self.lower_band() * 1.005
    }
}

/// Ordinary least squares of `ys` against 0..n. Returns (slope, intercept).
pub fn least_squares(ys: &[f64]) -> Option<(f64, f64)> {
    let points: Vec<(f64, f64)> = ys.iter().enumerate().map(|(x, y)| (x as f64, *y)).collect();
    least_squares_xy(&points)
}

/// Ordinary least squares over explicit (x, y) points.
pub fn least_squares_xy(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    let n = points.len() as f64;
    if points.len() < 2 {
        return None;
    }
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = points.iter().map(|p| (p.0 - mean_x) * (p.1 - mean_y)).sum();
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}
