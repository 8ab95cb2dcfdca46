//! Seasonal ARIMA (0,1,1)(0,1,1)[m], the "airline" model
//!
//! With `w_t = y_t - y_{t-1} - y_{t-m} + y_{t-m-1}` the model is
//! `w_t = e_t + θ e_{t-1} + Θ e_{t-m} + θΘ e_{t-m-1}`.
//! θ and Θ are estimated by conditional sum of squares with pre-sample
//! innovations set to zero. Only the last `m + 1` observations and innovations
//! are needed to keep forecasting, so that is all the state keeps.
//!
//! Past `m + 1` steps ahead every innovation in the recursion is a future one,
//! so `w = 0` and the seasonal difference `y_{n+h} - y_{n+h-m}` is a constant
//! drift `d`. A step further out than `2m + 2` is then the step a whole number
//! `k` of seasons earlier plus `k d`, which keeps distant windows O(len).

use super::search::{minimize_2d, GridSpec};
use super::{ensure_finite, ModelError, ModelResult, SeasonalModel, MIN_FIT_OBSERVATIONS};
use serde::{Deserialize, Serialize};

const MA_GRID: GridSpec = GridSpec {
    lower: -0.95,
    upper: 0.95,
    coarse_step: 0.1,
    fine_step: 0.01,
};

/// Fitted airline-model state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarimaFit {
    theta: f64,
    seasonal_theta: f64,
    period: usize,
    /// Last `period + 1` observations, oldest first
    history: Vec<f64>,
    /// Innovations aligned with `history`
    residuals: Vec<f64>,
    nobs: usize,
    sse: f64,
}

impl SarimaFit {
    /// Observations needed to fit with the given period
    pub fn required_observations(period: usize) -> usize {
        period + 1 + MIN_FIT_OBSERVATIONS
    }

    /// Estimate θ, Θ and the trailing state from a full series
    pub fn fit(values: &[f64], period: usize) -> ModelResult<Self> {
        if period == 0 {
            return Err(ModelError::InvalidData("seasonal period must be positive".into()));
        }
        let required = Self::required_observations(period);
        if values.len() < required {
            return Err(ModelError::InsufficientData {
                required,
                actual: values.len(),
            });
        }
        ensure_finite(values)?;

        let best = minimize_2d(MA_GRID, |theta, seasonal_theta| {
            innovations(values, period, theta, seasonal_theta).1
        });
        let (theta, seasonal_theta) = (best.x, best.y);
        let (residuals, sse) = innovations(values, period, theta, seasonal_theta);

        let tail = values.len() - (period + 1);
        Ok(Self {
            theta,
            seasonal_theta,
            period,
            history: values[tail..].to_vec(),
            residuals: residuals[tail..].to_vec(),
            nobs: values.len(),
            sse,
        })
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn seasonal_theta(&self) -> f64 {
        self.seasonal_theta
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn sse(&self) -> f64 {
        self.sse
    }

    fn check_state(&self) -> ModelResult<()> {
        let window = self.period + 1;
        if self.period == 0 || self.history.len() != window || self.residuals.len() != window {
            return Err(ModelError::IncompatibleState(format!(
                "state window {}/{} for period {}",
                self.history.len(),
                self.residuals.len(),
                self.period
            )));
        }
        Ok(())
    }

    /// Conditional mean of the next value given buffers ending at `t - 1`
    fn predict_next(&self, y: &[f64], e: &[f64]) -> f64 {
        let k = y.len();
        let m = self.period;
        y[k - 1] + y[k - m] - y[k - m - 1]
            + self.theta * e[k - 1]
            + self.seasonal_theta * e[k - m]
            + self.theta * self.seasonal_theta * e[k - m - 1]
    }

    /// Run the recursion `steps` ahead with future innovations at zero
    fn recurse(&self, steps: usize) -> Vec<f64> {
        let mut y = self.history.clone();
        let mut e = self.residuals.clone();
        y.reserve(steps);
        e.reserve(steps);

        for _ in 0..steps {
            let next = self.predict_next(&y, &e);
            y.push(next);
            e.push(0.0);
        }

        y.split_off(self.period + 1)
    }
}

impl SeasonalModel for SarimaFit {
    fn nobs(&self) -> usize {
        self.nobs
    }

    fn append(&mut self, observations: &[f64]) -> ModelResult<()> {
        self.check_state()?;
        ensure_finite(observations)?;

        for &y in observations {
            let predicted = self.predict_next(&self.history, &self.residuals);
            let error = y - predicted;
            self.sse += error * error;
            self.history.push(y);
            self.residuals.push(error);
        }

        let excess = self.history.len() - (self.period + 1);
        self.history.drain(..excess);
        self.residuals.drain(..excess);
        self.nobs += observations.len();
        Ok(())
    }

    fn forecast_window(&self, skip: u64, len: usize) -> ModelResult<Vec<f64>> {
        self.check_state()?;

        let m = self.period as u64;
        let settled = 2 * m + 2;
        let end = skip.saturating_add(len as u64);

        // Steps 1..=min(end, settled), index h - 1
        let path = self.recurse(end.min(settled) as usize);
        if end <= settled {
            return Ok(path[skip as usize..].to_vec());
        }

        let drift = path[(settled - 1) as usize] - path[(settled - m - 1) as usize];
        Ok((skip + 1..=end)
            .map(|h| {
                if h <= settled {
                    return path[(h - 1) as usize];
                }
                let seasons = (h - settled).div_ceil(m);
                path[(h - seasons * m - 1) as usize] + seasons as f64 * drift
            })
            .collect())
    }
}

/// CSS innovations for the whole series and their sum of squares
fn innovations(values: &[f64], period: usize, theta: f64, seasonal_theta: f64) -> (Vec<f64>, f64) {
    let m = period;
    let mut e = vec![0.0; values.len()];
    let mut sse = 0.0;

    for t in (m + 1)..values.len() {
        let w = values[t] - values[t - 1] - values[t - m] + values[t - m - 1];
        let error = w - theta * e[t - 1] - seasonal_theta * e[t - m] - theta * seasonal_theta * e[t - m - 1];
        e[t] = error;
        sse += error * error;
    }

    (e, sse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecasting::SEASONAL_PERIOD;
    use std::f64::consts::PI;

    fn daily(i: usize) -> f64 {
        5.0 + 2.0 * (2.0 * PI * i as f64 / SEASONAL_PERIOD as f64).cos()
    }

    #[test]
    fn test_requires_more_than_one_season() {
        let values = vec![1.0; SEASONAL_PERIOD + 5];
        assert!(matches!(
            SarimaFit::fit(&values, SEASONAL_PERIOD),
            Err(ModelError::InsufficientData { required: 107, .. })
        ));
    }

    #[test]
    fn test_constant_series_forecasts_constant() {
        let values = vec![4.0; 2 * SEASONAL_PERIOD];
        let fit = SarimaFit::fit(&values, SEASONAL_PERIOD).unwrap();
        let forecast = fit.forecast(10).unwrap();
        assert!(forecast.iter().all(|v| (v - 4.0).abs() < 1e-9));
    }

    #[test]
    fn test_periodic_series_repeats_season() {
        let values: Vec<f64> = (0..3 * SEASONAL_PERIOD).map(daily).collect();
        let fit = SarimaFit::fit(&values, SEASONAL_PERIOD).unwrap();
        let forecast = fit.forecast(2 * SEASONAL_PERIOD).unwrap();

        assert_eq!(forecast.len(), 2 * SEASONAL_PERIOD);
        for (h, predicted) in forecast.iter().enumerate() {
            assert!((predicted - daily(values.len() + h)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_distant_window_matches_full_recursion() {
        let values: Vec<f64> = (0..2 * SEASONAL_PERIOD).map(|i| daily(i) + 0.02 * i as f64).collect();
        let fit = SarimaFit::fit(&values, SEASONAL_PERIOD).unwrap();

        for skip in [0, 150, 9 * SEASONAL_PERIOD + 5] {
            let full = fit.recurse(skip + SEASONAL_PERIOD);
            let window = fit.forecast_window(skip as u64, SEASONAL_PERIOD).unwrap();
            assert_eq!(window.len(), SEASONAL_PERIOD);
            for (got, want) in window.iter().zip(&full[skip..]) {
                assert!((got - want).abs() < 1e-6, "skip {}: {} vs {}", skip, got, want);
            }
        }
    }

    #[test]
    fn test_append_then_forecast() {
        let values: Vec<f64> = (0..2 * SEASONAL_PERIOD).map(|i| daily(i) + 0.01 * i as f64).collect();
        let mut fit = SarimaFit::fit(&values, SEASONAL_PERIOD).unwrap();
        let (theta, seasonal_theta) = (fit.theta(), fit.seasonal_theta());

        let newer: Vec<f64> = (values.len()..values.len() + 30)
            .map(|i| daily(i) + 0.01 * i as f64)
            .collect();
        fit.append(&newer).unwrap();

        assert_eq!(fit.nobs(), 2 * SEASONAL_PERIOD + 30);
        assert_eq!(fit.history.len(), SEASONAL_PERIOD + 1);
        assert_eq!((fit.theta(), fit.seasonal_theta()), (theta, seasonal_theta));

        let forecast = fit.forecast(96).unwrap();
        assert_eq!(forecast.len(), 96);
        assert!(forecast.iter().all(|v| v.is_finite()));
    }
}
