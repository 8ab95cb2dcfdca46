//! Additive Holt-Winters without trend
//!
//! Recursions for observation `y_t` with season slot `s = t mod m`:
//!
//! - `level_t = α (y_t - S_s) + (1 - α) level_{t-1}`
//! - `S_s     = γ (y_t - level_t) + (1 - γ) S_s`
//!
//! Forecast `h` steps past the last observation: `level + S_{(n + h - 1) mod m}`.

use super::search::{minimize_2d, GridSpec};
use super::{ensure_finite, ModelError, ModelResult, SeasonalModel, MIN_FIT_OBSERVATIONS};
use serde::{Deserialize, Serialize};

const DEFAULT_ALPHA: f64 = 0.2;
const DEFAULT_GAMMA: f64 = 0.1;

const SMOOTHING_GRID: GridSpec = GridSpec {
    lower: 0.05,
    upper: 0.95,
    coarse_step: 0.05,
    fine_step: 0.01,
};

/// Fitted additive seasonal exponential smoothing state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoltWintersFit {
    alpha: f64,
    gamma: f64,
    period: usize,
    level: f64,
    /// Indexed by absolute observation index modulo `period`
    seasonals: Vec<f64>,
    nobs: usize,
    sse: f64,
}

impl HoltWintersFit {
    /// Estimate parameters and state from a full series.
    ///
    /// The first cycle (or the whole series when shorter) initialises the
    /// level as its mean and each seen season slot as the deviation from it.
    /// `alpha` and `gamma` minimise the one-step-ahead squared error over the
    /// remaining observations.
    pub fn fit(values: &[f64], period: usize) -> ModelResult<Self> {
        if period == 0 {
            return Err(ModelError::InvalidData("seasonal period must be positive".into()));
        }
        if values.len() < MIN_FIT_OBSERVATIONS {
            return Err(ModelError::InsufficientData {
                required: MIN_FIT_OBSERVATIONS,
                actual: values.len(),
            });
        }
        ensure_finite(values)?;

        let init_len = values.len().min(period);
        let level0 = values[..init_len].iter().sum::<f64>() / init_len as f64;
        let mut seasonals0 = vec![0.0; period];
        for (slot, y) in seasonals0.iter_mut().zip(&values[..init_len]) {
            *slot = y - level0;
        }

        let rest = &values[init_len..];
        let (alpha, gamma) = if rest.is_empty() {
            (DEFAULT_ALPHA, DEFAULT_GAMMA)
        } else {
            let best = minimize_2d(SMOOTHING_GRID, |a, g| {
                let mut level = level0;
                let mut seasonals = seasonals0.clone();
                smooth(&mut level, &mut seasonals, init_len, rest, a, g)
            });
            (best.x, best.y)
        };

        let mut level = level0;
        let mut seasonals = seasonals0;
        let sse = smooth(&mut level, &mut seasonals, init_len, rest, alpha, gamma);

        Ok(Self {
            alpha,
            gamma,
            period,
            level,
            seasonals,
            nobs: values.len(),
            sse,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    /// In-sample one-step-ahead sum of squared errors
    pub fn sse(&self) -> f64 {
        self.sse
    }

    fn check_state(&self) -> ModelResult<()> {
        if self.period == 0 || self.seasonals.len() != self.period {
            return Err(ModelError::IncompatibleState(format!(
                "{} seasonal slots for period {}",
                self.seasonals.len(),
                self.period
            )));
        }
        if !self.level.is_finite() || self.seasonals.iter().any(|s| !s.is_finite()) {
            return Err(ModelError::IncompatibleState("non-finite smoothing state".into()));
        }
        Ok(())
    }
}

impl SeasonalModel for HoltWintersFit {
    fn nobs(&self) -> usize {
        self.nobs
    }

    fn append(&mut self, observations: &[f64]) -> ModelResult<()> {
        self.check_state()?;
        ensure_finite(observations)?;

        let sse = smooth(
            &mut self.level,
            &mut self.seasonals,
            self.nobs,
            observations,
            self.alpha,
            self.gamma,
        );
        self.sse += sse;
        self.nobs += observations.len();
        Ok(())
    }

    fn forecast_window(&self, skip: u64, len: usize) -> ModelResult<Vec<f64>> {
        self.check_state()?;

        let period = self.period as u64;
        let first = (self.nobs as u64 % period + skip % period) % period;
        Ok((0..len as u64)
            .map(|i| self.level + self.seasonals[((first + i) % period) as usize])
            .collect())
    }
}

/// Run the smoothing recursions over `observations`, the first of which has
/// absolute index `start`. Returns the one-step-ahead SSE.
fn smooth(
    level: &mut f64,
    seasonals: &mut [f64],
    start: usize,
    observations: &[f64],
    alpha: f64,
    gamma: f64,
) -> f64 {
    let period = seasonals.len();
    let mut sse = 0.0;

    for (offset, &y) in observations.iter().enumerate() {
        let slot = (start + offset) % period;
        let seasonal = seasonals[slot];

        let error = y - (*level + seasonal);
        sse += error * error;

        *level = alpha * (y - seasonal) + (1.0 - alpha) * *level;
        seasonals[slot] = gamma * (y - *level) + (1.0 - gamma) * seasonal;
    }

    sse
}
