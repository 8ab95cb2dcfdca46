//! Two-parameter grid search used to estimate smoothing / MA coefficients

/// Search box and grid spacing for one estimation
#[derive(Debug, Clone, Copy)]
pub(crate) struct GridSpec {
    pub lower: f64,
    pub upper: f64,
    pub coarse_step: f64,
    pub fine_step: f64,
}

/// Best point found and its objective value
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GridOptimum {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

/// Minimise `objective` over `[lower, upper]²`: a coarse pass, then a fine pass
/// within one coarse step of the coarse optimum. Non-finite objective values
/// never win.
pub(crate) fn minimize_2d(spec: GridSpec, objective: impl Fn(f64, f64) -> f64) -> GridOptimum {
    let coarse = axis(spec.lower, spec.upper, spec.coarse_step);
    let mut best = scan(&coarse, &coarse, &objective, None);

    let fine_x = axis(
        (best.x - spec.coarse_step).max(spec.lower),
        (best.x + spec.coarse_step).min(spec.upper),
        spec.fine_step,
    );
    let fine_y = axis(
        (best.y - spec.coarse_step).max(spec.lower),
        (best.y + spec.coarse_step).min(spec.upper),
        spec.fine_step,
    );
    best = scan(&fine_x, &fine_y, &objective, Some(best));

    best
}

fn scan(
    xs: &[f64],
    ys: &[f64],
    objective: &impl Fn(f64, f64) -> f64,
    start: Option<GridOptimum>,
) -> GridOptimum {
    let mut best = start.unwrap_or(GridOptimum {
        x: xs.first().copied().unwrap_or_default(),
        y: ys.first().copied().unwrap_or_default(),
        value: f64::INFINITY,
    });

    for &x in xs {
        for &y in ys {
            let value = objective(x, y);
            if value.is_finite() && value < best.value {
                best = GridOptimum { x, y, value };
            }
        }
    }

    best
}

/// Evenly spaced points from `lower` to `upper` inclusive
fn axis(lower: f64, upper: f64, step: f64) -> Vec<f64> {
    if step.is_nan() || step <= 0.0 || upper < lower {
        return vec![lower];
    }
    // Integer stepping avoids accumulated float drift.
    let count = ((upper - lower) / step + 1e-9).floor() as usize;
    (0..=count).map(|i| lower + step * i as f64).collect()
}
