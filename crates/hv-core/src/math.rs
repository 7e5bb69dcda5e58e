//! Numeric helpers shared by the key finder and the tracker

/// Log of zero probability
pub const LOG_ZERO: f64 = f64::NEG_INFINITY;

/// Natural log of a probability, mapping non-positive values to `LOG_ZERO`
#[inline]
pub fn ln_prob(p: f64) -> f64 {
    if p > 0.0 { p.ln() } else { LOG_ZERO }
}

/// Index of the first maximum, ignoring NaN entries
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Pearson correlation coefficient; zero when either side is flat
pub fn pearson_correlation(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mean_a = a[..n].iter().sum::<f32>() / n as f32;
    let mean_b = b[..n].iter().sum::<f32>() / n as f32;

    let mut cov = 0.0f32;
    let mut var_a = 0.0f32;
    let mut var_b = 0.0f32;

    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a > 0.0 && var_b > 0.0 {
        cov / (var_a.sqrt() * var_b.sqrt())
    } else {
        0.0
    }
}

/// Split `value` into a whole number of `period`s (floored) and the remainder
/// in `[0, period)`
#[inline]
pub fn floor_wrap(value: f32, period: f32) -> (f32, f32) {
    let cycles = (value / period).floor();
    let mut rem = value - cycles * period;
    // Rounding can push the remainder onto the period itself
    if rem >= period {
        rem -= period;
        return (cycles + 1.0, rem.max(0.0));
    }
    (cycles, rem.max(0.0))
}

/// Share of the total probability held by the best entry of a
/// max-normalised log table (best entry == 0.0)
pub fn best_share(normalised_log: &[f64]) -> f64 {
    let total: f64 = normalised_log
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| v.exp())
        .sum();
    if total > 0.0 { 1.0 / total } else { 0.0 }
}
