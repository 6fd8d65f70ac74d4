// src/processing/accumulate.rs

/// Rolling window sum over a monthly series.
///
/// `out[k]` is the sum of `series[k..k + window]`, i.e. it belongs to the
/// month ending the window (`k + window - 1`). Any window touching a missing
/// (NaN) month is NaN. A window of 1 returns the series unchanged. A series
/// shorter than the window yields an empty result.
pub fn accumulate(series: &[f64], window: usize) -> Vec<f64> {
    let mut out = Vec::new();
    accumulate_into(series, window, &mut out);
    out
}

/// Same as [`accumulate`], reusing `out` as the destination buffer.
pub fn accumulate_into(series: &[f64], window: usize, out: &mut Vec<f64>) {
    out.clear();
    if window == 0 || series.len() < window {
        return;
    }
    if window == 1 {
        out.extend_from_slice(series);
        return;
    }

    // Running sum over the current run of valid months; restarts after a gap
    // so a NaN never leaks into later windows.
    let mut sum = 0.0;
    let mut valid_run = 0usize;
    for (i, &value) in series.iter().enumerate() {
        if value.is_nan() {
            sum = 0.0;
            valid_run = 0;
        } else {
            sum += value;
            valid_run += 1;
            if valid_run > window {
                sum -= series[i - window];
            }
        }

        if i + 1 >= window {
            out.push(if valid_run >= window { sum } else { f64::NAN });
        }
    }
}

/// Number of missing (NaN) months in a raw series.
pub fn count_missing(series: &[f64]) -> usize {
    series.iter().filter(|v| v.is_nan()).count()
}
