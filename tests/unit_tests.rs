// tests/unit_tests.rs
use spei_calc::calendar::YearMonth;
use spei_calc::io::{GeoInfo, RasterStack};
use spei_calc::processing::fit::{fit, Family, FitError};
use spei_calc::processing::{
    accumulate, compute_indices, GapPolicy, IndexParams, SkipReason, SpeiProcessor,
};
use spei_calc::Timescale;

/// Helper producing a water-balance-like series with positive and negative months
fn water_balance(n: usize, phase: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            let season = (t * std::f64::consts::TAU / 12.0 + phase).sin();
            60.0 * season + 9.0 * ((i * 7) % 5) as f64 - 25.0
        })
        .collect()
}

fn geo(width: usize, height: usize) -> GeoInfo {
    GeoInfo {
        projection: String::new(),
        geo_transform: [74.0, 0.05, 0.0, 26.9, 0.0, -0.05],
        width,
        height,
    }
}

/// Builds a time-major stack from one series per pixel
fn stack_from_pixels(pixels: &[Vec<f64>], width: usize, height: usize) -> RasterStack {
    let months = pixels[0].len();
    let mut data = Vec::with_capacity(months * pixels.len());
    for t in 0..months {
        for series in pixels {
            data.push(series[t] as f32);
        }
    }
    RasterStack::from_parts(data, months, geo(width, height)).unwrap()
}

#[test]
fn test_accumulation_alignment() {
    let series: Vec<f64> = (0..24).map(|i| ((i * i) % 17) as f64 - 8.0).collect();

    for window in [1usize, 3, 12] {
        let acc = accumulate(&series, window);
        assert_eq!(acc.len(), 24 - window + 1, "length for window {window}");
        for (k, &value) in acc.iter().enumerate() {
            let expected: f64 = series[k..=k + window - 1].iter().sum();
            assert!(
                (value - expected).abs() < 1e-9,
                "window {window}, index {k}: expected {expected}, got {value}"
            );
        }
    }
}

#[test]
fn test_accumulation_identity() {
    let series = water_balance(24, 0.3);
    assert_eq!(accumulate(&series, 1), series);
}

#[test]
fn test_thirteen_missing_months_skip_every_scale() {
    let mut series = water_balance(60, 0.0);
    for value in series.iter_mut().skip(40).take(13) {
        *value = f64::NAN;
    }
    let params = IndexParams {
        gap_policy: GapPolicy::MaskWindows,
        ..IndexParams::default()
    };
    let result = compute_indices(&series, &params);

    for (outcome, values) in result.outcomes.iter().zip(&result.values) {
        assert_eq!(
            outcome,
            &Err(SkipReason::InsufficientData { missing: 13, limit: 12 })
        );
        assert!(values.iter().all(|v| v.is_nan()));
    }
}

#[test]
fn test_twelve_missing_months_pass_the_gate() {
    let mut series = water_balance(60, 0.0);
    for value in series.iter_mut().skip(48) {
        *value = f64::NAN;
    }

    // Default policy: passes the gate, then every scale sees incomplete windows.
    let result = compute_indices(&series, &IndexParams::default());
    assert!(result.outcomes.iter().all(|o| o == &Err(SkipReason::WindowGap)));

    // Masking incomplete windows fits every scale on the 48 valid months.
    let params = IndexParams {
        gap_policy: GapPolicy::MaskWindows,
        ..IndexParams::default()
    };
    let result = compute_indices(&series, &params);
    assert!(result.outcomes.iter().all(Result::is_ok), "{:?}", result.outcomes);
    let spei1 = result.get(Timescale::One, &params).unwrap();
    assert!(spei1[..48].iter().all(|v| v.is_finite()));
    assert!(spei1[48..].iter().all(|v| v.is_nan()));
}

#[test]
fn test_window_with_missing_month_is_missing() {
    let mut series = water_balance(36, 1.0);
    series[10] = f64::NAN;

    let acc3 = accumulate(&series, 3);
    let missing: Vec<usize> = (0..acc3.len()).filter(|&k| acc3[k].is_nan()).collect();
    assert_eq!(missing, vec![8, 9, 10]);

    let params = IndexParams {
        scales: vec![Timescale::Three],
        gap_policy: GapPolicy::MaskWindows,
        ..IndexParams::default()
    };
    let result = compute_indices(&series, &params);
    assert!(result.outcomes[0].is_ok());
    let spei3 = result.get(Timescale::Three, &params).unwrap();
    for (t, value) in spei3.iter().enumerate() {
        if t < 2 || (10..=12).contains(&t) {
            assert!(value.is_nan(), "month {t} should be missing");
        } else {
            assert!(value.is_finite(), "month {t} should be finite");
        }
    }

    // Without masking the whole scale is left missing.
    let params = IndexParams {
        scales: vec![Timescale::Three],
        ..IndexParams::default()
    };
    let result = compute_indices(&series, &params);
    assert_eq!(result.outcomes[0], Err(SkipReason::WindowGap));
    assert!(result.values[0].iter().all(|v| v.is_nan()));
}

#[test]
fn test_constant_pixel_fails_in_isolation() {
    let varying = water_balance(36, 0.5);
    let constant = vec![-12.5; 36];
    let stack = stack_from_pixels(&[varying, constant], 2, 1);

    let params = IndexParams {
        scales: vec![Timescale::One],
        ..IndexParams::default()
    };
    let cube = SpeiProcessor::new(Some(2)).compute(&stack, &params).unwrap();

    assert!(cube.series(Timescale::One, 0, 0).unwrap().iter().all(|v| v.is_finite()));
    assert!(cube.series(Timescale::One, 0, 1).unwrap().iter().all(|v| v.is_nan()));
    assert_eq!(cube.tally().scales[0].fitted, 1);
    assert_eq!(cube.tally().scales[0].fit_failure, 1);

    assert!(matches!(
        fit(Family::GenLogistic, &vec![-12.5; 36]),
        Err(FitError::Degenerate { .. })
    ));
}

#[test]
fn test_output_selection_for_two_years() {
    let start = YearMonth::new(2004, 1);
    assert!(start.is_some());

    let spei3 = Timescale::Three.selected_indices(24, start);
    let months: Vec<usize> = spei3.iter().map(|t| t + 1).collect();
    assert_eq!(months, vec![3, 6, 9, 12, 15, 18, 21, 24]);
    let accumulated: Vec<usize> = spei3.iter().map(|t| t - 2).collect();
    assert_eq!(accumulated, vec![0, 3, 6, 9, 12, 15, 18, 21]);

    let spei12 = Timescale::Twelve.selected_indices(24, start);
    assert_eq!(spei12.iter().map(|t| t + 1).collect::<Vec<_>>(), vec![12, 24]);
    assert_eq!(spei12.iter().map(|t| t - 11).collect::<Vec<_>>(), vec![0, 12]);

    assert_eq!(Timescale::One.selected_indices(24, start).len(), 24);
}

#[test]
fn test_monotonic_transform() {
    let series: Vec<f64> = (0..30)
        .map(|i| -40.0 + 3.0 * i as f64 + 0.05 * (i * i) as f64)
        .collect();

    for family in [Family::GenLogistic, Family::LogLogistic] {
        let params = IndexParams {
            scales: vec![Timescale::One],
            family,
            ..IndexParams::default()
        };
        let result = compute_indices(&series, &params);
        assert!(result.outcomes[0].is_ok(), "{family:?}: {:?}", result.outcomes[0]);
        let spei = &result.values[0];
        assert!(
            spei.windows(2).all(|w| w[1] > w[0]),
            "{family:?} output not strictly increasing: {spei:?}"
        );
    }
}

#[test]
fn test_standardized_values_are_centred() {
    let series = water_balance(240, 0.0);
    let params = IndexParams {
        scales: vec![Timescale::One],
        ..IndexParams::default()
    };
    let result = compute_indices(&series, &params);
    let spei = &result.values[0];
    let mean = spei.iter().map(|&v| v as f64).sum::<f64>() / spei.len() as f64;
    let var = spei.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / spei.len() as f64;
    assert!(mean.abs() < 0.2, "mean {mean}");
    assert!((var - 1.0).abs() < 0.3, "variance {var}");
}

#[test]
fn test_end_to_end_in_memory() {
    // 14 months, 2x2: pixel 0 fully missing, the rest fully valid.
    let missing = vec![f64::NAN; 14];
    let valid: Vec<Vec<f64>> = (0..3).map(|p| water_balance(14, p as f64)).collect();
    let pixels = vec![missing, valid[0].clone(), valid[1].clone(), valid[2].clone()];
    let stack = stack_from_pixels(&pixels, 2, 2);

    let params = IndexParams {
        scales: vec![Timescale::One],
        ..IndexParams::default()
    };
    let cube = SpeiProcessor::new(None).compute(&stack, &params).unwrap();

    assert!(cube.series(Timescale::One, 0, 0).unwrap().iter().all(|v| v.is_nan()));
    for (row, col) in [(0, 1), (1, 0), (1, 1)] {
        let series = cube.series(Timescale::One, row, col).unwrap();
        assert_eq!(series.len(), 14);
        assert!(series.iter().all(|v| v.is_finite()), "pixel ({row}, {col}): {series:?}");
    }
    assert_eq!(cube.tally().insufficient_data, 1);
    assert_eq!(cube.tally().scales[0].fitted, 3);
}
