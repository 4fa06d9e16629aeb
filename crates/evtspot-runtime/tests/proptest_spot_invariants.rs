//! Property-based invariant tests for the tail primitives and detectors.
//!
//! These tests verify structural invariants that must hold for any valid inputs:
//!
//! Primitives (1–5):
//! 1. Ring buffer length saturates at capacity; the first erased value is
//!    the first pushed one.
//! 2. Peaks statistics match a naive scan of the retained window.
//! 3. Tail fit either fails (NaN) or yields a finite shape and positive scale.
//! 4. P² estimate lies within the observed range once defined.
//! 5. Brent returns a root inside the bracket whenever the signs differ.
//!
//! Detectors (6–13):
//! 6. `Nt <= n` after every step.
//! 7. With discard enabled, `Anomaly` never changes `n`, `Nt` or the tail.
//! 8. NaN observations are rejected without touching the state.
//! 9. `probability(quantile(q)) ≈ q` within 1%.
//! 10. Anomaly threshold stays beyond the excess threshold.
//! 11. Determinism: same calibration + stream → same status.
//! 12. Two-sided bounds are ordered.
//! 13. DSPOT drift ignores anomalies.

use evtspot_core::{P2Quantile, Peaks, RingBuffer, Tail, find_root};
use evtspot_runtime::{DSpot, DSpotConfig, Event, Spot, SpotConfig, SpotError, TwoSidedSpot};
use proptest::prelude::*;

// ── Strategies ────────────────────────────────────────────────────────────

fn spot_config_strategy() -> impl Strategy<Value = SpotConfig> {
    (
        0.9f64..=0.99,  // level
        1e-6f64..=1e-3, // q
        any::<bool>(),  // low
        20usize..=300,  // max_excess
    )
        .prop_map(|(level, q, low, max_excess)| {
            SpotConfig::default()
                .with_level(level)
                .with_q(q)
                .with_low(low)
                .with_max_excess(max_excess)
        })
}

fn calibration_values() -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(-100.0f64..=100.0, 500..=1500)
}

fn observation_values(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(-300.0f64..=300.0, 1..=max_len)
}

fn fitted_spot(config: SpotConfig, data: &[f64]) -> Option<Spot> {
    let mut spot = Spot::new(config).ok()?;
    spot.fit(data).ok()?;
    Some(spot)
}

// ═════════════════════════════════════════════════════════════════════════
// PRIMITIVE INVARIANTS
// ═════════════════════════════════════════════════════════════════════════

// ─── 1. Ring buffer saturation ────────────────────────────────────────

proptest! {
    #[test]
    fn ring_length_saturates(
        capacity in 1usize..=64,
        values in proptest::collection::vec(-1e6f64..=1e6, 1..=200),
    ) {
        let mut ring = RingBuffer::new(capacity).unwrap();
        for (i, &x) in values.iter().enumerate() {
            let erased = ring.push(x);
            prop_assert_eq!(ring.len(), (i + 1).min(capacity));
            if i < capacity {
                prop_assert_eq!(erased, None);
            } else {
                prop_assert_eq!(erased, Some(values[i - capacity]));
            }
        }
    }
}

// ─── 2. Peaks statistics match naive scan ─────────────────────────────

proptest! {
    #[test]
    fn peaks_match_naive_window(
        capacity in 1usize..=32,
        values in proptest::collection::vec(0.0f64..=50.0, 1..=150),
    ) {
        let mut peaks = Peaks::new(capacity).unwrap();
        for (i, &x) in values.iter().enumerate() {
            peaks.push(x);
            let window = &values[(i + 1).saturating_sub(capacity)..=i];
            let min = window.iter().copied().fold(f64::INFINITY, f64::min);
            let max = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = window.iter().sum::<f64>() / window.len() as f64;
            prop_assert_eq!(peaks.min(), min);
            prop_assert_eq!(peaks.max(), max);
            prop_assert!((peaks.mean() - mean).abs() < 1e-9, "mean {} vs {}", peaks.mean(), mean);
        }
    }
}

// ─── 3. Tail fit is valid or NaN ──────────────────────────────────────

proptest! {
    #[test]
    fn tail_fit_valid_or_nan(
        values in proptest::collection::vec(1e-6f64..=20.0, 1..=100),
    ) {
        let mut tail = Tail::new(128).unwrap();
        for &x in &values {
            tail.push(x);
        }
        let llhood = tail.fit();
        if llhood.is_nan() {
            prop_assert!(!tail.is_fitted());
        } else {
            prop_assert!(tail.gamma().is_finite());
            prop_assert!(tail.sigma().is_finite() && tail.sigma() > 0.0);
        }
    }
}

// ─── 4. P² stays within observed range ────────────────────────────────

proptest! {
    #[test]
    fn p2_within_range(
        p in 0.01f64..=0.99,
        values in proptest::collection::vec(-1e3f64..=1e3, 5..=400),
    ) {
        let mut estimator = P2Quantile::new(p);
        for &x in &values {
            estimator.push(x);
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let estimate = estimator.quantile();
        prop_assert!(estimate >= min && estimate <= max, "{} not in [{}, {}]", estimate, min, max);
    }
}

// ─── 5. Brent root inside bracket ─────────────────────────────────────

proptest! {
    #[test]
    fn brent_root_in_bracket(
        root in -10.0f64..=10.0,
        left in 0.1f64..=5.0,
        right in 0.1f64..=5.0,
    ) {
        let (a, b) = (root - left, root + right);
        let found = find_root(a, b, |x| (x - root) * (1.0 + x * x), 1e-10);
        prop_assert!(found.is_some());
        let x = found.unwrap();
        prop_assert!(x >= a && x <= b);
        prop_assert!((x - root).abs() < 1e-6, "{} vs {}", x, root);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// DETECTOR INVARIANTS
// ═════════════════════════════════════════════════════════════════════════

// ─── 6 & 10. Counters and threshold ordering ──────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn nt_never_exceeds_n(
        config in spot_config_strategy(),
        data in calibration_values(),
        stream in observation_values(300),
    ) {
        let Some(mut spot) = fitted_spot(config, &data) else {
            return Ok(());
        };
        let up_down = config.up_down();
        for &x in &stream {
            spot.step(x).unwrap();
            prop_assert!(spot.nt() <= spot.n(), "nt={} n={}", spot.nt(), spot.n());
            let gap = up_down * (spot.anomaly_threshold() - spot.excess_threshold());
            prop_assert!(gap > 0.0, "anomaly threshold not beyond excess threshold");
        }
    }
}

// ─── 7. Anomalies are discarded ───────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn anomalies_leave_model_untouched(
        config in spot_config_strategy(),
        data in calibration_values(),
        stream in observation_values(300),
    ) {
        let Some(mut spot) = fitted_spot(config, &data) else {
            return Ok(());
        };
        for &x in &stream {
            let (n, nt, peaks) = (spot.n(), spot.nt(), spot.tail().peaks().len());
            let z = spot.anomaly_threshold();
            if spot.step(x).unwrap() == Event::Anomaly {
                prop_assert_eq!(spot.n(), n);
                prop_assert_eq!(spot.nt(), nt);
                prop_assert_eq!(spot.tail().peaks().len(), peaks);
                prop_assert_eq!(spot.anomaly_threshold(), z);
            }
        }
    }
}

// ─── 8. NaN rejection ─────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn nan_is_rejected(
        config in spot_config_strategy(),
        data in calibration_values(),
    ) {
        let Some(mut spot) = fitted_spot(config, &data) else {
            return Ok(());
        };
        let before = spot.status();
        prop_assert_eq!(spot.step(f64::NAN), Err(SpotError::DataIsNaN));
        prop_assert_eq!(spot.status(), before);
    }
}

// ─── 9. Quantile / probability inversion ──────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn quantile_probability_inverse(
        config in spot_config_strategy(),
        data in calibration_values(),
        q in 1e-5f64..=1e-3,
    ) {
        let Some(spot) = fitted_spot(config, &data) else {
            return Ok(());
        };
        let z = spot.quantile(q);
        let back = spot.probability(z);
        prop_assume!(z.is_finite() && back.is_finite());
        prop_assert!(((back - q) / q).abs() < 0.01, "q={} back={}", q, back);
    }
}

// ─── 11. Determinism ──────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn replay_is_deterministic(
        config in spot_config_strategy(),
        data in calibration_values(),
        stream in observation_values(200),
    ) {
        let (Some(mut a), Some(mut b)) = (fitted_spot(config, &data), fitted_spot(config, &data)) else {
            return Ok(());
        };
        for &x in &stream {
            prop_assert_eq!(a.step(x), b.step(x));
        }
        prop_assert_eq!(a.status(), b.status());
    }
}

// ─── 12. Two-sided bounds ordered ─────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn two_sided_bounds_ordered(
        config in spot_config_strategy(),
        data in calibration_values(),
        stream in observation_values(200),
    ) {
        let mut spot = TwoSidedSpot::new(config).unwrap();
        if spot.fit(&data).is_err() {
            return Ok(());
        }
        for &x in &stream {
            spot.step(x).unwrap();
            let bounds = spot.thresholds();
            prop_assert!(bounds.lower < bounds.upper, "{}", bounds);
            prop_assert!(spot.excess_bounds().width() < bounds.width());
        }
    }
}

// ─── 13. Drift ignores anomalies ──────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn drift_ignores_anomalies(
        depth in 1usize..=40,
        data in calibration_values(),
        stream in observation_values(200),
    ) {
        let mut dspot = DSpot::new(DSpotConfig::new(depth)).unwrap();
        if dspot.fit(&data).is_err() {
            return Ok(());
        }
        for &x in &stream {
            let drift = dspot.drift();
            if dspot.step(x).unwrap() == Event::Anomaly {
                prop_assert_eq!(dspot.drift(), drift);
            }
            prop_assert!(dspot.drift().is_finite());
        }
    }
}
