use rustvocalsynth::synth::filter::{bandwidth_to_q, Biquad, BiquadCoeffs, Filter};
use std::f32::consts::PI;

const SAMPLE_RATE: f32 = 44_100.0;

// Steady-state peak of the filter's response to a unit sine at `freq`.
fn response(coeffs: BiquadCoeffs, freq: f32) -> f32 {
    let mut filter = Biquad::new(coeffs);
    let settle = SAMPLE_RATE as usize / 4;
    let mut peak = 0.0f32;
    for n in 0..settle * 2 {
        let x = (2.0 * PI * freq * n as f32 / SAMPLE_RATE).sin();
        let y = filter.process(x);
        if n >= settle {
            peak = peak.max(y.abs());
        }
    }
    peak
}

#[test]
fn one_octave_is_q_two() {
    assert!((bandwidth_to_q(1.0) - 2.0).abs() < 1e-4);
    assert!((bandwidth_to_q(2.0) - 0.942_809).abs() < 1e-4);
    // Narrower bands mean higher Q.
    assert!(bandwidth_to_q(0.2) > bandwidth_to_q(0.5));
}

#[test]
fn zero_bandwidth_is_floored() {
    let q = bandwidth_to_q(0.0);
    assert!(q.is_finite() && q > 0.0);
    assert_eq!(q, bandwidth_to_q(0.01));
    assert_eq!(bandwidth_to_q(-3.0), q);
}

#[test]
fn bandpass_has_unity_gain_at_center() {
    for (center, q) in [(650.0, 10.0), (1000.0, 2.0), (3500.0, 4.0)] {
        let gain = response(BiquadCoeffs::bandpass(center, q, SAMPLE_RATE), center);
        assert!((gain - 1.0).abs() < 0.02, "{center} Hz: {gain}");
    }
}

#[test]
fn bandpass_rejects_far_frequencies() {
    let coeffs = BiquadCoeffs::bandpass_octaves(1000.0, 1.0, SAMPLE_RATE);
    assert!(response(coeffs, 4000.0) < 0.3);
    assert!(response(coeffs, 250.0) < 0.3);
    assert!(response(coeffs, 1000.0) > response(coeffs, 1500.0));
}

#[test]
fn center_above_nyquist_stays_stable() {
    let coeffs = BiquadCoeffs::bandpass(30_000.0, 2.0, SAMPLE_RATE);
    let mut filter = Biquad::new(coeffs);
    let mut tail = 0.0f32;
    for n in 0..4096 {
        let y = filter.process(if n == 0 { 1.0 } else { 0.0 });
        assert!(y.is_finite());
        if n >= 4000 {
            tail = tail.max(y.abs());
        }
    }
    assert!(tail < 1e-3);
}
