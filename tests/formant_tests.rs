use rustfft::{num_complex::Complex, FftPlanner};
use rustvocalsynth::synth::filter::{Biquad, Filter};
use rustvocalsynth::synth::formant::{FormantBank, FormantCoefficients};

const SAMPLE_RATE: f32 = 44_100.0;

fn test_signal(n: usize) -> f32 {
    let t = n as f32 / SAMPLE_RATE;
    (2.0 * std::f32::consts::PI * 700.0 * t).sin() * 0.5 + ((n * 7919) % 97) as f32 / 97.0 - 0.5
}

#[test]
fn dry_mix_passes_input_untouched() {
    let mut bank = FormantBank::new(SAMPLE_RATE, 64);
    bank.set_mix(0.0);
    for n in 0..2048 {
        let x = test_signal(n);
        assert_eq!(bank.process(x), x);
    }
}

#[test]
fn wet_mix_is_the_weighted_sum_of_stages() {
    let gains = [0.25, 0.5, 0.75, 1.0];
    let mut bank = FormantBank::new(SAMPLE_RATE, 64);
    bank.set_mix(1.0);
    bank.set_gains(gains);

    let coeffs = bank.coefficients();
    let mut reference: Vec<Biquad> = coeffs.stages.iter().map(|c| Biquad::new(*c)).collect();
    for n in 0..2048 {
        let x = test_signal(n);
        let expected: f32 = reference
            .iter_mut()
            .zip(gains)
            .map(|(stage, gain)| stage.process(x) * gain)
            .sum();
        let actual = bank.process(x);
        assert!((actual - expected).abs() < 1e-5, "sample {n}: {actual} vs {expected}");
    }
}

#[test]
fn retuned_bank_settles_on_new_coefficients() {
    let mut bank = FormantBank::new(SAMPLE_RATE, 32);
    let frequencies = [650.0, 1100.0, 2200.0, 3500.0];
    let bandwidths = [0.3; 4];
    bank.set_formants(frequencies);
    bank.set_bandwidths(bandwidths);
    assert_eq!(
        bank.coefficients(),
        FormantCoefficients::compute(&frequencies, &bandwidths, SAMPLE_RATE)
    );
    for n in 0..256 {
        assert!(bank.process(test_signal(n)).is_finite());
    }
}

#[test]
fn gains_and_mix_are_clamped() {
    let mut bank = FormantBank::new(SAMPLE_RATE, 32);
    bank.set_gains([2.0, -1.0, f32::NAN, 0.5]);
    assert_eq!(bank.gains(), [1.0, 0.0, 0.0, 0.5]);
    bank.set_mix(3.0);
    assert_eq!(bank.mix(), 1.0);
    bank.set_mix(f32::NAN);
    assert_eq!(bank.mix(), 1.0);
}

#[test]
fn impulse_response_peaks_at_the_formants() {
    const FFT_SIZE: usize = 8192;
    let mut bank = FormantBank::new(SAMPLE_RATE, 1);
    bank.set_mix(1.0);

    let mut buffer: Vec<Complex<f32>> = (0..FFT_SIZE)
        .map(|n| Complex::new(bank.process(if n == 0 { 1.0 } else { 0.0 }), 0.0))
        .collect();
    FftPlanner::<f32>::new()
        .plan_fft_forward(FFT_SIZE)
        .process(&mut buffer);

    let magnitude = |freq: f32| {
        let bin = (freq * FFT_SIZE as f32 / SAMPLE_RATE).round() as usize;
        buffer[bin].norm()
    };
    // Default formants sit at 800, 1200, 2500 and 3500 Hz.
    for formant in [800.0, 1200.0, 2500.0, 3500.0] {
        assert!(magnitude(formant) > 2.0 * magnitude(8000.0), "{formant} Hz");
        assert!(magnitude(formant) > 2.0 * magnitude(100.0), "{formant} Hz");
    }
}

#[test]
fn rate_change_rebuilds_from_the_last_tuning() {
    let frequencies = [650.0, 1100.0, 2200.0, 3500.0];
    let bandwidths = [0.3; 4];
    let mut bank = FormantBank::new(SAMPLE_RATE, 32);
    bank.retune(
        frequencies,
        bandwidths,
        &FormantCoefficients::compute(&frequencies, &bandwidths, SAMPLE_RATE),
    );

    bank.set_sample_rate(48_000.0);
    assert_eq!(
        bank.coefficients(),
        FormantCoefficients::compute(&frequencies, &bandwidths, 48_000.0)
    );

    // Later single edits build for the new rate too.
    let mut moved = frequencies;
    moved[0] = 700.0;
    bank.set_formants(moved);
    assert_eq!(
        bank.coefficients(),
        FormantCoefficients::compute(&moved, &bandwidths, 48_000.0)
    );
}
