use rustvocalsynth::synth::filter::BiquadCoeffs;
use rustvocalsynth::synth::noise::NoiseSource;

const SAMPLE_RATE: f32 = 44_100.0;
const GATE: u32 = 441;

fn source(seed: u64) -> NoiseSource {
    NoiseSource::new(SAMPLE_RATE, 4096, seed, GATE, 220)
}

#[test]
fn gate_opens_over_the_ramp() {
    let mut noise = source(3);
    noise.set_level(1.0);
    noise.note_on(1.0);
    let mut last = 0.0;
    for _ in 0..GATE - 1 {
        noise.next_sample();
        assert!(noise.gate() > last && noise.gate() < 1.0);
        last = noise.gate();
    }
    noise.next_sample();
    assert_eq!(noise.gate(), 1.0);

    noise.note_off();
    for _ in 0..GATE + 1 {
        noise.next_sample();
    }
    assert_eq!(noise.gate(), 0.0);
    assert_eq!(noise.next_sample(), 0.0);
}

#[test]
fn level_scales_the_output() {
    let peak = |level: f32| {
        let mut noise = source(8);
        noise.set_level(level);
        noise.note_on(1.0);
        (0..8192)
            .map(|_| noise.next_sample().abs())
            .fold(0.0, f32::max)
    };
    let full = peak(1.0);
    assert!(full > 0.0);
    assert!((peak(0.5) - 0.5 * full).abs() < 1e-5);
    assert_eq!(peak(0.0), 0.0);
}

#[test]
fn level_and_q_are_clamped() {
    let mut noise = source(1);
    noise.set_level(4.0);
    assert_eq!(noise.level(), 1.0);
    noise.set_level(f32::NAN);
    assert_eq!(noise.level(), 0.0);

    let before = noise.coefficients();
    noise.set_q(1_000.0);
    let clamped = noise.coefficients();
    assert_ne!(before, clamped);
    noise.set_q(50.0);
    assert_eq!(noise.coefficients(), clamped);
}

#[test]
fn retuning_keeps_the_output_finite() {
    let mut noise = source(4);
    noise.set_level(1.0);
    noise.note_on(1.0);
    for n in 0..4096 {
        if n % 512 == 0 {
            noise.set_color(500.0 + n as f32);
        }
        assert!(noise.next_sample().is_finite());
    }
}

#[test]
fn table_depends_only_on_the_seed() {
    assert_eq!(source(9).table(), source(9).table());
    assert_ne!(source(9).table(), source(10).table());
}

#[test]
fn rate_change_rebuilds_from_the_last_tuning() {
    let mut noise = source(2);
    noise.retune(2500.0, 4.0, BiquadCoeffs::bandpass(2500.0, 4.0, SAMPLE_RATE));
    noise.set_sample_rate(48_000.0);
    assert_eq!(noise.coefficients(), BiquadCoeffs::bandpass(2500.0, 4.0, 48_000.0));

    noise.set_q(8.0);
    assert_eq!(noise.coefficients(), BiquadCoeffs::bandpass(2500.0, 8.0, 48_000.0));
}
