use proptest::prelude::*;
use rustvocalsynth::synth::glottal::{pulse_value, GlottalSource, DEFAULT_RETURN_FRACTION};
use rustvocalsynth::synth::SynthError;

const SAMPLE_RATE: f32 = 44_100.0;

// Runs the source until the next cycle starts and returns how many samples that took.
fn samples_until_next_cycle(source: &mut GlottalSource) -> usize {
    let cycle = source.cycles();
    let mut count = 0;
    while source.cycles() == cycle {
        source.next_sample();
        count += 1;
        assert!(count < 100_000, "cycle never ended");
    }
    count
}

#[test]
fn steady_pitch_gives_exact_cycles() {
    let mut source = GlottalSource::new(SAMPLE_RATE, 7);
    source.set_jitter(0.0);
    source.set_pitch(441.0).unwrap();
    // The cycle running at construction finishes at the old pitch.
    samples_until_next_cycle(&mut source);
    for _ in 0..20 {
        assert_eq!(samples_until_next_cycle(&mut source), 100);
    }
}

#[test]
fn fractional_periods_keep_the_long_term_rate() {
    let mut source = GlottalSource::new(SAMPLE_RATE, 7);
    source.set_jitter(0.0);
    source.set_pitch(220.0).unwrap();
    samples_until_next_cycle(&mut source);
    let total: usize = (0..220).map(|_| samples_until_next_cycle(&mut source)).sum();
    // 220 cycles of 200.45 samples.
    assert!((total as i64 - 44_100).abs() <= 1, "{total}");
}

#[test]
fn jitter_varies_each_cycle_within_bounds() {
    let mut source = GlottalSource::new(SAMPLE_RATE, 11);
    source.set_jitter(0.2);
    source.set_pitch(441.0).unwrap();
    samples_until_next_cycle(&mut source);
    let mut lengths = Vec::new();
    for _ in 0..50 {
        let len = source.cycle_len();
        assert!((80.0..=120.0).contains(&len), "{len}");
        lengths.push(len);
        samples_until_next_cycle(&mut source);
    }
    assert!(lengths.windows(2).any(|w| w[0] != w[1]));
}

#[test]
fn pulse_shape() {
    let period = 100.0;
    let rd = DEFAULT_RETURN_FRACTION;
    let te = period * (1.0 - rd);
    // Closing phase decays to exp(-3) just before te.
    let closing_end = pulse_value(te - 1e-3, period, rd);
    assert!((closing_end - (-3.0f32).exp()).abs() < 1e-3);
    let mut last = 1.0;
    for t in 1..20 {
        let v = pulse_value(t as f32, period, rd);
        assert!(v < last);
        last = v;
    }
    // Return phase is a parabola from 1 down to 0.
    let mid = te + 0.5 * (period - te);
    assert!((pulse_value(mid, period, rd) - 0.75).abs() < 1e-5);
    for t in 0..100 {
        let v = pulse_value(t as f32, period, rd);
        assert!((0.0..=1.0).contains(&v));
    }
}

#[test]
fn shimmer_is_drawn_once_per_note() {
    let mut source = GlottalSource::new(SAMPLE_RATE, 5);
    source.set_shimmer(0.0);
    assert_eq!(source.note_on(0.5, None).amplitude(), 0.5);

    source.set_shimmer(0.1);
    let amplitudes: Vec<f32> = (0..20).map(|_| source.note_on(0.5, None).amplitude()).collect();
    for a in &amplitudes {
        assert!((0.45..=0.55).contains(a), "{a}");
    }
    assert!(amplitudes.windows(2).any(|w| w[0] != w[1]));
}

#[test]
fn non_positive_pitch_is_refused() {
    let mut source = GlottalSource::new(SAMPLE_RATE, 1);
    source.set_pitch(300.0).unwrap();
    assert_eq!(
        source.set_pitch(-5.0),
        Err(SynthError::InvalidPitch { requested: -5.0 })
    );
    assert!(source.set_pitch(0.0).is_err());
    assert!(source.set_pitch(f32::NAN).is_err());
    assert_eq!(source.frequency(), 300.0);
}

#[test]
fn same_seed_same_samples() {
    let render = |seed| {
        let mut source = GlottalSource::new(SAMPLE_RATE, seed);
        source.set_jitter(0.1);
        (0..4096).map(|_| source.next_sample()).collect::<Vec<f32>>()
    };
    assert_eq!(render(42), render(42));
    assert_ne!(render(42), render(43));
}

proptest! {
    #[test]
    fn cycles_stay_within_the_jitter_bound(
        pitch in 50.0f32..2000.0,
        jitter in 0.0f32..=1.0,
        seed in any::<u64>(),
    ) {
        let mut source = GlottalSource::new(SAMPLE_RATE, seed);
        source.set_jitter(jitter);
        source.set_pitch(pitch).unwrap();
        samples_until_next_cycle(&mut source);
        let nominal = SAMPLE_RATE / pitch;
        for _ in 0..10 {
            let len = source.cycle_len();
            prop_assert!(len >= (nominal * (1.0 - jitter)).max(1.0) - 1e-3);
            prop_assert!(len <= nominal * (1.0 + jitter) + 1e-3);
            for _ in 0..len.ceil() as usize {
                let v = source.next_sample();
                prop_assert!((0.0..=1.0).contains(&v));
            }
        }
    }
}
