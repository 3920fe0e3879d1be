use proptest::prelude::*;
use rustvocalsynth::synth::envelope::EnvelopeGenerator;

fn adsr(attack: f32, decay: f32, sustain: f32, release: f32) -> EnvelopeGenerator {
    let mut env = EnvelopeGenerator::new();
    env.set_adsr(attack, decay, sustain, release);
    env
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn held_note_follows_attack_decay_sustain() {
    let env = adsr(0.1, 0.1, 0.5, 0.2);
    assert_eq!(env.value_at(0.0, None, None), 0.0);
    assert!(close(env.value_at(0.05, None, None), 0.5));
    assert!(close(env.value_at(0.1, None, None), 1.0));
    assert!(close(env.value_at(0.15, None, None), 0.75));
    assert!(close(env.value_at(5.0, None, None), 0.5));
    assert!(!env.is_finished(100.0, None, None));
}

#[test]
fn attack_peaks_at_one_without_a_decay() {
    let env = adsr(0.1, 0.0, 0.5, 0.2);
    assert_eq!(env.value_at(0.1, None, None), 1.0);
    assert_eq!(env.value_at(0.1001, None, None), 0.5);
    // A release taken right at the peak ramps down from 1.
    assert!(close(env.value_at(0.2, None, Some(0.1)), 0.5));
}

#[test]
fn release_ramps_from_the_current_level() {
    let env = adsr(0.1, 0.1, 0.5, 0.2);
    assert!(close(env.value_at(1.1, None, Some(1.0)), 0.25));
    assert_eq!(env.value_at(1.25, None, Some(1.0)), 0.0);
    assert!(env.is_finished(1.25, None, Some(1.0)));
    assert!(!env.is_finished(1.15, None, Some(1.0)));

    // Released halfway through the attack: the ramp starts at 0.5, not at sustain.
    assert!(close(env.value_at(0.05, None, Some(0.05)), 0.5));
    assert!(close(env.value_at(0.15, None, Some(0.05)), 0.25));
}

#[test]
fn duration_schedules_the_release() {
    let env = adsr(0.01, 0.05, 0.6, 0.2);
    // Release starts 0.2 s before the end of a 1 s note.
    assert!(close(env.release_start(Some(1.0), None).unwrap(), 0.8));
    assert!(close(env.value_at(0.9, Some(1.0), None), 0.3));
    assert!(env.is_finished(1.01, Some(1.0), None));
    // An earlier note-off wins.
    assert_eq!(env.release_start(Some(1.0), Some(0.5)), Some(0.5));
}

#[test]
fn short_note_still_reaches_the_attack_peak() {
    let env = adsr(0.1, 0.1, 0.5, 0.2);
    // 0.15 s note with a 0.2 s release: release waits for the attack.
    let start = env.release_start(Some(0.15), None).unwrap();
    assert!(close(start, 0.1));
    assert!(close(env.value_at(0.1, Some(0.15), None), 1.0));
    assert!(env.is_finished(0.31, Some(0.15), None));
    // Shorter than the attack: release at the very end.
    assert!(close(env.release_start(Some(0.05), None).unwrap(), 0.05));
}

#[test]
fn out_of_range_settings_are_clamped() {
    let env = adsr(-1.0, 50.0, 2.0, f32::NAN);
    assert_eq!(env.attack, 0.0);
    assert_eq!(env.decay, 10.0);
    assert_eq!(env.sustain, 1.0);
    assert_eq!(env.release, 0.0);
}

proptest! {
    #[test]
    fn value_stays_in_unit_range(
        attack in 0.0f32..2.0,
        decay in 0.0f32..2.0,
        sustain in 0.0f32..=1.0,
        release in 0.0f32..2.0,
        elapsed in 0.0f32..8.0,
        released_at in proptest::option::of(0.0f32..4.0),
        duration in proptest::option::of(0.0f32..4.0),
    ) {
        let env = adsr(attack, decay, sustain, release);
        let value = env.value_at(elapsed, duration, released_at);
        prop_assert!((0.0..=1.0).contains(&value), "value {}", value);
        if env.is_finished(elapsed, duration, released_at) {
            prop_assert!(value < 1e-4, "finished at {}", value);
        }
    }

    #[test]
    fn release_never_rises(
        attack in 0.001f32..1.0,
        decay in 0.001f32..1.0,
        sustain in 0.0f32..=1.0,
        release in 0.001f32..1.0,
        released_at in 0.0f32..2.0,
    ) {
        let env = adsr(attack, decay, sustain, release);
        let mut last = env.value_at(released_at, None, Some(released_at));
        for step in 1..=50 {
            let t = released_at + release * step as f32 / 50.0;
            let value = env.value_at(t, None, Some(released_at));
            prop_assert!(value <= last + 1e-6);
            last = value;
        }
    }
}
