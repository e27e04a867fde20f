//! Effect arming through frames and the writes the scheduler makes for them.

use ym2149_serial::bus::recording::RecordingLines;
use ym2149_serial::effects::reload_ticks;
use ym2149_serial::{
    ChipId, EffectPersistence, SampleBank, Synth, SynthConfig, TickMode, Voice, FRAME_LEN,
};

fn synth(tick_mode: TickMode, samples: SampleBank) -> Synth<RecordingLines> {
    let config = SynthConfig {
        tick_mode,
        ..SynthConfig::default()
    };
    Synth::new(RecordingLines::new(config.select_wiring), &config).with_samples(samples)
}

/// Silent frame: register `r` sits at offset `1 + r`, count bytes last.
fn frame(chip: u8) -> [u8; FRAME_LEN] {
    let mut bytes = [0u8; FRAME_LEN];
    bytes[0] = chip;
    bytes
}

fn with_timer_synth(
    mut bytes: [u8; FRAME_LEN],
    voice: u8,
    prescaler: u8,
    count: u8,
) -> [u8; FRAME_LEN] {
    bytes[1 + 1] = (voice + 1) << 4;
    bytes[1 + 6] = prescaler << 5;
    bytes[15] = count;
    bytes
}

fn with_sample(
    mut bytes: [u8; FRAME_LEN],
    voice: u8,
    sample_id: u8,
    prescaler: u8,
    count: u8,
) -> [u8; FRAME_LEN] {
    bytes[1 + 3] = (voice + 1) << 4;
    bytes[1 + 8] |= prescaler << 5;
    bytes[1 + 8 + voice as usize] |= sample_id;
    bytes[16] = count;
    bytes
}

#[test]
fn timer_synth_slot_decode() {
    let mut synth = synth(TickMode::Batched, SampleBank::new());
    synth.apply_frame(&with_timer_synth(frame(0), 1, 3, 9));

    let state = synth.effects().timer_synth(ChipId::YM0, Voice::B);
    assert!(state.is_active());
    assert_eq!(state.reload_ticks(), 160);
    assert_eq!(state.reload_ticks(), reload_ticks(3, 9));
    assert_eq!(state.phase_countdown(), 160);
    assert_eq!(state.level(), 9);
    assert!(!state.toggle());
    assert!(!synth.effects().timer_synth(ChipId::YM0, Voice::A).is_active());
}

#[test]
fn timer_synth_rearm_resets_phase() {
    let mut synth = synth(TickMode::EveryTick, SampleBank::new());
    let bytes = with_timer_synth(frame(1), 0, 0, 4);
    synth.apply_frame(&bytes);
    for _ in 0..7 {
        synth.tick();
    }
    assert_ne!(
        synth.effects().timer_synth(ChipId::YM1, Voice::A).phase_countdown(),
        20
    );

    synth.apply_frame(&bytes);
    let state = synth.effects().timer_synth(ChipId::YM1, Voice::A);
    assert_eq!(state.phase_countdown(), 20);
    assert!(!state.toggle());
}

#[test]
fn timer_synth_has_priority_over_sample() {
    let mut bank = SampleBank::new();
    bank.insert(5, vec![0x07u8; 256]).unwrap();
    let mut synth = synth(TickMode::EveryTick, bank);

    // Both slots on voice C of chip 2: gate level 12, sample 5
    let bytes = with_sample(with_timer_synth(frame(2), 2, 0, 12), 2, 5, 0, 0);
    synth.apply_frame(&bytes);
    assert!(synth.effects().timer_synth(ChipId::YM2, Voice::C).is_active());
    assert!(synth.effects().sample(ChipId::YM2, Voice::C).is_active());
    assert_eq!(synth.effects().sample(ChipId::YM2, Voice::C).sample_id(), 5);
    synth.lines_mut().clear_log();

    let level = synth.effects().timer_synth(ChipId::YM2, Voice::C).level();
    assert_eq!(level, 12);
    for activation in 0..120 {
        assert_eq!(synth.tick(), 1, "activation {activation}");
        let writes = synth.lines_mut().take_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].register, 10);
        assert!(writes[0].value == 0 || writes[0].value == level);
        assert_ne!(writes[0].value, 0x07);
    }
}

#[test]
fn sample_stops_after_its_length() {
    let mut bank = SampleBank::new();
    bank.insert(9, vec![0x1Au8, 0x2B, 0x3C, 0x4D]).unwrap();
    assert_eq!(bank.len(9), 4);
    let mut synth = synth(TickMode::EveryTick, bank);

    // Prescaler 0, count 0: one cursor advance every 4 activations
    synth.apply_frame(&with_sample(frame(0), 0, 9, 0, 0));
    synth.lines_mut().clear_log();

    let mut advances = Vec::new();
    for activation in 1..=40 {
        synth.tick();
        let state = synth.effects().sample(ChipId::YM0, Voice::A);
        if activation % 4 == 0 && advances.len() < 4 {
            advances.push((state.position(), state.is_active()));
        }
    }
    assert_eq!(advances, vec![(1, true), (2, true), (3, true), (4, false)]);

    let values: Vec<_> = synth
        .lines()
        .writes()
        .iter()
        .map(|w| (w.register, w.value))
        .collect();
    // Each value is rewritten on every activation until the next advance
    let mut expected = Vec::new();
    for value in [0x0A, 0x0B, 0x0C] {
        expected.extend(std::iter::repeat((8, value)).take(4));
    }
    expected.push((8, 0x0D));
    assert_eq!(values, expected);
}

#[test]
fn batched_sample_still_writes_its_final_value() {
    let mut bank = SampleBank::new();
    bank.insert(9, vec![0x1Au8, 0x2B, 0x3C, 0x4D]).unwrap();
    let mut synth = synth(TickMode::Batched, bank);

    // Reload 4 against 8 ticks per activation: two bytes per activation
    synth.apply_frame(&with_sample(frame(0), 0, 9, 0, 0));
    synth.lines_mut().clear_log();
    for _ in 0..40 {
        synth.tick();
    }
    assert!(!synth.effects().sample(ChipId::YM0, Voice::A).is_active());

    let values: Vec<_> = synth
        .lines()
        .writes()
        .iter()
        .map(|w| (w.register, w.value))
        .collect();
    assert_eq!(values, vec![(8, 0x0B), (8, 0x0D)]);
    assert_eq!(synth.lines().register(ChipId::YM0, 8), 0x0D);
    assert!(synth.lines().faults().is_empty());
}

#[test]
fn zero_flag_disarms_under_clear_on_zero() {
    let mut synth = synth(TickMode::Batched, SampleBank::new());
    synth.apply_frame(&with_timer_synth(frame(0), 2, 1, 1));
    assert!(synth.effects().timer_synth(ChipId::YM0, Voice::C).is_active());

    // A frame for another chip leaves chip 0 alone
    synth.apply_frame(&frame(1));
    assert!(synth.effects().timer_synth(ChipId::YM0, Voice::C).is_active());

    synth.apply_frame(&frame(0));
    assert!(!synth.effects().timer_synth(ChipId::YM0, Voice::C).is_active());
}

#[test]
fn persist_keeps_effect_until_rearmed() {
    let config = SynthConfig {
        effect_persistence: EffectPersistence::Persist,
        ..SynthConfig::default()
    };
    let mut synth = Synth::new(RecordingLines::new(config.select_wiring), &config);
    synth.apply_frame(&with_timer_synth(frame(0), 0, 1, 1));
    synth.apply_frame(&frame(0));
    assert!(synth.effects().timer_synth(ChipId::YM0, Voice::A).is_active());
}

#[test]
fn batched_rotation_reaches_every_voice() {
    let mut synth = synth(TickMode::Batched, SampleBank::new());
    for chip in 0..3u8 {
        let mut bytes = with_timer_synth(frame(chip), 0, 0, 15);
        bytes[1 + 8] = 0;
        synth.apply_frame(&bytes);
    }
    // Only voice A is armed on each chip
    synth.lines_mut().clear_log();
    let mut writes = 0;
    for _ in 0..16 {
        writes += synth.tick();
    }
    assert_eq!(writes, synth.lines().writes().len());
    for chip in ChipId::ALL {
        assert!(synth
            .lines()
            .writes()
            .iter()
            .any(|w| w.chip == chip && w.register == 8));
    }
    assert!(synth.lines().writes().iter().all(|w| w.register == 8));
}
