use spielwerk::hosts::{OfflineHost, PcmBuffer};
use spielwerk::{AudioHost, InstanceEvent, PlayError, PlayProps, PlayState, SoundInstance};

// The offline host decodes i16 LE mono, so at 8 kHz one second is 16000 bytes.
const RATE: u32 = 8_000;

fn encoded_secs(secs: f64) -> Vec<u8> {
    vec![0u8; (secs * RATE as f64 * 2.0) as usize]
}

fn decoded_secs(secs: f64) -> PcmBuffer {
    PcmBuffer::new(vec![0.0; (secs * RATE as f64) as usize], 1, RATE)
}

fn pump(host: &mut OfflineHost, sound: &mut SoundInstance<OfflineHost>) {
    for event in host.poll() {
        sound.handle_host_event(host, &event);
    }
}

#[test]
fn play_on_encoded_source_decodes_then_starts() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_encoded(&mut host, encoded_secs(1.0));

    sound.play(&mut host, PlayProps::default()).unwrap();
    assert_eq!(sound.state(), PlayState::AwaitingDecode);
    assert_eq!(host.decode_count(), 1);
    assert_eq!(host.live_source_count(), 0);

    pump(&mut host, &mut sound);
    assert_eq!(sound.state(), PlayState::Playing);
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Succeeded));
    assert_eq!(sound.duration_ms(), 1000.0);
    // no looping requested, so only the one node
    assert_eq!(host.live_source_count(), 1);
    assert!(host.output_connected(sound.gain_stage()));
    let node = sound.current_node().unwrap();
    assert_eq!(host.source_buffer_frames(node.source), Some(8_000));
    // chain is source -> pan -> gain -> output
    assert_eq!(host.source_target(node.source), Some(sound.pan_stage()));
    assert_eq!(host.stage_target(sound.pan_stage()), Some(sound.gain_stage()));
}

#[test]
fn play_on_decoded_source_is_synchronous() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(2.0));
    assert_eq!(sound.duration_ms(), 2000.0);

    sound.play(&mut host, PlayProps::default()).unwrap();
    assert_eq!(sound.state(), PlayState::Playing);
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Succeeded));
    assert_eq!(host.decode_count(), 0);
}

#[test]
fn play_without_source_fails() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_encoded(&mut host, Vec::new());

    let err = sound.play(&mut host, PlayProps::default());
    assert!(matches!(err, Err(PlayError::NoSource)));
    assert_eq!(sound.state(), PlayState::Initializing);
}

#[test]
fn pause_snapshots_position_and_reaps_nodes() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default()).unwrap();

    host.advance(0.4);
    sound.pause(&mut host);

    assert_eq!(sound.state(), PlayState::Paused);
    assert!((sound.position_ms(&host) - 400.0).abs() < 1e-9);
    assert_eq!(host.live_source_count(), 0);
    // teardown went stop -> scratch -> disconnect -> release
    assert_eq!(host.scratch_substitution_count(), 1);
    assert_eq!(host.pending_timer_count(), 0);
    assert!(!host.output_connected(sound.gain_stage()));

    // position stays frozen while paused
    host.advance(5.0);
    assert!((sound.position_ms(&host) - 400.0).abs() < 1e-9);
}

#[test]
fn resume_restarts_from_snapshot() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default()).unwrap();

    host.advance(0.4);
    sound.pause(&mut host);
    host.advance(2.0);
    sound.resume(&mut host);

    assert_eq!(sound.state(), PlayState::Playing);
    let node = sound.current_node().unwrap();
    let schedule = host.source_schedule(node.source).unwrap();
    assert_eq!(schedule.when, 2.4);
    assert!((schedule.offset - 0.4).abs() < 1e-9);
    assert!((schedule.duration - 0.6).abs() < 1e-9);
    // resume is not a fresh play; no second Succeeded
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Succeeded));
    assert_eq!(sound.poll_event(), None);
}

#[test]
fn pause_resume_reuses_the_decoded_buffer() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_encoded(&mut host, encoded_secs(1.0));
    sound.play(&mut host, PlayProps::default()).unwrap();
    pump(&mut host, &mut sound);
    assert_eq!(sound.state(), PlayState::Playing);

    host.advance(0.3);
    sound.pause(&mut host);
    sound.resume(&mut host);

    assert_eq!(sound.state(), PlayState::Playing);
    // pause keeps the decoded data; resume must not decode again
    assert_eq!(host.decode_count(), 1);
}

#[test]
fn stop_resets_position_and_reverts_decoded_data() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_encoded(&mut host, encoded_secs(1.0));
    sound.play(&mut host, PlayProps::default()).unwrap();
    pump(&mut host, &mut sound);

    host.advance(0.5);
    sound.stop(&mut host);
    assert_eq!(sound.state(), PlayState::Stopped);
    assert_eq!(sound.position_ms(&host), 0.0);
    assert_eq!(host.live_source_count(), 0);

    // the full-buffer decode was reverted, so replay decodes again
    sound.play(&mut host, PlayProps::default()).unwrap();
    assert_eq!(host.decode_count(), 2);
}

#[test]
fn natural_completion_emits_complete_and_stops() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default()).unwrap();
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Succeeded));

    host.advance(1.001);
    pump(&mut host, &mut sound);

    assert_eq!(sound.state(), PlayState::Stopped);
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Complete));
    assert_eq!(sound.position_ms(&host), 0.0);
    assert_eq!(host.live_source_count(), 0);
}

#[test]
fn seek_while_playing_rebuilds_at_new_position() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default()).unwrap();

    host.advance(0.2);
    sound.set_position(&mut host, 600.0);

    assert_eq!(sound.state(), PlayState::Playing);
    assert!((sound.position_ms(&host) - 600.0).abs() < 1e-9);
    let node = sound.current_node().unwrap();
    let schedule = host.source_schedule(node.source).unwrap();
    assert!((schedule.offset - 0.6).abs() < 1e-9);
    assert_eq!(host.live_source_count(), 1);

    // remaining window is 400ms from the seek, not from t=0
    host.advance(0.401);
    pump(&mut host, &mut sound);
    assert_eq!(sound.state(), PlayState::Stopped);
}

#[test]
fn seek_while_paused_only_moves_the_snapshot() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default()).unwrap();
    host.advance(0.2);
    sound.pause(&mut host);

    sound.set_position(&mut host, 750.0);
    assert_eq!(sound.state(), PlayState::Paused);
    assert_eq!(host.live_source_count(), 0);

    sound.resume(&mut host);
    let schedule = host
        .source_schedule(sound.current_node().unwrap().source)
        .unwrap();
    assert!((schedule.offset - 0.75).abs() < 1e-9);
}

#[test]
fn volume_and_mute_apply_to_the_gain_stage() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default()).unwrap();

    sound.set_volume(&mut host, 0.5);
    assert_eq!(host.stage_value(sound.gain_stage()), Some(0.5));

    sound.set_muted(&mut host, true);
    assert_eq!(host.stage_value(sound.gain_stage()), Some(0.0));
    assert_eq!(sound.volume(), 0.5);

    sound.set_muted(&mut host, false);
    assert_eq!(host.stage_value(sound.gain_stage()), Some(0.5));

    // out-of-range values clamp
    sound.set_volume(&mut host, 3.0);
    assert_eq!(sound.volume(), 1.0);
}

#[test]
fn pan_applies_to_the_pan_stage() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));

    sound.set_pan(&mut host, -0.25);
    assert_eq!(host.stage_value(sound.pan_stage()), Some(-0.25));

    sound.set_pan(&mut host, -7.0);
    assert_eq!(sound.pan(), -1.0);
}

#[test]
fn decode_failure_is_terminal_for_the_attempt_but_replayable() {
    let mut host = OfflineHost::new(RATE);
    // odd byte count is rejected by the i16 decoder
    let mut sound = SoundInstance::from_encoded(&mut host, vec![0u8; 3]);

    sound.play(&mut host, PlayProps::default()).unwrap();
    pump(&mut host, &mut sound);

    assert_eq!(sound.state(), PlayState::Failed);
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Failed));
    assert_eq!(sound.position_ms(&host), 0.0);
    assert_eq!(host.live_source_count(), 0);

    // each play is a fresh single attempt
    sound.play(&mut host, PlayProps::default()).unwrap();
    assert_eq!(host.decode_count(), 2);
}

#[test]
fn late_decode_after_stop_is_discarded() {
    let mut host = OfflineHost::new(RATE).with_decode_latency(0.1);
    let mut sound = SoundInstance::from_encoded(&mut host, encoded_secs(1.0));

    sound.play(&mut host, PlayProps::default()).unwrap();
    sound.stop(&mut host);

    host.advance(0.2);
    let events = host.poll();
    assert_eq!(events.len(), 1);
    // not ours anymore; nothing resurrects
    assert!(!sound.handle_host_event(&mut host, &events[0]));
    assert_eq!(sound.state(), PlayState::Stopped);
    assert_eq!(host.live_source_count(), 0);
}

#[test]
fn restart_while_awaiting_decode_discards_the_stale_result() {
    let mut host = OfflineHost::new(RATE).with_decode_latency(0.1);
    let mut sound = SoundInstance::from_encoded(&mut host, encoded_secs(1.0));

    sound.play(&mut host, PlayProps::default()).unwrap();
    sound.play(&mut host, PlayProps::default()).unwrap();
    assert_eq!(host.decode_count(), 2);

    host.advance(0.2);
    let events = host.poll();
    assert_eq!(events.len(), 2);
    // first decode result belongs to the superseded play
    assert!(!sound.handle_host_event(&mut host, &events[0]));
    assert!(sound.handle_host_event(&mut host, &events[1]));
    assert_eq!(sound.state(), PlayState::Playing);
    assert_eq!(host.live_source_count(), 1);
}

#[test]
fn scratch_rejection_does_not_break_teardown() {
    let mut host = OfflineHost::new(RATE).with_scratch_rejected();
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default()).unwrap();

    sound.pause(&mut host);
    assert_eq!(sound.state(), PlayState::Paused);
    assert_eq!(host.live_source_count(), 0);
}

#[test]
fn destroy_releases_every_node_and_stage() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default().loops(-1)).unwrap();
    assert_eq!(host.live_source_count(), 2);
    assert_eq!(host.live_stage_count(), 2);

    sound.destroy(&mut host);
    assert_eq!(host.live_source_count(), 0);
    assert_eq!(host.live_stage_count(), 0);
    assert_eq!(host.pending_timer_count(), 0);
}

#[test]
fn segment_window_plays_only_the_window() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(2.0));

    sound
        .play(&mut host, PlayProps::default().window(250.0, 500.0))
        .unwrap();
    assert_eq!(sound.duration_ms(), 500.0);

    let schedule = host
        .source_schedule(sound.current_node().unwrap().source)
        .unwrap();
    assert!((schedule.offset - 0.25).abs() < 1e-9);
    assert!((schedule.duration - 0.5).abs() < 1e-9);

    host.advance(0.501);
    pump(&mut host, &mut sound);
    assert_eq!(sound.state(), PlayState::Stopped);
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Succeeded));
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Complete));
}
