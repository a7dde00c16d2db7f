use spielwerk::hosts::{OfflineHost, PcmBuffer};
use spielwerk::{AudioHost, InstanceEvent, PlayProps, PlayState, SoundInstance};

const RATE: u32 = 8_000;

fn decoded_secs(secs: f64) -> PcmBuffer {
    PcmBuffer::new(vec![0.0; (secs * RATE as f64) as usize], 1, RATE)
}

fn encoded_secs(secs: f64) -> Vec<u8> {
    vec![0u8; (secs * RATE as f64 * 2.0) as usize]
}

fn pump(host: &mut OfflineHost, sound: &mut SoundInstance<OfflineHost>) {
    for event in host.poll() {
        sound.handle_host_event(host, &event);
    }
}

#[test]
fn looping_pre_arms_the_next_iteration() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));

    sound.play(&mut host, PlayProps::default().loops(2)).unwrap();

    // both the audible node and the look-ahead node are live from the start
    assert_eq!(host.live_source_count(), 2);
    let next = sound.next_node().unwrap();
    assert_eq!(next.start_time, 1.0);
    let schedule = host.source_schedule(next.source).unwrap();
    assert_eq!(schedule.when, 1.0);
    assert_eq!(schedule.offset, 0.0);
    assert_eq!(schedule.duration, 1.0);
}

#[test]
fn two_loops_promote_twice_then_complete() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default().loops(2)).unwrap();
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Succeeded));

    // just before the boundary nothing has happened yet
    host.advance_to(0.999);
    pump(&mut host, &mut sound);
    assert_eq!(sound.poll_event(), None);
    assert_eq!(sound.current_node().unwrap().start_time, 0.0);

    // first boundary
    host.advance_to(1.001);
    pump(&mut host, &mut sound);
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Looped));
    assert_eq!(sound.current_node().unwrap().start_time, 1.0);
    assert_eq!(sound.next_node().unwrap().start_time, 2.0);
    assert_eq!(host.live_source_count(), 2);

    // second boundary: last pass, no further look-ahead
    host.advance_to(2.002);
    pump(&mut host, &mut sound);
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Looped));
    assert_eq!(sound.current_node().unwrap().start_time, 2.0);
    assert!(sound.next_node().is_none());
    assert_eq!(host.live_source_count(), 1);

    // third pass runs out
    host.advance_to(3.003);
    pump(&mut host, &mut sound);
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Complete));
    assert_eq!(sound.state(), PlayState::Stopped);
    assert_eq!(host.live_source_count(), 0);
}

#[test]
fn late_loop_callback_does_not_drift_the_clock() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default().loops(-1)).unwrap();

    // the callback lands 250ms late; the look-ahead node started on time
    host.advance_to(1.25);
    pump(&mut host, &mut sound);

    assert_eq!(sound.current_node().unwrap().start_time, 1.0);
    assert!((sound.position_ms(&host) - 250.0).abs() < 1e-9);
    // next iteration is scheduled off the recorded start, not off "now"
    assert_eq!(sound.next_node().unwrap().start_time, 2.0);
}

#[test]
fn infinite_loop_never_completes() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default().loops(-1)).unwrap();
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Succeeded));

    for boundary in 1..=5u32 {
        // 2ms past each nominal boundary keeps a clear margin over the
        // re-armed timer deadlines
        host.advance_to(boundary as f64 * 1.002);
        pump(&mut host, &mut sound);
        assert_eq!(sound.poll_event(), Some(InstanceEvent::Looped));
    }
    assert_eq!(sound.state(), PlayState::Playing);
    assert_eq!(sound.loop_count(), -1);
    assert_eq!(host.live_source_count(), 2);
    assert_eq!(sound.poll_event(), None);
}

#[test]
fn enabling_loop_mid_playback_arms_look_ahead() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default()).unwrap();
    assert_eq!(host.live_source_count(), 1);

    host.advance(0.3);
    sound.set_loop(&mut host, -1);

    assert_eq!(sound.state(), PlayState::Playing);
    assert_eq!(host.live_source_count(), 2);
    assert!((sound.position_ms(&host) - 300.0).abs() < 1e-9);
    // look-ahead lands at the original pass boundary: one full duration
    // after the rebased window start, not one duration after "now"
    assert!((sound.next_node().unwrap().start_time - 1.0).abs() < 1e-9);
}

#[test]
fn pause_and_resume_keep_looping() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default().loops(-1)).unwrap();

    host.advance_to(1.2);
    pump(&mut host, &mut sound);
    host.advance_to(1.5);
    sound.pause(&mut host);
    assert!((sound.position_ms(&host) - 500.0).abs() < 1e-9);
    assert_eq!(host.live_source_count(), 0);

    sound.resume(&mut host);
    assert_eq!(sound.state(), PlayState::Playing);
    assert_eq!(host.live_source_count(), 2);
}

#[test]
fn full_buffer_decode_reverts_after_looped_completion() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_encoded(&mut host, encoded_secs(1.0));
    sound.play(&mut host, PlayProps::default().loops(1)).unwrap();
    pump(&mut host, &mut sound);
    assert_eq!(sound.state(), PlayState::Playing);

    host.advance(1.001);
    pump(&mut host, &mut sound);
    host.advance(1.001);
    pump(&mut host, &mut sound);
    assert_eq!(sound.state(), PlayState::Stopped);

    sound.play(&mut host, PlayProps::default()).unwrap();
    assert_eq!(host.decode_count(), 2);
}

#[test]
fn segment_decode_is_kept_across_completion() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_encoded(&mut host, encoded_secs(2.0));
    sound
        .play(&mut host, PlayProps::default().window(0.0, 500.0))
        .unwrap();
    pump(&mut host, &mut sound);
    assert_eq!(sound.state(), PlayState::Playing);

    host.advance(0.501);
    pump(&mut host, &mut sound);
    assert_eq!(sound.state(), PlayState::Stopped);

    // segment decodes are never reverted; replay skips the decoder
    sound.play(&mut host, PlayProps::default()).unwrap();
    assert_eq!(sound.state(), PlayState::Playing);
    assert_eq!(host.decode_count(), 1);
}

#[test]
fn stale_completion_timer_is_ignored_after_restart() {
    let mut host = OfflineHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_secs(1.0));
    sound.play(&mut host, PlayProps::default().loops(-1)).unwrap();

    // restart mid-pass; the first timer was cancelled, so only one fires
    host.advance_to(0.5);
    sound.play(&mut host, PlayProps::default().loops(-1)).unwrap();

    host.advance_to(1.4);
    let events = host.poll();
    assert_eq!(events.len(), 0);

    // the restarted pass ends at 1.5
    host.advance_to(1.501);
    pump(&mut host, &mut sound);
    assert_eq!(sound.current_node().unwrap().start_time, 1.5);
}
