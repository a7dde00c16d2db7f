//! The transport logic against a real graph, rendered headless.

use spielwerk::hosts::graph::GraphHost;
use spielwerk::hosts::PcmBuffer;
use spielwerk::{AudioHost, InstanceEvent, PlayProps, PlayState, SoundInstance};

const RATE: u32 = 48_000;

fn decoded_ms(ms: u64) -> PcmBuffer {
    let frames = (ms * RATE as u64 / 1000) as usize;
    PcmBuffer::new(vec![0.1; frames], 1, RATE)
}

fn pump(host: &mut GraphHost, sound: &mut SoundInstance<GraphHost>) {
    for event in host.poll() {
        sound.handle_host_event(host, &event);
    }
}

#[test]
fn clock_advances_with_rendered_blocks() {
    let mut host = GraphHost::new(RATE);
    assert_eq!(host.now(), 0.0);

    host.pump_for(0.5);
    // block granularity rounds up, never down
    assert!(host.now() >= 0.5);
    assert!(host.now() < 0.51);
}

#[test]
fn playback_completes_against_the_graph_clock() {
    let mut host = GraphHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_ms(100));

    sound.play(&mut host, PlayProps::default()).unwrap();
    assert_eq!(sound.state(), PlayState::Playing);
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Succeeded));

    host.pump_for(0.102);
    pump(&mut host, &mut sound);

    assert_eq!(sound.state(), PlayState::Stopped);
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Complete));
}

#[test]
fn looping_promotes_across_rendered_boundaries() {
    let mut host = GraphHost::new(RATE);
    let mut sound = SoundInstance::from_decoded(&mut host, decoded_ms(100));

    sound.play(&mut host, PlayProps::default().loops(1)).unwrap();
    sound.poll_event();

    host.pump_for(0.102);
    pump(&mut host, &mut sound);
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Looped));
    assert_eq!(sound.state(), PlayState::Playing);

    host.pump_for(0.102);
    pump(&mut host, &mut sound);
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Complete));
    assert_eq!(sound.state(), PlayState::Stopped);
}

#[test]
fn deferred_decode_resolves_on_poll() {
    // garbage bytes: whatever decoder is compiled in rejects them cleanly
    let mut host = GraphHost::new(RATE);
    let mut sound = SoundInstance::from_encoded(&mut host, vec![0u8; 128]);

    sound.play(&mut host, PlayProps::default()).unwrap();
    assert_eq!(sound.state(), PlayState::AwaitingDecode);

    pump(&mut host, &mut sound);
    assert_eq!(sound.state(), PlayState::Failed);
    assert_eq!(sound.poll_event(), Some(InstanceEvent::Failed));
}
