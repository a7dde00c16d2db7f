//! Scripted transport run against the offline host.
//!
//! Run with: cargo run --example headless_loop

use spielwerk::hosts::OfflineHost;
use spielwerk::{AudioHost, PlayProps, SoundInstance};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let mut host = OfflineHost::new(48_000);
    // two seconds of silence, encoded as i16 pcm
    let mut sound = SoundInstance::from_encoded(&mut host, vec![0u8; 192_000]);

    sound
        .play(&mut host, PlayProps::default().loops(2).volume(0.8))
        .expect("source has data");

    // drive in 100ms steps until the instance reports completion
    loop {
        host.advance(0.1);
        for event in host.poll() {
            sound.handle_host_event(&mut host, &event);
        }
        while let Some(event) = sound.poll_event() {
            println!(
                "t={:.3}s  {:?}  position={:.0}ms",
                host.now(),
                event,
                sound.position_ms(&host)
            );
            if event == spielwerk::InstanceEvent::Complete {
                sound.destroy(&mut host);
                return;
            }
        }
    }
}
