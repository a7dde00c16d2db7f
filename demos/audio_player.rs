//! Simple audio file player
//!
//! Run with: cargo run --example audio_player --features cpal_sink -- song.ogg

use std::thread::sleep;
use std::time::{Duration, Instant};

use symphonium::SymphoniumLoader;

use spielwerk::hosts::graph::{CpalDevice, GraphHost};
use spielwerk::hosts::PcmBuffer;
use spielwerk::{PlayProps, SoundInstance};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let path = std::env::args().nth(1).ok_or("usage: audio_player <file>")?;

    let device = CpalDevice::default_output().ok_or("No audio device")?;
    println!("Output: {} at {} Hz", device.name(), device.sample_rate());
    let mut host = GraphHost::with_device(&device);

    // With vorbis support compiled in, ogg files go through the host's own
    // deferred decode path; everything else is pre-decoded with symphonium.
    let mut sound = if cfg!(feature = "vorbis_decode") && path.ends_with(".ogg") {
        SoundInstance::from_encoded(&mut host, std::fs::read(&path)?)
    } else {
        let decoded = SymphoniumLoader::new().load_f32(&path, None)?;
        let buffer = PcmBuffer::new(
            decoded.as_interleaved(),
            decoded.channels() as u16,
            decoded.sample_rate,
        );
        SoundInstance::from_decoded(&mut host, buffer)
    };

    sound.play(&mut host, PlayProps::default().loops(-1))?;

    println!("Playing... Ctrl+C to stop");

    let start = Instant::now();
    let rate = host.sample_rate() as f64;
    let mut blocks = 0u64;

    loop {
        let target = (start.elapsed().as_secs_f64() * rate / 64.0) as u64 + 6; // 6 blocks buffer
        while blocks < target {
            host.pump(1);
            blocks += 1;
        }
        for event in host.poll() {
            sound.handle_host_event(&mut host, &event);
        }
        while let Some(event) = sound.poll_event() {
            println!("{:?}", event);
        }
        sleep(Duration::from_micros(500));
    }
}
