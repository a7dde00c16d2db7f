use criterion::{black_box, criterion_group, criterion_main, Criterion};

use spielwerk::hosts::{OfflineHost, PcmBuffer};
use spielwerk::{PlayProps, SoundInstance};

const RATE: u32 = 48_000;

fn one_second_buffer() -> PcmBuffer {
    PcmBuffer::new(vec![0.0; RATE as usize], 1, RATE)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("play_stop_cycle", |b| {
        let mut host = OfflineHost::new(RATE);
        let buffer = one_second_buffer();
        let mut sound = SoundInstance::from_decoded(&mut host, buffer);

        b.iter(|| {
            sound.play(&mut host, black_box(PlayProps::default())).unwrap();
            sound.stop(&mut host);
        })
    });

    c.bench_function("loop_promotion", |b| {
        let mut host = OfflineHost::new(RATE);
        let buffer = one_second_buffer();
        let mut sound = SoundInstance::from_decoded(&mut host, buffer);
        sound
            .play(&mut host, PlayProps::default().loops(-1))
            .unwrap();

        b.iter(|| {
            host.advance(1.0);
            for event in host.poll() {
                sound.handle_host_event(&mut host, &event);
            }
            black_box(sound.poll_event())
        })
    });

    c.bench_function("graph_render_block", |b| {
        use spielwerk::hosts::graph::GraphHost;
        let mut host = GraphHost::new(RATE);
        let mut sound = SoundInstance::from_decoded(&mut host, one_second_buffer());
        sound
            .play(&mut host, PlayProps::default().loops(-1))
            .unwrap();

        b.iter(|| host.pump(1))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
