//! Modulation benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use phy_modem::*;

fn frame_bits(waveform: &PskQamWaveform) -> Vec<u8> {
    (0..waveform.bits_per_frame()).map(|i| ((i * 5 + i / 7) % 2) as u8).collect()
}

fn benchmark_psk8_modulate(c: &mut Criterion) {
    let waveform = PskQamWaveform::new(2400.0, 4, 8, 16, 1000).unwrap();
    let symbols = waveform.map(&frame_bits(&waveform)).unwrap();

    c.bench_function("psk8_modulate_1000_symbols", |b| {
        b.iter(|| black_box(waveform.modulate(symbols.view()).unwrap()))
    });
}

fn benchmark_qam64_modulate(c: &mut Criterion) {
    let waveform = PskQamWaveform::new(2400.0, 4, 64, 16, 1000).unwrap();
    let bits = frame_bits(&waveform);

    c.bench_function("qam64_map_modulate_1000_symbols", |b| {
        b.iter(|| {
            let symbols = waveform.map(&bits).unwrap();
            black_box(waveform.modulate(symbols.view()).unwrap())
        })
    });
}

criterion_group!(benches, benchmark_psk8_modulate, benchmark_qam64_modulate);
criterion_main!(benches);
