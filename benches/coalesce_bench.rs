use cassrs::coalesce::{coalesce, Frame, Pixel};
use criterion::{criterion_group, criterion_main, Criterion};

/// Builds a 128x128 frame with isolated 3x3 hit clusters scattered across it.
fn scattered_frame(columns: usize, rows: usize) -> Vec<Pixel> {
    let mut pixels = Vec::new();
    let mut y = 2;
    while y + 2 < rows {
        let mut x = 2;
        while x + 2 < columns {
            for dy in 0..2 {
                for dx in 0..2 {
                    let (px, py) = (x + dx, y + dy);
                    pixels.push(Pixel { x: px as u16, y: py as u16, z: 50.0 });
                }
            }
            x += 8;
        }
        y += 8;
    }
    pixels
}

fn coalesce_bench(c: &mut Criterion) {
    let columns = 128;
    let rows = 128;
    let pixels = scattered_frame(columns, rows);
    let frame = Frame { columns, rows, pixels: &pixels, mip_threshold: 1e6 };

    c.bench_function("coalesce_128x128_scattered_clusters", |b| {
        b.iter(|| coalesce(&frame))
    });
}

criterion_group!(benches, coalesce_bench);
criterion_main!(benches);
