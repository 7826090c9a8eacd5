use chromashade::{
    morphology::{box_blur, dilate},
    BitMask, ColorRemovalConfig, ColorSeed, ColorSegmenter, Raster, ShadowConfig, ShadowCorrector,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const SIZES: [u32; 3] = [256, 512, 1024];

/// Product shot: colored object with a soft drop shadow on a green backdrop
fn product_shot(size: u32) -> Raster {
    let s = size as f32;
    Raster::from_fn(size, size, |x, y| {
        let (fx, fy) = (x as f32 / s, y as f32 / s);
        let object = (fx - 0.5).powi(2) + (fy - 0.45).powi(2) < 0.04;
        let shadow = (fx - 0.56).powi(2) + ((fy - 0.62) * 2.5).powi(2) < 0.05;
        match (object, shadow) {
            (true, _) => [190, 60 + (x % 40) as u8, 50, 255],
            (false, true) => [20, 120, 25, 255],
            _ => [30, 220, 40, 255],
        }
    })
    .expect("valid dimensions")
}

fn bench_color_removal(c: &mut Criterion) {
    let mut group = c.benchmark_group("color_removal");
    group.sample_size(20);

    for size in SIZES {
        let raster = product_shot(size);
        group.throughput(Throughput::Elements(u64::from(size) * u64::from(size)));

        let global = [ColorSeed::sample_global(&raster, 0, 0)];
        let segmenter = ColorSegmenter::new(ColorRemovalConfig::default());
        group.bench_with_input(BenchmarkId::new("global_seed", size), &raster, |b, raster| {
            b.iter(|| segmenter.segment(black_box(raster), &global));
        });

        let local = [ColorSeed::sample_local(&raster, 5, 5)];
        group.bench_with_input(BenchmarkId::new("local_seed", size), &raster, |b, raster| {
            b.iter(|| segmenter.segment(black_box(raster), &local));
        });
    }
    group.finish();
}

fn bench_shadow_correction(c: &mut Criterion) {
    let mut group = c.benchmark_group("shadow_correction");
    group.sample_size(10);

    for size in SIZES {
        let raster = product_shot(size);
        group.throughput(Throughput::Elements(u64::from(size) * u64::from(size)));

        for (name, config) in [
            ("default", ShadowConfig::default()),
            (
                "extreme",
                ShadowConfig {
                    strength: 100.0,
                    extreme: true,
                    ..ShadowConfig::default()
                },
            ),
        ] {
            let corrector = ShadowCorrector::new(config);
            group.bench_with_input(BenchmarkId::new(name, size), &raster, |b, raster| {
                b.iter(|| corrector.correct(black_box(raster), None));
            });
        }
    }
    group.finish();
}

fn bench_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");
    let mask = BitMask::from_fn(1024, 1024, |x, y| (x / 17 + y / 13) % 3 == 0);
    let field = mask.to_field();

    // Cost should not depend on the radius
    for radius in [1u32, 4, 16] {
        group.bench_with_input(BenchmarkId::new("dilate", radius), &radius, |b, &r| {
            b.iter(|| dilate(black_box(&mask), r));
        });
        group.bench_with_input(BenchmarkId::new("box_blur", radius), &radius, |b, &r| {
            b.iter(|| box_blur(black_box(&field), r));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_color_removal, bench_shadow_correction, bench_primitives);
criterion_main!(benches);
