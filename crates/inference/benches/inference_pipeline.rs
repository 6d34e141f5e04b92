use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use inference::{DecoderSettings, OutputDecoder, SuppressionFilter};
use ndarray::{Array, ArrayD, IxDyn};

const NUM_CLASSES: usize = 7;

/// Create a mock features-first output `[1, 4 + classes, anchors]` with N
/// confident, clustered candidates and the rest as background logits.
fn create_mock_output(num_anchors: usize, num_detections: usize) -> ArrayD<f32> {
    let width = 4 + NUM_CLASSES;
    let mut data = vec![-6.0f32; width * num_anchors];

    for a in 0..num_anchors {
        data[a] = 160.0;
        data[num_anchors + a] = 160.0;
        data[2 * num_anchors + a] = 20.0;
        data[3 * num_anchors + a] = 20.0;
    }

    for i in 0..num_detections.min(num_anchors) {
        // Groups of four overlapping boxes so suppression has work to do.
        let offset = (i / 4) as f32 * 25.0 + (i % 4) as f32;
        data[i] = 20.0 + offset % 280.0;
        data[num_anchors + i] = 20.0 + (offset / 280.0).floor() * 25.0;
        data[(4 + i % NUM_CLASSES) * num_anchors + i] = 3.0;
    }

    Array::from_shape_vec(IxDyn(&[1, width, num_anchors]), data).expect("valid shape")
}

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let decoder = OutputDecoder::new(NUM_CLASSES, DecoderSettings::default());

    for num_detections in [0, 5, 20, 100].iter() {
        let output = create_mock_output(2100, *num_detections);

        group.bench_with_input(
            BenchmarkId::new("decode_2100_anchors", num_detections),
            &output,
            |b, output| {
                b.iter(|| {
                    decoder
                        .decode(black_box(output), (320, 320), (1280, 720))
                        .expect("decode")
                });
            },
        );
    }

    group.finish();
}

fn benchmark_decode_and_suppress(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_and_suppress");
    let decoder = OutputDecoder::new(NUM_CLASSES, DecoderSettings::default());
    let filter = SuppressionFilter::new(0.45);

    for num_detections in [5, 20, 100].iter() {
        let output = create_mock_output(2100, *num_detections);

        group.bench_with_input(
            BenchmarkId::new("full", num_detections),
            &output,
            |b, output| {
                b.iter(|| {
                    let candidates = decoder
                        .decode(black_box(output), (320, 320), (1280, 720))
                        .expect("decode");
                    filter.apply(candidates)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_decode, benchmark_decode_and_suppress);
criterion_main!(benches);
