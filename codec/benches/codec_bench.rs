use std::io::Cursor;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use segstream_codec::{CamFileReader, CamFileWriter, CamFormat, IlabReader, IlabWriter, to_pre8};
use segstream_core::{FeatureSink, FeatureSource, LabelSink, LabelSource, Positionable, SegmentSink};

fn frames(n_frames: usize, n_ftrs: usize) -> Vec<f32> {
    let mut state = 42u64;
    (0..n_frames * n_ftrs)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 33) as f32) / (u32::MAX as f32) - 0.25
        })
        .collect()
}

fn encode(format: CamFormat, data: &[f32], n_ftrs: usize) -> Vec<u8> {
    let mut w = CamFileWriter::new(Vec::new(), format, n_ftrs);
    for seg in data.chunks(100 * n_ftrs) {
        w.write_ftrs(seg.len() / n_ftrs, seg).unwrap();
        w.doneseg().unwrap();
    }
    w.finish().unwrap()
}

fn bench_camfile_read(c: &mut Criterion) {
    let n_ftrs = 39;
    let data = frames(10_000, n_ftrs);
    let mut group = c.benchmark_group("camfile_read");
    for format in [CamFormat::Pre, CamFormat::Lna8, CamFormat::OnlFtr] {
        let bytes = encode(format, &data, n_ftrs);
        group.bench_with_input(BenchmarkId::from_parameter(format), &bytes, |b, bytes| {
            let mut buf = vec![0.0f32; 100 * n_ftrs];
            b.iter(|| {
                let mut r =
                    CamFileReader::new(Cursor::new(bytes.as_slice()), format, n_ftrs, false).unwrap();
                let mut total = 0;
                while r.nextseg().unwrap().is_some() {
                    total += r.read_ftrs(100, Some(&mut buf)).unwrap();
                }
                black_box(total)
            });
        });
    }
    group.finish();
}

fn bench_camfile_index(c: &mut Criterion) {
    let n_ftrs = 39;
    let bytes = encode(CamFormat::OnlFtr, &frames(10_000, n_ftrs), n_ftrs);
    c.bench_function("camfile_index_100segs", |b| {
        b.iter(|| {
            let r = CamFileReader::onlftr(Cursor::new(bytes.as_slice()), n_ftrs, true).unwrap();
            black_box(r.num_segs().unwrap())
        });
    });
}

fn bench_pre8_compress(c: &mut Criterion) {
    let data = frames(1_000, 39);
    c.bench_function("pre8_compress_39k", |b| {
        b.iter(|| {
            let mut acc = 0u32;
            for &v in &data {
                acc += to_pre8(black_box(v)) as u32;
            }
            black_box(acc)
        });
    });
}

fn bench_ilab_round_trip(c: &mut Criterion) {
    // Runs of 8 frames, as forced alignments tend to have.
    let labs: Vec<u32> = (0..10_000u32).map(|i| (i / 8) % 61).collect();
    c.bench_function("ilab_write_read_10k", |b| {
        b.iter(|| {
            let mut w = IlabWriter::new(Cursor::new(Vec::new()), 60, true).unwrap();
            for seg in labs.chunks(500) {
                w.write_labs(seg.len(), seg).unwrap();
                w.doneseg().unwrap();
            }
            let bytes = w.finish().unwrap().into_inner();
            let mut r = IlabReader::new(Cursor::new(bytes), true).unwrap();
            let mut out = vec![0u32; 500];
            let mut total = 0;
            while r.nextseg().unwrap().is_some() {
                total += r.read_labs(500, Some(&mut out)).unwrap();
            }
            black_box(total)
        });
    });
}

criterion_group!(
    benches,
    bench_camfile_read,
    bench_camfile_index,
    bench_pre8_compress,
    bench_ilab_round_trip
);
criterion_main!(benches);
