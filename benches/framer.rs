//! Benchmarks for frame encode/decode throughput.
use std::io::Write;

use criterion::{BatchSize, Criterion};
use wsreactor::framer::coding::{Data, OpCode};
use wsreactor::framer::{Decoded, Frame, Framer};

fn masked_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Frame::message(payload.to_vec(), OpCode::Data(Data::Binary), true);
    frame.mask_with([0x37, 0xfa, 0x21, 0x3d]);
    let mut out = Vec::new();
    frame.format(&mut out).unwrap();
    out
}

fn benchmark(c: &mut Criterion) {
    let framer = Framer::new(None);

    c.bench_function("decode 100k small masked frames", |b| {
        b.iter_batched(
            || {
                let mut bytes = Vec::new();
                for i in 0_u64..100_000 {
                    bytes.extend_from_slice(&masked_frame(&i.to_le_bytes()));
                }
                bytes
            },
            |bytes| {
                let mut offset = 0;
                let mut count = 0;
                while offset < bytes.len() {
                    match framer.decode(&bytes[offset..]).unwrap() {
                        Decoded::Frame { consumed, .. } => {
                            offset += consumed;
                            count += 1;
                        }
                        Decoded::NeedMore => panic!("benchmark input should never be truncated"),
                    }
                }
                assert_eq!(count, 100_000);
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("encode 100k small frames", |b| {
        let frame = Frame::message(vec![0u8; 64], OpCode::Data(Data::Binary), true);
        b.iter(|| {
            let mut out = Vec::with_capacity(64 + 14);
            for _ in 0..100_000u32 {
                out.clear();
                framer.encode(&frame, &mut out);
            }
        });
    });
}

criterion::criterion_group!(framer_benches, benchmark);
criterion::criterion_main!(framer_benches);
