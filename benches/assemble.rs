use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use picload::hex::{AssemblerConfig, MemoryBlock, assemble};
use picload::transport::codec;

/// Contiguous 16-byte data records covering `instructions` words from address 0
fn synthetic_hex(instructions: u32) -> Vec<String> {
    let mut lines = vec![":020000040000FA".to_string()];
    for record in 0..instructions.div_ceil(4) {
        let data: String = (0..4)
            .map(|n| format!("{:08X}", 0x0004_0000 + record * 4 + n))
            .collect();
        lines.push(format!(":10{:04X}00{data}00", (record * 16) & 0xFFFF));
    }
    lines.push(":00000001FF".to_string());
    lines
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");

    for &count in &[256u32, 4096] {
        let lines = synthetic_hex(count);
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_function(format!("assemble_{count}_instructions"), |b| {
            b.iter(|| {
                black_box(assemble(lines.iter(), &AssemblerConfig::default()).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let mut block = MemoryBlock::new(0x200);
    for n in 0..64 {
        block.store(0x200 + n * 2, n);
    }
    let payload = codec::encode_block_payload(&block);
    let address = codec::encode_address(block.first_address());

    group.throughput(Throughput::Bytes(codec::BLOCK_PAYLOAD_BYTES as u64));
    group.bench_function("encode_block", |b| {
        b.iter(|| {
            black_box(codec::encode_block_payload(&block));
        });
    });
    group.bench_function("decode_block", |b| {
        b.iter(|| {
            black_box(codec::decode_block(&address, &payload).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_assemble, bench_codec);
criterion_main!(benches);
