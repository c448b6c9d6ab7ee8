use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sluice_stream::{Callback, Pump, ReadStream, WriteStream, pipe};
use std::hint::black_box;
use std::sync::Arc;

const TOTAL: usize = 1024 * 1024;

fn pump_through_pipes(chunk_size: usize) -> u64 {
    let (input, source) = pipe(64 * 1024);
    let (sink, output) = pipe(16 * 1024);

    output.data_handler(Some(Callback::new(|chunk: Bytes| {
        black_box(chunk);
    })));
    let end_sink = Arc::clone(&sink);
    source.end_handler(Some(Callback::new(move |()| end_sink.end())));

    let mut pump = Pump::new(source, sink);
    pump.start().unwrap();

    let chunk = Bytes::from(vec![b'x'; chunk_size]);
    for _ in 0..TOTAL / chunk_size {
        input.write(chunk.clone());
    }
    input.end();

    pump.bytes_pumped()
}

fn bench_pump(c: &mut Criterion) {
    let mut group = c.benchmark_group("pump_pipe_to_pipe");
    group.throughput(Throughput::Bytes(TOTAL as u64));

    for chunk_size in [512, 8 * 1024, 64 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk_size), &chunk_size, |b, &chunk_size| {
            b.iter(|| pump_through_pipes(chunk_size));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pump);
criterion_main!(benches);
