//! Frame codec throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vfd_rtu::constants::MAX_READ_REGISTERS;
use vfd_rtu::crc::{append_crc, crc16};
use vfd_rtu::frame;

fn read_response(slave: u8, count: u16) -> Vec<u8> {
    let mut response = vec![slave, 0x03, (count * 2) as u8];
    for i in 0..count {
        response.extend_from_slice(&i.wrapping_mul(257).to_be_bytes());
    }
    append_crc(&mut response);
    response
}

fn benchmark_crc(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc16");

    for size in [8usize, 64, 254].iter() {
        let data: Vec<u8> = (0..*size).map(|i| i as u8).collect();
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| crc16(black_box(data)))
        });
    }

    group.finish();
}

fn benchmark_encode(c: &mut Criterion) {
    c.bench_function("encode_read_holding_registers", |b| {
        b.iter(|| frame::encode_read_holding_registers(black_box(1), 0x3001, 5))
    });
    c.bench_function("encode_write_single_register", |b| {
        b.iter(|| frame::encode_write_single_register(black_box(1), 0x2000, 0x0001))
    });
}

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_read_holding_registers");

    for count in [1u16, 5, MAX_READ_REGISTERS].iter() {
        let response = read_response(1, *count);
        group.throughput(Throughput::Bytes(response.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &response, |b, response| {
            b.iter(|| frame::decode_read_holding_registers(black_box(response), 1, *count))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_crc, benchmark_encode, benchmark_decode);
criterion_main!(benches);
