//! Throughput Benchmarks for QuillKV
//!
//! Measures the dict, the skip list, the RESP codec and whole-command
//! execution through the server.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use quillkv::protocol::{encode_cmd, EncodeData, RespParser};
use quillkv::server::{ClientState, Server};
use quillkv::storage::{Dict, Sds, SdsDictType, ZSkipList};

fn sds(s: String) -> Sds {
    Sds::new(s.as_bytes())
}

/// Benchmark dict inserts, including incremental rehash work
fn bench_dict(c: &mut Criterion) {
    let mut group = c.benchmark_group("dict");
    group.throughput(Throughput::Elements(1));

    group.bench_function("insert", |b| {
        let mut dict: Dict<Sds, u64, SdsDictType> = Dict::new(SdsDictType);
        let mut i = 0u64;
        b.iter(|| {
            dict.replace(sds(format!("key:{}", i)), i);
            i += 1;
        });
    });

    let mut dict: Dict<Sds, u64, SdsDictType> = Dict::new(SdsDictType);
    for i in 0..100_000u64 {
        dict.replace(sds(format!("key:{}", i)), i);
    }
    let hits: Vec<Sds> = (0..1000).map(|i| sds(format!("key:{}", i * 97))).collect();
    let misses: Vec<Sds> = (0..1000).map(|i| sds(format!("missing:{}", i))).collect();

    group.bench_function("lookup_existing", |b| {
        let mut i = 0usize;
        b.iter(|| {
            black_box(dict.get(&hits[i % hits.len()]));
            i += 1;
        });
    });

    group.bench_function("lookup_missing", |b| {
        let mut i = 0usize;
        b.iter(|| {
            black_box(dict.get(&misses[i % misses.len()]));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark skip list inserts and rank queries
fn bench_skiplist(c: &mut Criterion) {
    let mut group = c.benchmark_group("zskiplist");
    group.throughput(Throughput::Elements(1));

    group.bench_function("insert", |b| {
        let mut list = ZSkipList::new();
        let mut i = 0u64;
        b.iter(|| {
            list.insert((i % 10_007) as f64, sds(format!("m:{}", i)));
            i += 1;
        });
    });

    let mut list = ZSkipList::new();
    for i in 0..100_000u64 {
        list.insert(i as f64, sds(format!("m:{}", i)));
    }

    group.bench_function("get_rank", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let n = (i * 7919) % 100_000;
            black_box(list.get_rank(n as f64, &sds(format!("m:{}", n))));
            i += 1;
        });
    });

    group.bench_function("get_element_by_rank", |b| {
        let mut i = 0usize;
        b.iter(|| {
            black_box(list.get_element_by_rank((i * 7919) % 100_000));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark RESP encode and decode
fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(1));

    let reply = EncodeData::multi_bulk(
        (0..16)
            .map(|i| EncodeData::bulk(format!("member:{}", i)))
            .collect(),
    );
    group.bench_function("encode_multi_bulk", |b| {
        let mut buf = Vec::with_capacity(512);
        b.iter(|| {
            buf.clear();
            reply.serialize_into(&mut buf);
            black_box(buf.len());
        });
    });

    let wire = encode_cmd("ZADD leaderboard 1500.5 player:4242");
    group.bench_function("decode_command", |b| {
        let mut parser = RespParser::new();
        b.iter(|| {
            black_box(parser.parse_command(black_box(&wire)).ok());
        });
    });

    let mut pipeline = Vec::new();
    for i in 0..100 {
        pipeline.extend(encode_cmd(&format!("SET key:{} value:{}", i, i)));
    }
    group.throughput(Throughput::Elements(100));
    group.bench_function("decode_pipeline_100", |b| {
        let mut parser = RespParser::new();
        b.iter(|| {
            let mut offset = 0;
            while let Ok(Some((args, used))) = parser.parse_command(&pipeline[offset..]) {
                black_box(args);
                offset += used;
            }
        });
    });

    group.finish();
}

/// Benchmark commands executed end to end, without the network
fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute");
    group.throughput(Throughput::Elements(1));

    let cmd = |line: String| -> Vec<Bytes> {
        line.split_whitespace()
            .map(|s| Bytes::copy_from_slice(s.as_bytes()))
            .collect()
    };

    let mut server = Server::new(1);
    let mut client = ClientState::default();
    for i in 0..10_000 {
        server.execute(&mut client, &cmd(format!("SET key:{} value:{}", i, i)));
        server.execute(&mut client, &cmd(format!("ZADD board {} p:{}", i, i)));
    }

    group.bench_function("get", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(server.execute(&mut client, &cmd(format!("GET key:{}", i % 10_000))));
            i += 1;
        });
    });

    group.bench_function("incr", |b| {
        let counter = cmd("INCR counter".to_string());
        b.iter(|| {
            black_box(server.execute(&mut client, &counter));
        });
    });

    group.bench_function("zrange_10", |b| {
        let range = cmd("ZRANGE board 0 9 WITHSCORES".to_string());
        b.iter(|| {
            black_box(server.execute(&mut client, &range));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_dict, bench_skiplist, bench_codec, bench_execute);

criterion_main!(benches);
