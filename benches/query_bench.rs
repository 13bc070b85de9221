//! Benchmarks for set algebra, snapshots and query evaluation
//!
//! Run with: cargo bench

use cleo::builder::IndexBuilder;
use cleo::config::ServerConfig;
use cleo::index::snapshot::{decode, encode};
use cleo::index::{intersect, union, CompressionType, IndexHandle, MatchupIndex, PostingList};
use cleo::store::{MatchRecord, TeamRecord};
use cleo::{CancelToken, Champion, Query, QueryClient, QueryEngine, QueryServer};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;

/// Deterministic xorshift so runs are comparable
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

fn sparse_list(rng: &mut Rng, len: usize, universe: u32) -> PostingList {
    PostingList::from_unsorted((0..len).map(|_| (rng.next() % universe as u64) as u32).collect())
}

fn synthetic_index(matches: u64) -> MatchupIndex {
    let champions: Vec<u32> = Champion::all().map(|c| u32::from(c.id())).collect();
    let mut rng = Rng(0x5eed);
    let mut builder = IndexBuilder::new().built_at(0).progress_every(0);

    for record_id in 0..matches {
        let mut team = |victory| {
            let picks: Vec<u32> = (0..5).map(|_| champions[rng.below(champions.len())]).collect();
            TeamRecord::with_champions(victory, &picks)
        };
        let teams = vec![team(true), team(false)];
        builder
            .ingest(&MatchRecord::new(record_id, 0, teams))
            .unwrap();
    }

    builder.finish().unwrap().0
}

fn bench_set_algebra(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_algebra");
    let mut rng = Rng(42);

    for size in [1_000, 10_000, 100_000] {
        let a = sparse_list(&mut rng, size, size as u32 * 10);
        let b = sparse_list(&mut rng, size, size as u32 * 10);

        group.throughput(Throughput::Elements((a.len() + b.len()) as u64));

        group.bench_function(format!("intersect_{}", size), |bench| {
            bench.iter(|| intersect(black_box(&a), black_box(&b)))
        });

        group.bench_function(format!("union_{}", size), |bench| {
            bench.iter(|| union(black_box(&a), black_box(&b)))
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    let index = synthetic_index(50_000);

    for compression in [CompressionType::None, CompressionType::Lz4] {
        let bytes = encode(&index, compression).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_function(format!("encode_{:?}", compression), |b| {
            b.iter(|| encode(black_box(&index), compression).unwrap())
        });

        group.bench_function(format!("decode_{:?}", compression), |b| {
            b.iter(|| decode(black_box(&bytes)).unwrap())
        });
    }

    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let engine = QueryEngine::new(Arc::new(synthetic_index(100_000)));
    let cancel = CancelToken::new();

    let thresh = Champion::from_name("thresh");
    let annie = Champion::from_name("annie");
    let jinx = Champion::from_name("jinx");

    let one_vs_one = Query::new([thresh], [annie]);
    let two_vs_one = Query::new([thresh, jinx], [annie]);

    group.bench_function("evaluate_1v1", |b| {
        b.iter(|| engine.evaluate(black_box(&one_vs_one), &cancel).unwrap())
    });

    group.bench_function("evaluate_2v1", |b| {
        b.iter(|| engine.evaluate(black_box(&two_vs_one), &cancel).unwrap())
    });

    group.bench_function("explore_1v1", |b| {
        b.iter(|| engine.explore(black_box(&one_vs_one), &cancel).unwrap())
    });

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("server");

    let client = rt.block_on(async {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let handle = Arc::new(IndexHandle::new(synthetic_index(10_000)));
        let server = QueryServer::bind(config, handle).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        QueryClient::connect(addr).await.unwrap()
    });

    let thresh = Champion::from_name("thresh");
    let annie = Champion::from_name("annie");

    group.bench_function("query_round_trip", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let start = std::time::Instant::now();
                for _ in 0..iters {
                    let _ = client.query(&[thresh], &[annie], false).await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_set_algebra, bench_snapshot, bench_query, bench_round_trip);
criterion_main!(benches);
