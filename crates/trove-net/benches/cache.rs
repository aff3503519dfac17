use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tokio::time::Instant;
use trove_net::core::ResponseCache;
use trove_net::{FetchSession, SessionOptions, Transport, TransportError, TransportRequest, TransportResponse};

fn bench_cache_insert_with_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_insert");

    for body_len in [256usize, 4 * 1024, 64 * 1024] {
        group.throughput(Throughput::Bytes(body_len as u64));
        group.bench_with_input(BenchmarkId::new("evicting", body_len), &body_len, |b, &body_len| {
            // Budget fits 16 bodies, so steady state evicts on every insert.
            let mut cache = ResponseCache::new(true, 16 * body_len as u64);
            let body = Bytes::from(vec![0u8; body_len]);
            let now = Instant::now();
            let mut i = 0u64;

            b.iter(|| {
                i += 1;
                cache
                    .insert(format!("http://example.com/{i}"), body.clone(), "text/plain", now)
                    .unwrap();
            });
        });
    }

    group.finish();
}

fn bench_cache_lookup(c: &mut Criterion) {
    let mut cache = ResponseCache::new(true, u64::MAX);
    let now = Instant::now();
    for i in 0..1000 {
        cache
            .insert(format!("http://example.com/{i}"), Bytes::from_static(b"body"), "text/plain", now)
            .unwrap();
    }
    let keys: Vec<_> = (0..1000).map(|i| format!("http://example.com/{i}")).collect();

    c.bench_function("cache_lookup_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % keys.len();
            black_box(cache.lookup(&keys[i]).is_some());
        });
    });
}

struct Echo;

impl Transport for Echo {
    async fn perform(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse::ok(request.url.clone(), "text/plain"))
    }
}

fn bench_session_unthrottled(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_fetch");

    for cache_enabled in [false, true] {
        group.bench_with_input(BenchmarkId::new("cache", cache_enabled), &cache_enabled, |b, &cache_enabled| {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let session = FetchSession::new(Echo, SessionOptions::default().cache(cache_enabled, 1024 * 1024));

            b.iter(|| {
                rt.block_on(async {
                    for i in 0..32 {
                        black_box(session.fetch(format!("http://example.com/{i}")).await.unwrap());
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_cache_insert_with_eviction,
    bench_cache_lookup,
    bench_session_unthrottled
);
criterion_main!(benches);
