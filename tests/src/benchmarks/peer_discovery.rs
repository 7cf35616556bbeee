//! # Routing Table Benchmarks
//!
//! - XOR distance: one 32-byte XOR
//! - `add_peer` on a full table: linear scan plus eviction
//! - FIND_NODE handling: sort of at most k peers

use ag_peer_discovery::{
    xor_distance, DhtRequest, DhtService, KademliaConfig, NodeId, PeerDirectory, PeerRecord,
    RoutingTable, SystemTimeSource, Timestamp,
};
use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::net::SocketAddr;
use std::time::Duration;

fn random_id(rng: &mut impl Rng) -> NodeId {
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    NodeId::new(bytes)
}

fn addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

pub fn bench_xor_distance(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let a = random_id(&mut rng);
    let b = random_id(&mut rng);

    c.bench_function("peer-discovery/xor_distance", |bench| {
        bench.iter(|| black_box(xor_distance(black_box(&a), black_box(&b))))
    });
}

pub fn bench_add_peer_with_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("peer-discovery/add_peer");
    group.measurement_time(Duration::from_secs(5));

    for k in [20usize, 100, 500] {
        let mut rng = rand::thread_rng();
        let config = KademliaConfig {
            k,
            ..KademliaConfig::default()
        };
        let mut table = RoutingTable::new(random_id(&mut rng), config).unwrap();
        for _ in 0..k {
            table.add_peer(PeerRecord::new(random_id(&mut rng), addr(), Timestamp::new(1)));
        }

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("full_table", k), &k, |bench, _| {
            bench.iter(|| {
                let peer = PeerRecord::new(random_id(&mut rng), addr(), Timestamp::new(2));
                black_box(table.add_peer(peer))
            })
        });
    }
    group.finish();
}

pub fn bench_find_node(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let mut service = DhtService::new(
        random_id(&mut rng),
        KademliaConfig::default(),
        Box::new(SystemTimeSource::new()),
    )
    .unwrap();
    for _ in 0..20 {
        service.observe_peer(random_id(&mut rng), addr());
    }
    let sender_id = random_id(&mut rng);

    c.bench_function("peer-discovery/find_node", |bench| {
        bench.iter(|| {
            let request = DhtRequest::FindNode {
                sender_id,
                target_id: random_id(&mut rng),
            };
            black_box(service.handle_request(request, addr()))
        })
    });
}

pub fn register_benchmarks(c: &mut Criterion) {
    bench_xor_distance(c);
    bench_add_peer_with_eviction(c);
    bench_find_node(c);
}
