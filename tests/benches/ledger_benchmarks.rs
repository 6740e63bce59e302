//! # Sigil Ledger Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | Merkle | root over a full default window (2000 leaves) | < 5ms |
//! | Merkle | proof build + verify | < 1ms |
//! | Canonical | identity of an artifact core | < 50us |
//! | Service | exhale + inhale on in-memory stores | < 5ms |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use sigil_ledger::adapters::{LocalKeySigner, ManualClock};
use sigil_ledger::application::SigilLedgerDependencies;
use sigil_ledger::domain::merkle;
use sigil_ledger::{
    ArtifactCore, LedgerConfig, SendRequest, SigilLedgerApi, SigilLedgerService,
};
use sigil_types::{Amount, Hash};
use std::sync::Arc;
use std::time::Duration;

fn random_leaves(n: usize) -> Vec<Hash> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| Hash::from_bytes(rng.gen())).collect()
}

fn bench_merkle_root(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle-root");
    group.measurement_time(Duration::from_secs(5));

    for size in [16usize, 256, 2000] {
        let leaves = random_leaves(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &leaves, |b, leaves| {
            b.iter(|| merkle::build_root(black_box(leaves)))
        });
    }
    group.finish();
}

fn bench_merkle_proof(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle-proof");
    let leaves = random_leaves(2000);
    let root = merkle::build_root(&leaves);

    group.bench_function("prove-and-verify", |b| {
        let mut index = 0usize;
        b.iter(|| {
            index = (index + 7) % leaves.len();
            let Ok(proof) = merkle::prove(&leaves, index) else {
                return false;
            };
            merkle::verify(black_box(&root), &proof)
        })
    });
    group.finish();
}

fn bench_artifact_identity(c: &mut Criterion) {
    let core = ArtifactCore {
        creation_pulse: 8_472_193,
        beat: 17,
        step_index: 33,
        day_category: "Solhara".to_string(),
    };
    c.bench_function("artifact-identity", |b| b.iter(|| black_box(&core).identity()));
}

fn bench_transfer_cycle(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return;
    };
    let clock = Arc::new(ManualClock::new(1_000));
    let config = LedgerConfig {
        segment_size: 64,
        ..LedgerConfig::default()
    };
    let Ok(service) = SigilLedgerService::new(SigilLedgerDependencies::in_memory(clock), config)
    else {
        return;
    };
    let owner = LocalKeySigner::from_seed([1u8; 32]);
    let receiver = LocalKeySigner::from_seed([2u8; 32]);
    let core = ArtifactCore {
        creation_pulse: 1,
        beat: 0,
        step_index: 0,
        day_category: "Bench".to_string(),
    };
    let base = Amount::from_micro(i64::MAX / 2);
    let Ok(identity) = runtime.block_on(service.issue(core, base, &owner)) else {
        return;
    };
    let artifact = identity.canonical_hash;
    let amount = Amount::from_micro(1);

    c.bench_function("exhale-inhale", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let share = service
                    .exhale(artifact, &owner, SendRequest::new(amount, "bench"))
                    .await;
                if let Ok(share) = share {
                    let _ = service.inhale(&share, &receiver).await;
                }
            })
        })
    });
}

criterion_group!(
    benches,
    bench_merkle_root,
    bench_merkle_proof,
    bench_artifact_identity,
    bench_transfer_cycle
);
criterion_main!(benches);
