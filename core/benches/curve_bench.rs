// Curve, hash and signature benchmarks for Starkline.
//
// Covers the Pedersen pair hash and chain hash at a few lengths, fixed-base
// multiplication through the ladder, deterministic signing, verification,
// and hashing plus signing a full invoke transaction.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use starkline_core::crypto::{Felt, PrivateKey, Rfc6979, Scalar, StarkCurve, StarkKeypair};
use starkline_core::transaction::{sign_transaction, Call, InvokeTransactionBuilder};

fn curve() -> StarkCurve {
    StarkCurve::shared().expect("embedded curve constants")
}

fn keypair(curve: &StarkCurve) -> StarkKeypair {
    StarkKeypair::new(
        curve.clone(),
        PrivateKey::from_hex("0x3c1e9550e66958296d11b60f8e8e7a7ad990d07fa65d5f7652c4a6c87d4e3cc")
            .expect("valid private key"),
    )
}

fn bench_pedersen_pair(c: &mut Criterion) {
    let curve = curve();
    let a = Felt::from_hex("0x3d937c035c878245caf64531a5756109c53068da139362728feb561405371cb")
        .expect("felt");
    let b = Felt::from_hex("0x208a0a10250e382e1e4bbe2880906c2791bf6275695e02fbbc6aeff9cd8b31a")
        .expect("felt");

    c.bench_function("pedersen/pair", |bench| {
        bench.iter(|| curve.pedersen_pair(&a, &b));
    });
}

fn bench_pedersen_hash(c: &mut Criterion) {
    let curve = curve();
    let mut group = c.benchmark_group("pedersen/hash_on_elements");

    for len in [1usize, 8, 32] {
        let elements: Vec<Felt> = (0..len as u64).map(Felt::from).collect();
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &elements, |bench, els| {
            bench.iter(|| curve.pedersen_hash(els));
        });
    }

    group.finish();
}

fn bench_mul_generator(c: &mut Criterion) {
    let curve = curve();
    let k = Scalar::from_bytes_be_mod_order(&[0xa5; 32]);

    c.bench_function("curve/mul_generator", |bench| {
        bench.iter(|| curve.mul_generator(&k));
    });
}

fn bench_sign(c: &mut Criterion) {
    let curve = curve();
    let keypair = keypair(&curve);
    let hash = curve.pedersen_hash(&[Felt::from(42u64)]);

    c.bench_function("ecdsa/sign_rfc6979", |bench| {
        bench.iter(|| keypair.sign(&hash).expect("signable hash"));
    });
}

fn bench_verify(c: &mut Criterion) {
    let curve = curve();
    let keypair = keypair(&curve);
    let hash = curve.pedersen_hash(&[Felt::from(42u64)]);
    let signature = keypair.sign(&hash).expect("signable hash");

    c.bench_function("ecdsa/verify", |bench| {
        bench.iter(|| keypair.verify(&hash, &signature));
    });
}

fn bench_sign_transaction(c: &mut Criterion) {
    let curve = curve();
    let keypair = keypair(&curve);
    let chain_id = Felt::from_short_string("SN_GOERLI").expect("short string");
    let contract = Felt::from(0xc0c0u64);

    c.bench_function("transaction/hash_and_sign", |bench| {
        bench.iter(|| {
            let tx = InvokeTransactionBuilder::new(Felt::from(0xaccu64), chain_id)
                .call(Call::by_name(contract, "increment", vec![Felt::one()]))
                .call(Call::by_name(contract, "get_count", vec![]))
                .nonce(Felt::from(7u64))
                .max_fee(Felt::from(1_000_000u64))
                .build();
            sign_transaction(tx, &keypair, &mut Rfc6979)
                .expect("signable transaction")
        });
    });
}

criterion_group!(
    benches,
    bench_pedersen_pair,
    bench_pedersen_hash,
    bench_mul_generator,
    bench_sign,
    bench_verify,
    bench_sign_transaction,
);
criterion_main!(benches);
