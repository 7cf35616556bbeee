//! # Session Benchmarks
//!
//! Per-message cost on the receive path: JSON decode, hex decode and
//! AES-256-GCM open.

use ag_crypto::{AgreementKeyPair, SessionCipher, StaticKeyCipher};
use ag_node::envelope::{decode_frame, Envelope, MessageRecord, WirePayload};
use ag_node::NodeId;
use criterion::{black_box, BenchmarkId, Criterion, Throughput};

fn agreed_pair() -> (StaticKeyCipher, StaticKeyCipher) {
    let a = AgreementKeyPair::generate();
    let b = AgreementKeyPair::generate();
    (
        StaticKeyCipher::from_shared_secret(&a.agree(b.public_key())),
        StaticKeyCipher::from_shared_secret(&b.agree(a.public_key())),
    )
}

pub fn bench_key_agreement(c: &mut Criterion) {
    let local = AgreementKeyPair::generate();
    let remote = AgreementKeyPair::generate();

    c.bench_function("sessions/ecdh_agree", |bench| {
        bench.iter(|| black_box(local.agree(black_box(remote.public_key()))))
    });
}

pub fn bench_encrypt_decrypt(c: &mut Criterion) {
    let (sender, receiver) = agreed_pair();
    let mut group = c.benchmark_group("sessions/aes_gcm");

    for size in [64usize, 1024, 16 * 1024] {
        let plaintext = vec![0x42u8; size];
        let sealed = sender.encrypt(&plaintext).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encrypt", size), &plaintext, |bench, p| {
            bench.iter(|| black_box(sender.encrypt(p).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decrypt", size), &sealed, |bench, s| {
            bench.iter(|| black_box(receiver.decrypt(s).unwrap()))
        });
    }
    group.finish();
}

pub fn bench_message_frame_decode(c: &mut Criterion) {
    let (sender, _) = agreed_pair();
    let payload = sender.encrypt(b"a typical chat message of modest length").unwrap();
    let frame = Envelope::Message(MessageRecord {
        from_id: NodeId::new([7u8; 32]),
        payload: WirePayload::from(&payload),
        timestamp: 1_700_000_000_000,
    })
    .to_bytes()
    .unwrap();

    c.bench_function("sessions/decode_message_frame", |bench| {
        bench.iter(|| black_box(decode_frame(black_box(&frame)).unwrap()))
    });
}

pub fn register_benchmarks(c: &mut Criterion) {
    bench_key_agreement(c);
    bench_encrypt_decrypt(c);
    bench_message_frame_decode(c);
}
