use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hcache::{
    Address, BlobCodec, Body, ContentType, Envelope, Freshness, HcacheConfigBuilder, Header,
    HeaderCache, Parameter,
};
use tempfile::TempDir;

fn sample_header(parts: usize) -> Header {
    let mut envelope = Envelope {
        from: vec![Address::new(Some("Benchmark Sender"), "bench@example.org")],
        to: (0..5)
            .map(|i| Address::new(None, &format!("rcpt{i}@example.org")))
            .collect(),
        message_id: Some("<bench@example.org>".to_string()),
        references: (0..10).map(|i| format!("<ref{i}@example.org>")).collect(),
        ..Envelope::default()
    };
    envelope.set_subject("Re: [bench] encoding throughput");

    Header {
        lines: 300,
        envelope: Some(envelope),
        content: Some(Body {
            content_type: ContentType::Multipart,
            subtype: Some("mixed".to_string()),
            parameters: vec![Parameter::new("boundary", "----=_bench")],
            parts: (0..parts)
                .map(|i| Body {
                    subtype: Some("plain".to_string()),
                    filename: Some(format!("part{i}.txt")),
                    ..Body::default()
                })
                .collect(),
            ..Body::default()
        }),
        ..Header::default()
    }
}

fn benchmark_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("BlobCodec");
    let codec = BlobCodec::new();

    for parts in [1, 16] {
        let header = sample_header(parts);
        let blob = codec.encode(&header, Freshness::Marker(1)).unwrap();

        group.bench_function(format!("encode_{parts}_parts"), |b| {
            b.iter(|| codec.encode(black_box(&header), Freshness::Marker(1)))
        });

        group.bench_function(format!("decode_{parts}_parts"), |b| {
            b.iter(|| codec.decode(b"bench", black_box(&blob)))
        });
    }

    group.finish();
}

fn benchmark_backends(c: &mut Criterion) {
    let mut group = c.benchmark_group("HeaderCache");
    let header = sample_header(4);

    for backend in hcache::available_backends() {
        let temp_dir = TempDir::new().unwrap();
        let config = HcacheConfigBuilder::new()
            .with_backend(backend)
            .with_map_size(64 * 1024 * 1024)
            .build();
        let mut cache =
            HeaderCache::try_open(temp_dir.path().join("bench"), "Inbox", None, &config).unwrap();
        cache.store(b"hot", &header, Freshness::Marker(1)).unwrap();

        group.bench_function(format!("{backend}_fetch"), |b| {
            b.iter(|| black_box(cache.fetch(b"hot")))
        });

        group.bench_function(format!("{backend}_store"), |b| {
            b.iter(|| cache.store(b"cold", black_box(&header), Freshness::Marker(2)))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_codec, benchmark_backends);
criterion_main!(benches);
