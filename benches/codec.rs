use criterion::{black_box, criterion_group, criterion_main, Criterion};

// A listing large enough to exercise the whole grammar: notes, waits,
// prefixes, extended opcodes and cross-track branches.
fn sample_listing() -> String {
    let mut listing = String::from("main:\n    alloctrack 3\n    opentrack 1, t1\n");
    for i in 0..256 {
        listing.push_str(&format!("    cn4 {}, {}\n", i % 128, 60 + i % 64));
        listing.push_str("    wait 96\n");
        if i % 16 == 0 {
            listing.push_str("    _tr 16: _r 1, 10: volume 100\n");
            listing.push_str(&format!("    setvar 0, {}\n", i));
        }
    }
    listing.push_str("    jump main\nt1:\n    pan 64\n    tempo 120\n    fin\n");
    listing
}

fn criterion_benchmark(c: &mut Criterion) {
    let listing = sample_listing();
    let file = brseq::parse_text(&listing).unwrap();
    let image = brseq::encode_binary(&file).unwrap();

    c.bench_function("decode-binary", |b| {
        b.iter(|| brseq::decode_binary(black_box(&image)).unwrap())
    });

    c.bench_function("encode-binary", |b| {
        b.iter(|| brseq::encode_binary(black_box(&file)).unwrap())
    });

    c.bench_function("parse-text", |b| {
        b.iter(|| brseq::parse_text(black_box(&listing)).unwrap())
    });

    c.bench_function("format-text", |b| {
        b.iter(|| brseq::format_text(black_box(&file)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
