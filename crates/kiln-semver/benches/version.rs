use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kiln_semver::{Version, VersionPredicate};

fn bench_parse_versions(c: &mut Criterion) {
    let versions = [
        "1.2.3",
        "1.2.3-beta.1",
        "2.4.0+build.5",
        "0.14.21",
        "1.20.1-rc.2",
        "22w13a",
        "1.0.0-alpha.beta",
    ];

    c.bench_function("parse_versions", |b| {
        b.iter(|| {
            for version in versions {
                black_box(Version::parse(black_box(version)).ok());
            }
        })
    });
}

fn bench_compare_versions(c: &mut Criterion) {
    let pairs: Vec<(Version, Version)> = [
        ("1.2.3", "1.2.4"),
        ("2.4.0-alpha", "2.4.0"),
        ("1.0", "1.0.0"),
        ("1.20.1", "1.9.0"),
        ("22w13a", "1.18.2"),
    ]
    .iter()
    .map(|(a, b)| (Version::parse(a).unwrap(), Version::parse(b).unwrap()))
    .collect();

    c.bench_function("compare_versions", |b| {
        b.iter(|| {
            for (a, bver) in &pairs {
                black_box(black_box(a).cmp(black_box(bver)));
            }
        })
    });
}

fn bench_predicates(c: &mut Criterion) {
    let predicates = [">=0.14.0", "^1.2 || ~2.4", "1.x", "<=1.20.1", "*"];
    let version = Version::parse("1.19.4").unwrap();

    c.bench_function("parse_and_match_predicates", |b| {
        b.iter(|| {
            for predicate in predicates {
                if let Ok(p) = VersionPredicate::parse(black_box(predicate)) {
                    black_box(p.matches(&version));
                }
            }
        })
    });
}

criterion_group!(benches, bench_parse_versions, bench_compare_versions, bench_predicates);
criterion_main!(benches);
