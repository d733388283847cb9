use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use regexgen_rs::{
    CompileFlags, GenerationCapability, RegexGenerator, SUGGESTED_PATTERN, generate,
};

const PATTERNS: &[(&str, &str)] = &[
    ("alternation", "a|b|c"),
    ("classes", "[a-z]{3,8}@[a-z]{2,6}\\.(com|org|net)"),
    ("suggestion", SUGGESTED_PATTERN),
];

fn bench_compile(c: &mut Criterion) {
    let generator = RegexGenerator::default().with_seed(1);
    for &(label, pattern) in PATTERNS {
        c.bench_with_input(BenchmarkId::new("compile", label), &pattern, |b, &pattern| {
            b.iter(|| {
                let sampler = generator
                    .compile(pattern, CompileFlags::empty())
                    .expect("bench pattern compiles");
                black_box(sampler);
            });
        });
    }
}

fn bench_generate(c: &mut Criterion) {
    let generator = RegexGenerator::default().with_seed(1);
    const COUNTS: &[usize] = &[1, 100, 1000];
    for &count in COUNTS {
        c.bench_with_input(
            BenchmarkId::new("generate_suggestion", count),
            &count,
            |b, &count| {
                b.iter(|| {
                    let results =
                        generate(&generator, SUGGESTED_PATTERN, CompileFlags::empty(), count)
                            .expect("suggestion compiles");
                    black_box(results.len());
                });
            },
        );
    }
}

fn bench_fold_case(c: &mut Criterion) {
    let generator = RegexGenerator::default().with_seed(1);
    c.bench_function("generate_fold_case::100", |b| {
        b.iter(|| {
            let results = generate(&generator, "[a-z]{16}", CompileFlags::FOLD_CASE, 100)
                .expect("class compiles");
            black_box(results);
        });
    });
}

criterion_group!(benches, bench_compile, bench_generate, bench_fold_case);
criterion_main!(benches);
