//! Benchmarks for edge weighting and proof search.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use dpr_tune::corpus::Query;
use dpr_tune::feature::Feature;
use dpr_tune::prove::dpr::DprProver;
use dpr_tune::prove::graph::{ProofGraph, default_restart_features};
use dpr_tune::prove::{ProofOracle, ThresholdConfig};
use dpr_tune::weight::weighter::FeatureWeighter;
use dpr_tune::weight::{FeatureDictionary, WeightVector};

fn learned_weights(n: usize) -> WeightVector {
    WeightVector::new((0..n).map(|i| {
        let key = format!("rule{i}");
        (Feature::ground("id", &[key.as_str()]), 0.5 + (i % 7) as f64)
    }))
}

fn bench_score_exact(c: &mut Criterion) {
    let weighter = FeatureWeighter::linear(learned_weights(1000));
    let dict: FeatureDictionary = (0..20)
        .map(|i| {
            let key = format!("rule{}", i * 37);
            (Feature::ground("id", &[key.as_str()]), 1.0)
        })
        .collect();

    c.bench_function("score_20_exact", |bench| {
        bench.iter(|| black_box(weighter.score(black_box(&dict))))
    });
}

fn bench_score_patterns(c: &mut Criterion) {
    let weights = WeightVector::new((0..50).map(|i| {
        let functor = format!("rel{i}");
        (Feature::parse(&format!("{functor}(X,Y)")).unwrap(), 0.1 * i as f64)
    }));
    let weighter = FeatureWeighter::linear(weights);
    let dict: FeatureDictionary = (0..20)
        .map(|i| (Feature::parse(&format!("rel{i}(a,b{i})")).unwrap(), 1.0))
        .collect();

    c.bench_function("score_20_patterns", |bench| {
        bench.iter(|| black_box(weighter.score(black_box(&dict))))
    });
}

fn bench_prove_chain(c: &mut Criterion) {
    let mut graph = ProofGraph::new(default_restart_features());
    for i in 0..200 {
        let from = format!("chain(s{i})");
        let to = format!("chain(s{})", i + 1);
        let side = format!("side(s{i})");
        let rule = FeatureDictionary::new().with(Feature::ground("id", &["next"]), 1.0);
        graph.add_edge(&from, &to, rule.clone());
        graph.add_edge(&from, &side, rule);
        graph.mark_solution(&side);
    }
    let weighter = FeatureWeighter::uniform();
    let prover = DprProver::new(&graph, &weighter);
    let config = ThresholdConfig::new(0.1, 1e-5).unwrap();
    let query = Query::new(Feature::ground("chain", &["s0"]));

    c.bench_function("prove_chain_200", |bench| {
        bench.iter(|| black_box(prover.prove_state(&config, &query).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_score_exact,
    bench_score_patterns,
    bench_prove_chain
);
criterion_main!(benches);
