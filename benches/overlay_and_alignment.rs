use annoview::{
    compose, evaluate, scoring_report, AnnotationSet, Annotator, AnnotatorId, Entity,
    OverlayConfig, Relation, ScoredEntity, ScoringConfig, Span, TypeRef,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pprof::criterion::{Output, PProfProfiler};

const TYPES: [&str; 4] = ["DRUG", "DISEASE", "GENE", "SPECIES"];

/// Annotators sharing the first half of their ids, so that half of the entities collide.
fn build_sets(annotators: usize, entities: usize) -> Vec<AnnotationSet> {
    (0..annotators)
        .map(|a| {
            let creator = format!("user{a}");
            let entities_of_creator: Vec<Entity> = (0..entities)
                .map(|e| {
                    let id = if e < entities / 2 {
                        format!("{e:08}")
                    } else {
                        format!("{a:03}{e:08}")
                    };
                    let begin = e * 10 + a % 3;
                    Entity::new(
                        id.as_str(),
                        creator.as_str(),
                        Span::new(begin, begin + 5),
                        TypeRef::from_id(TYPES[e % TYPES.len()]),
                    )
                })
                .collect();
            let relations = entities_of_creator
                .windows(2)
                .step_by(2)
                .enumerate()
                .map(|(r, pair)| {
                    let id = format!("r{r}");
                    Relation::new(
                        id.as_str(),
                        creator.as_str(),
                        pair[0].id.as_str(),
                        pair[1].id.as_str(),
                        TypeRef::from_id("treats"),
                    )
                })
                .collect();
            let mut set = AnnotationSet::new(Annotator::new(creator.as_str(), creator.as_str()))
                .with_entities(entities_of_creator)
                .with_relations(relations);
            set.sort_entities();
            set
        })
        .collect()
}

fn build_spans(len: usize, shift: usize) -> Vec<ScoredEntity<'static>> {
    (0..len)
        .map(|i| {
            let start = i * 10 + (i % 3) * shift;
            ScoredEntity::new(start, start + 6 + i % 2, TYPES[i % TYPES.len()])
        })
        .collect()
}

fn benchmark_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");
    let config = OverlayConfig::default();
    let user = AnnotatorId::from("user0");
    for (annotators, entities) in [(3, 1_000), (10, 1_000), (10, 10_000)] {
        let sets = build_sets(annotators, entities);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{annotators}x{entities}")),
            &sets,
            |b, sets| b.iter(|| compose(sets, &user, None, &config)),
        );
    }
    group.finish();
}

fn benchmark_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    for len in [1_000, 100_000] {
        let gold = build_spans(len, 0);
        let predicted = build_spans(len, 1);
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| evaluate(&gold, &predicted))
        });
    }
    group.finish();
}

fn benchmark_scoring_report(c: &mut Criterion) {
    let reports: Vec<_> = (0..1_000)
        .map(|d| evaluate(&build_spans(100, 0), &build_spans(100 - d % 50, d % 2)))
        .collect();
    for parallel in [false, true] {
        let config = ScoringConfig {
            parallel,
            ..Default::default()
        };
        c.bench_function(&format!("scoring_report_parallel_{parallel}"), |b| {
            b.iter(|| scoring_report(&reports, &config).unwrap())
        });
    }
}

criterion_group!(
    name=overlay_and_alignment_benches;
    config = Criterion::default().sample_size(50).with_profiler(PProfProfiler::new(3000, Output::Flamegraph(None)));
    targets = benchmark_compose,
    benchmark_evaluate,
    benchmark_scoring_report
);
criterion_main!(overlay_and_alignment_benches);
