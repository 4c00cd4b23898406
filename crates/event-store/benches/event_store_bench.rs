use common::{Iri, ProjectRef};
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{
    AggregateKey, Event, EventLog, EventLogExt, InMemoryEventLog, Offset, Revision, Tag,
};

fn resource_key(project: &str, n: usize) -> AggregateKey {
    AggregateKey::resource(
        &ProjectRef::unsafe_from("bench", project).unwrap(),
        &Iri::new(format!("https://bench.example/{n}")).unwrap(),
    )
}

fn make_event(key: &AggregateKey, revision: i64) -> Event {
    Event::builder()
        .key(key.clone())
        .event_type("ResourceUpdated")
        .revision(Revision::new(revision))
        .payload_raw(serde_json::json!({ "source": { "n": revision } }))
        .build()
}

/// A log holding `aggregates` resources with `revisions` events each,
/// spread over two projects.
fn populated_log(rt: &tokio::runtime::Runtime, aggregates: usize, revisions: i64) -> InMemoryEventLog {
    let log = InMemoryEventLog::new();
    rt.block_on(async {
        for revision in 1..=revisions {
            for n in 0..aggregates {
                let project = if n % 2 == 0 { "even" } else { "odd" };
                log.append(
                    make_event(&resource_key(project, n), revision),
                    Revision::new(revision - 1),
                )
                .await
                .unwrap();
            }
        }
    });
    log
}

fn bench_append_new_aggregate(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_log/append_new_aggregate", |b| {
        b.iter(|| {
            rt.block_on(async {
                let log = InMemoryEventLog::new();
                log.append_new(make_event(&resource_key("p", 0), 1))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_current_state_100(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let log = populated_log(&rt, 1, 100);
    let key = resource_key("even", 0);

    c.bench_function("event_log/current_state_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                log.current_state(&key, 0i64, |acc, _| Ok(acc + 1))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_state_at_midpoint(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let log = populated_log(&rt, 1, 100);
    let key = resource_key("even", 0);

    c.bench_function("event_log/state_at_50", |b| {
        b.iter(|| {
            rt.block_on(async {
                log.state_at(&key, Revision::new(50), 0i64, |acc, _| Ok(acc + 1))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_replay_project_tag(c: &mut Criterion) {
    use futures_util::StreamExt;

    let rt = tokio::runtime::Runtime::new().unwrap();
    let log = populated_log(&rt, 20, 50);
    let tag = Tag::project(&ProjectRef::unsafe_from("bench", "even").unwrap());

    c.bench_function("event_log/replay_project_500_of_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                let count = log
                    .current_events_by_tag(&tag, Offset::start())
                    .await
                    .unwrap()
                    .count()
                    .await;
                assert_eq!(count, 500);
            });
        });
    });
}

criterion_group!(
    benches,
    bench_append_new_aggregate,
    bench_current_state_100,
    bench_state_at_midpoint,
    bench_replay_project_tag,
);
criterion_main!(benches);
