use common::{AggregateKey, Iri, ProjectRef};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::resources::{ResourceCreatedData, ResourceEvent, ResourceUpdatedData, Resources};
use domain::{DomainEvent, StateCache};
use event_store::{Event, EventLog, InMemoryEventLog, Offset, Revision};
use futures_util::StreamExt;
use projections::{CacheProjection, EventStreamer, ProjectionProcessor, SubscriptionScope};
use serde_json::json;

fn record(key: &AggregateKey, revision: i64, event: &ResourceEvent) -> Event {
    Event::builder()
        .key(key.clone())
        .event_type(event.event_type())
        .revision(Revision::new(revision))
        .payload(event)
        .unwrap()
        .build()
}

/// Populates a log with `n` resources, each created then updated twice.
async fn populate(log: &InMemoryEventLog, n: usize) {
    let project = ProjectRef::unsafe_from("bench", "data").unwrap();
    for i in 0..n {
        let id = Iri::new(format!("https://bench.example/{i}")).unwrap();
        let key = AggregateKey::resource(&project, &id);
        let created = ResourceEvent::ResourceCreated(ResourceCreatedData {
            id,
            project: project.clone(),
            types: Default::default(),
            source: json!({ "n": i }),
        });
        log.append(record(&key, 1, &created), Revision::initial())
            .await
            .unwrap();
        for revision in 2..=3 {
            let updated = ResourceEvent::ResourceUpdated(ResourceUpdatedData {
                types: Default::default(),
                source: json!({ "n": i, "rev": revision }),
            });
            log.append(record(&key, revision, &updated), Revision::new(revision - 1))
                .await
                .unwrap();
        }
    }
}

fn bench_cache_rebuild(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let log = InMemoryEventLog::new();
    rt.block_on(populate(&log, 1000));

    c.bench_function("projections/rebuild_3000_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let cache = StateCache::new();
                let mut processor = ProjectionProcessor::new(log.clone());
                processor.register(Box::new(CacheProjection::<Resources>::new(cache)));
                processor.run_catch_up().await.unwrap();
            });
        });
    });
}

fn bench_project_replay(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let log = InMemoryEventLog::new();
    rt.block_on(populate(&log, 1000));
    let streamer = EventStreamer::new(log);
    let project = ProjectRef::unsafe_from("bench", "data").unwrap();

    c.bench_function("projections/replay_project_3000_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let subscription = streamer.subscribe(
                    SubscriptionScope::Project {
                        project: project.clone(),
                    },
                    Offset::start(),
                );
                let delivered = subscription.take(3000).count().await;
                assert_eq!(delivered, 3000);
            });
        });
    });
}

criterion_group!(benches, bench_cache_rebuild, bench_project_replay);
criterion_main!(benches);
