//! Integration tests for the resource write path.
//!
//! These tests drive the services end to end over the in-memory log and check
//! revisions, tags, point-in-time reads and the cache against a log replay.

mod support;

use std::sync::Arc;

use common::{AggregateKey, Subject};
use domain::resources::{ResourceRef, ResourceRejection, Resources};
use domain::{CommandError, FetchError, fold};
use event_store::{EventLog, EventLogExt, Revision};
use serde_json::json;
use support::*;

fn person() -> common::Iri {
    iri("https://acme.example/people/alice")
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn create_update_tag_deprecate() {
        let services = services();
        let caller = alice();
        with_projects(&services, &["data"], &caller).await;
        let data = project("data");
        let resources = &services.resources;

        let created = resources
            .create(
                &data,
                person(),
                types(&["https://schema.org/Person"]),
                json!({ "name": "Alice" }),
                &caller,
            )
            .await
            .unwrap();
        assert_eq!(created.state.revision, Revision::first());
        assert_eq!(created.state.created_by, caller.subject);

        let updated = resources
            .update(
                &data,
                &person(),
                Revision::new(1),
                types(&["https://schema.org/Person"]),
                json!({ "name": "Alice Smith" }),
                &caller,
            )
            .await
            .unwrap();
        assert_eq!(updated.state.revision, Revision::new(2));

        let tagged = resources
            .tag(
                &data,
                &person(),
                Revision::new(2),
                "v1.0.0".to_string(),
                Revision::new(1),
                &caller,
            )
            .await
            .unwrap();
        assert_eq!(tagged.state.revision, Revision::new(3));
        assert_eq!(tagged.state.tagged("v1.0.0"), Some(Revision::new(1)));

        let deprecated = resources
            .deprecate(&data, &person(), Revision::new(3), &caller)
            .await
            .unwrap();
        assert_eq!(deprecated.state.revision, Revision::new(4));
        assert!(deprecated.state.deprecated);

        let key = AggregateKey::resource(&data, &person());
        let types: Vec<String> = services
            .log
            .events(&key)
            .await
            .unwrap()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(
            types,
            [
                "ResourceCreated",
                "ResourceUpdated",
                "ResourceTagAdded",
                "ResourceDeprecated"
            ]
        );
    }

    #[tokio::test]
    async fn tagged_reference_returns_the_tagged_revision() {
        let services = services();
        let caller = alice();
        with_projects(&services, &["data"], &caller).await;
        let data = project("data");
        let resources = &services.resources;

        resources
            .create(&data, person(), types(&[]), json!({ "v": 1 }), &caller)
            .await
            .unwrap();
        resources
            .update(&data, &person(), Revision::new(1), types(&[]), json!({ "v": 2 }), &caller)
            .await
            .unwrap();
        resources
            .tag(&data, &person(), Revision::new(2), "v1.0.0".into(), Revision::new(1), &caller)
            .await
            .unwrap();
        resources
            .update(&data, &person(), Revision::new(3), types(&[]), json!({ "v": 4 }), &caller)
            .await
            .unwrap();

        let tagged = resources
            .fetch_ref(&data, &ResourceRef::tag(person(), "v1.0.0"))
            .await
            .unwrap();
        assert_eq!(tagged.revision, Revision::new(1));
        assert_eq!(tagged.source, json!({ "v": 1 }));

        let latest = resources
            .fetch_ref(&data, &ResourceRef::latest(person()))
            .await
            .unwrap();
        assert_eq!(latest.revision, Revision::new(4));

        // Point-in-time reads are repeatable.
        let at_two = resources.fetch_at(&data, &person(), Revision::new(2)).await.unwrap();
        let again = resources.fetch_at(&data, &person(), Revision::new(2)).await.unwrap();
        assert_eq!(at_two, again);
        assert_eq!(at_two.source, json!({ "v": 2 }));

        assert!(matches!(
            resources
                .fetch_ref(&data, &ResourceRef::tag(person(), "v9"))
                .await,
            Err(FetchError::TagNotFound { .. })
        ));
        assert!(matches!(
            resources.fetch_at(&data, &person(), Revision::new(9)).await,
            Err(FetchError::RevisionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn cache_matches_log_replay() {
        let services = services();
        let caller = alice();
        with_projects(&services, &["data"], &caller).await;
        let data = project("data");
        let resources = &services.resources;

        resources
            .create(&data, person(), types(&[]), json!({ "n": 0 }), &caller)
            .await
            .unwrap();
        for n in 1..=5 {
            resources
                .update(&data, &person(), Revision::new(n), types(&[]), json!({ "n": n }), &caller)
                .await
                .unwrap();
        }

        let key = AggregateKey::resource(&data, &person());
        let cached = resources.coordinator().cache().get(&key).await.unwrap();
        let (replayed, revision) = services
            .log
            .current_state(&key, None, fold::<Resources>)
            .await
            .unwrap();
        assert_eq!(revision, Revision::new(6));
        assert_eq!(replayed.unwrap(), cached);
    }
}

mod rejections {
    use super::*;

    #[tokio::test]
    async fn stale_revision_appends_nothing() {
        let services = services();
        let caller = alice();
        with_projects(&services, &["data"], &caller).await;
        let data = project("data");

        services
            .resources
            .create(&data, person(), types(&[]), json!({}), &caller)
            .await
            .unwrap();

        let result = services
            .resources
            .update(&data, &person(), Revision::new(5), types(&[]), json!({ "a": 1 }), &caller)
            .await;
        match result {
            Err(CommandError::IncorrectRevision {
                provided, expected, ..
            }) => {
                assert_eq!(provided, Revision::new(5));
                assert_eq!(expected, Revision::new(1));
            }
            other => panic!("expected IncorrectRevision, got {other:?}"),
        }

        let key = AggregateKey::resource(&data, &person());
        assert_eq!(services.log.current_revision(&key).await.unwrap(), Revision::new(1));
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let services = services();
        let caller = alice();
        with_projects(&services, &["data"], &caller).await;
        let data = project("data");

        services
            .resources
            .create(&data, person(), types(&[]), json!({}), &caller)
            .await
            .unwrap();
        let err = services
            .resources
            .create(&data, person(), types(&[]), json!({}), &caller)
            .await
            .unwrap_err();
        assert!(matches!(
            err.rejection(),
            Some(ResourceRejection::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn deprecated_project_rejects_new_resources() {
        let services = services();
        let caller = alice();
        with_projects(&services, &["data"], &caller).await;
        let data = project("data");

        services
            .projects
            .deprecate(&data, Revision::first(), &caller)
            .await
            .unwrap();

        let err = services
            .resources
            .create(&data, person(), types(&[]), json!({}), &caller)
            .await
            .unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&ResourceRejection::ProjectIsDeprecated(data))
        );
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_expected_revision_one_wins() {
        let services = Arc::new(services());
        let caller = alice();
        with_projects(&services, &["data"], &caller).await;
        let data = project("data");

        services
            .resources
            .create(&data, person(), types(&[]), json!({}), &caller)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for n in 0..2 {
            let services = services.clone();
            let data = data.clone();
            let caller = caller.clone();
            handles.push(tokio::spawn(async move {
                services
                    .resources
                    .update(&data, &person(), Revision::first(), types(&[]), json!({ "n": n }), &caller)
                    .await
            }));
        }

        let mut accepted = 0;
        let mut stale = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(committed) => {
                    assert_eq!(committed.state.revision, Revision::new(2));
                    accepted += 1;
                }
                Err(CommandError::IncorrectRevision { .. }) => stale += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((accepted, stale), (1, 1));

        let key = AggregateKey::resource(&data, &person());
        assert_eq!(services.log.current_revision(&key).await.unwrap(), Revision::new(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn revisions_stay_contiguous_under_load() {
        let services = Arc::new(services());
        let caller = alice();
        with_projects(&services, &["data"], &caller).await;
        let data = project("data");
        let key = AggregateKey::resource(&data, &person());

        services
            .resources
            .create(&data, person(), types(&[]), json!({}), &caller)
            .await
            .unwrap();

        // Coordinator commands without an expected revision all go through,
        // one after the other.
        let mut handles = Vec::new();
        for n in 0..20 {
            let services = services.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                services
                    .resources
                    .coordinator()
                    .submit(domain::Command::new(
                        key,
                        domain::ExpectedRevision::Any,
                        Subject::Anonymous,
                        domain::resources::ResourceCommand::Update {
                            types: Default::default(),
                            source: json!({ "n": n }),
                        },
                    ))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let revisions: Vec<i64> = services
            .log
            .events(&key)
            .await
            .unwrap()
            .iter()
            .map(|e| e.revision().as_i64())
            .collect();
        assert_eq!(revisions, (1..=21).collect::<Vec<_>>());
    }
}
