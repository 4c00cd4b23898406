//! Integration tests for resolvers and reference resolution.

mod support;

use std::collections::BTreeSet;

use common::permission::{acls, orgs, projects, resolvers, resources};
use common::{Identity, Scope, Subject};
use domain::acls::Acl;
use domain::resolvers::{
    DEFAULT_RESOLVER_ID, FailureReason, IdentityResolution, ResolutionError, ResolverRejection,
    ResolverValue,
};
use domain::resources::ResourceRef;
use domain::{Authorization, DomainConfig};
use event_store::Revision;
use serde_json::json;
use support::*;

fn shared_resource() -> common::Iri {
    iri("https://acme.example/shared/schema")
}

fn cross_project(priority: u32, targets: &[&str], allowed: &[&str]) -> ResolverValue {
    ResolverValue::CrossProject {
        priority,
        projects: targets.iter().map(|p| project(p)).collect(),
        resource_types: types(allowed),
        identities: IdentityResolution::UseCurrentCaller,
    }
}

#[tokio::test]
async fn projects_get_a_default_resolver() {
    let services = services();
    let caller = alice();
    with_projects(&services, &["data"], &caller).await;

    let created = services
        .projects
        .fetch(&project("data"))
        .await
        .unwrap();
    assert_eq!(created.revision, Revision::first());

    let resolver = services
        .resolvers
        .fetch(&project("data"), &iri(DEFAULT_RESOLVER_ID))
        .await
        .unwrap();
    assert_eq!(resolver.value, ResolverValue::InProject { priority: 1 });
}

#[tokio::test]
async fn priorities_are_unique_per_project() {
    let services = services();
    let caller = alice();
    with_projects(&services, &["data", "shared"], &caller).await;

    let err = services
        .resolvers
        .create(
            &project("data"),
            iri("https://acme.example/resolvers/shared"),
            cross_project(1, &["shared"], &[]),
            &caller,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err.rejection(),
        Some(ResolverRejection::PriorityAlreadyExists { priority: 1, .. })
    ));
}

#[tokio::test]
async fn resolves_through_cross_project_resolver_with_report() {
    let services = services();
    let caller = alice();
    with_projects(&services, &["data", "other", "shared"], &caller).await;

    services
        .resources
        .create(
            &project("shared"),
            shared_resource(),
            types(&["https://schema.org/Dataset"]),
            json!({ "title": "shared" }),
            &caller,
        )
        .await
        .unwrap();
    services
        .resolvers
        .create(
            &project("data"),
            iri("https://acme.example/resolvers/shared"),
            cross_project(10, &["other", "shared"], &[]),
            &caller,
        )
        .await
        .unwrap();

    let resolved = services
        .resolution
        .resolve(&project("data"), &ResourceRef::latest(shared_resource()), &caller)
        .await
        .unwrap();

    assert_eq!(resolved.project, project("shared"));
    assert_eq!(resolved.resolver, "https://acme.example/resolvers/shared");
    assert_eq!(resolved.resource.id, shared_resource());

    let attempts = &resolved.report.attempts;
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].resolver, DEFAULT_RESOLVER_ID);
    assert_eq!(attempts[0].failures[0].project, project("data"));
    assert_eq!(attempts[0].failures[0].reason, FailureReason::NotFound);
    assert_eq!(attempts[1].failures[0].project, project("other"));
}

#[tokio::test]
async fn in_project_resource_wins_over_cross_project() {
    let services = services();
    let caller = alice();
    with_projects(&services, &["data", "shared"], &caller).await;

    for target in ["data", "shared"] {
        services
            .resources
            .create(&project(target), shared_resource(), types(&[]), json!({ "in": target }), &caller)
            .await
            .unwrap();
    }
    services
        .resolvers
        .create(
            &project("data"),
            iri("https://acme.example/resolvers/shared"),
            cross_project(10, &["shared"], &[]),
            &caller,
        )
        .await
        .unwrap();

    let resolved = services
        .resolution
        .resolve(&project("data"), &ResourceRef::latest(shared_resource()), &caller)
        .await
        .unwrap();
    assert_eq!(resolved.project, project("data"));
    assert!(resolved.report.attempts.is_empty());
}

#[tokio::test]
async fn excluded_types_are_reported() {
    let services = services();
    let caller = alice();
    with_projects(&services, &["data", "shared"], &caller).await;

    services
        .resources
        .create(
            &project("shared"),
            shared_resource(),
            types(&["https://schema.org/Person"]),
            json!({}),
            &caller,
        )
        .await
        .unwrap();
    services
        .resolvers
        .create(
            &project("data"),
            iri("https://acme.example/resolvers/datasets"),
            cross_project(5, &["shared"], &["https://schema.org/Dataset"]),
            &caller,
        )
        .await
        .unwrap();

    let err = services
        .resolution
        .resolve(&project("data"), &ResourceRef::latest(shared_resource()), &caller)
        .await
        .unwrap_err();
    let report = match err {
        ResolutionError::NotResolved { report, .. } => report,
        other => panic!("expected a resolution report, got {other}"),
    };
    assert_eq!(report.attempts.len(), 2);
    assert_eq!(
        report.attempts[1].failures[0].reason,
        FailureReason::TypeExcluded {
            types: types(&["https://schema.org/Person"])
        }
    );
}

#[tokio::test]
async fn tagged_reference_resolves_the_tagged_revision() {
    let services = services();
    let caller = alice();
    with_projects(&services, &["data", "shared"], &caller).await;
    let shared = project("shared");
    let r = &services.resources;

    r.create(&shared, shared_resource(), types(&[]), json!({ "v": 1 }), &caller)
        .await
        .unwrap();
    r.update(&shared, &shared_resource(), Revision::new(1), types(&[]), json!({ "v": 2 }), &caller)
        .await
        .unwrap();
    r.tag(&shared, &shared_resource(), Revision::new(2), "v1.0.0".into(), Revision::new(1), &caller)
        .await
        .unwrap();
    r.update(&shared, &shared_resource(), Revision::new(3), types(&[]), json!({ "v": 4 }), &caller)
        .await
        .unwrap();
    services
        .resolvers
        .create(
            &project("data"),
            iri("https://acme.example/resolvers/shared"),
            cross_project(10, &["shared"], &[]),
            &caller,
        )
        .await
        .unwrap();

    let resolved = services
        .resolution
        .resolve(
            &project("data"),
            &ResourceRef::tag(shared_resource(), "v1.0.0"),
            &caller,
        )
        .await
        .unwrap();
    assert_eq!(resolved.resource.revision, Revision::new(1));
    assert_eq!(resolved.resource.source, json!({ "v": 1 }));
}

#[tokio::test]
async fn unauthorized_projects_are_reported_without_lookup() {
    let services = services_with(DomainConfig {
        authorization: Authorization::Acls,
        ..Default::default()
    });
    let caller = alice();
    let staff = Identity::Authenticated {
        realm: "staff".into(),
    };
    let service = Identity::Authenticated {
        realm: "service".into(),
    };

    services
        .acls
        .provision(
            &Scope::Root,
            Acl::new().grant(
                staff.clone(),
                [
                    orgs::create(),
                    projects::create(),
                    projects::write(),
                    resolvers::write(),
                    resources::write(),
                    acls::write(),
                ],
            ),
            Subject::Anonymous,
        )
        .await
        .unwrap();
    with_projects(&services, &["data", "shared"], &caller).await;

    services
        .acls
        .append(
            &Scope::Project(project("data")),
            Revision::initial(),
            Acl::new().grant(staff, [resources::read()]),
            &caller,
        )
        .await
        .unwrap();
    services
        .acls
        .append(
            &Scope::Project(project("shared")),
            Revision::initial(),
            Acl::new().grant(service.clone(), [resources::read()]),
            &caller,
        )
        .await
        .unwrap();
    services
        .resources
        .create(&project("shared"), shared_resource(), types(&[]), json!({}), &caller)
        .await
        .unwrap();

    services
        .resolvers
        .create(
            &project("data"),
            iri("https://acme.example/resolvers/as-caller"),
            cross_project(10, &["shared"], &[]),
            &caller,
        )
        .await
        .unwrap();

    let err = services
        .resolution
        .resolve(&project("data"), &ResourceRef::latest(shared_resource()), &caller)
        .await
        .unwrap_err();
    let report = match err {
        ResolutionError::NotResolved { report, .. } => report,
        other => panic!("expected a resolution report, got {other}"),
    };
    assert_eq!(
        report.attempts[1].failures[0].reason,
        FailureReason::Unauthorized {
            permission: resources::read()
        }
    );

    services
        .resolvers
        .create(
            &project("data"),
            iri("https://acme.example/resolvers/as-service"),
            ResolverValue::CrossProject {
                priority: 20,
                projects: vec![project("shared")],
                resource_types: BTreeSet::new(),
                identities: IdentityResolution::ProvidedIdentities {
                    identities: BTreeSet::from([service]),
                },
            },
            &caller,
        )
        .await
        .unwrap();

    let resolved = services
        .resolution
        .resolve(&project("data"), &ResourceRef::latest(shared_resource()), &caller)
        .await
        .unwrap();
    assert_eq!(resolved.resolver, "https://acme.example/resolvers/as-service");
    assert_eq!(resolved.report.attempts.len(), 2);
}
