//! Fixtures shared by the domain integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;

use common::{Caller, Iri, Label, ProjectRef, Subject};
use domain::projects::ProjectFields;
use domain::{DomainConfig, Services};
use event_store::InMemoryEventLog;

pub fn alice() -> Caller {
    Caller::from(Subject::user("alice", "staff"))
}

pub fn acme() -> Label {
    Label::new("acme").unwrap()
}

pub fn project(name: &str) -> ProjectRef {
    ProjectRef::unsafe_from("acme", name).unwrap()
}

pub fn iri(value: &str) -> Iri {
    Iri::new(value).unwrap()
}

pub fn types(values: &[&str]) -> BTreeSet<Iri> {
    values.iter().map(|v| iri(v)).collect()
}

pub fn services() -> Services<InMemoryEventLog> {
    services_with(DomainConfig::default())
}

pub fn services_with(config: DomainConfig) -> Services<InMemoryEventLog> {
    Services::new(InMemoryEventLog::new(), config)
}

/// Creates the `acme` organization and one project per name.
pub async fn with_projects(services: &Services<InMemoryEventLog>, names: &[&str], caller: &Caller) {
    services
        .organizations
        .create(acme(), None, caller)
        .await
        .unwrap();
    for name in names {
        services
            .projects
            .create(project(name), ProjectFields::default(), caller)
            .await
            .unwrap();
    }
}
