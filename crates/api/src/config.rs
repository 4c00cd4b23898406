//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::{Authorization, CoordinatorConfig, DomainConfig, QuotaConfig};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL log; the log is kept in memory when unset
/// - `MAX_CONFLICT_RETRIES`: re-evaluations after a lost append race (default: `3`)
/// - `HOOK_TIMEOUT_MS`: bound on each post-commit hook (default: `5000`)
/// - `PROJECTS_PER_ORG_QUOTA`, `RESOURCES_PER_PROJECT_QUOTA`: unlimited when unset
/// - `ACL_ADMIN_REALM`: enables ACL authorization, granting every permission
///   at the root to the users of this realm
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub max_conflict_retries: u32,
    pub hook_timeout: Duration,
    pub projects_per_org_quota: Option<usize>,
    pub resources_per_project_quota: Option<usize>,
    pub acl_admin_realm: Option<String>,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = var(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT").unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: var("DATABASE_URL"),
            max_conflict_retries: parsed("MAX_CONFLICT_RETRIES")
                .unwrap_or(defaults.max_conflict_retries),
            hook_timeout: parsed("HOOK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.hook_timeout),
            projects_per_org_quota: parsed("PROJECTS_PER_ORG_QUOTA"),
            resources_per_project_quota: parsed("RESOURCES_PER_PROJECT_QUOTA"),
            acl_admin_realm: var("ACL_ADMIN_REALM"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The domain settings these values describe.
    pub fn domain(&self) -> DomainConfig {
        DomainConfig {
            coordinator: CoordinatorConfig {
                max_conflict_retries: self.max_conflict_retries,
                hook_timeout: self.hook_timeout,
                ..Default::default()
            },
            quotas: QuotaConfig {
                projects_per_organization: self.projects_per_org_quota,
                resources_per_project: self.resources_per_project_quota,
            },
            authorization: if self.acl_admin_realm.is_some() {
                Authorization::Acls
            } else {
                Authorization::AllowAll
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let coordinator = CoordinatorConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            max_conflict_retries: coordinator.max_conflict_retries,
            hook_timeout: coordinator.hook_timeout,
            projects_per_org_quota: None,
            resources_per_project_quota: None,
            acl_admin_realm: None,
        }
    }
}
