use serde::{Deserialize, Serialize};

/// A named permission, e.g. `resources/read`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! permissions {
    ($($module:ident { $($name:ident => $value:literal),* $(,)? })*) => {
        $(
            pub mod $module {
                use super::Permission;
                $(
                    pub fn $name() -> Permission {
                        Permission::new($value)
                    }
                )*
            }
        )*

        /// Every permission checked by the services.
        pub fn all() -> Vec<Permission> {
            vec![$($(Permission::new($value),)*)*]
        }
    };
}

permissions! {
    orgs {
        read => "organizations/read",
        write => "organizations/write",
        create => "organizations/create",
    }
    projects {
        read => "projects/read",
        write => "projects/write",
        create => "projects/create",
    }
    resolvers {
        read => "resolvers/read",
        write => "resolvers/write",
    }
    resources {
        read => "resources/read",
        write => "resources/write",
    }
    acls {
        read => "acls/read",
        write => "acls/write",
    }
}
