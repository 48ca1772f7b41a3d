//! Strongly typed identifiers handed around by the lineage collaborators.
//!
//! The core never interprets an id beyond equality; the wrappers only keep
//! the different id spaces from being mixed up and reject empty values.

/// Define a non-empty, opaque string identifier.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        #[serde(transparent)]
        $vis struct $Name(String);

        impl<'de> serde::Deserialize<'de> for $Name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $Name::try_new(s).ok_or_else(|| {
                    serde::de::Error::custom(concat!(stringify!($Name), " must not be empty"))
                })
            }
        }

        impl $Name {
            /// Wrap an existing id, returning `None` if it is empty.
            pub fn try_new(id: impl Into<String>) -> Option<Self> {
                let s = id.into();
                if s.is_empty() { None } else { Some(Self(s)) }
            }

            /// Mint a fresh random id.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().simple().to_string())
            }

            /// Borrow the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str { &self.0 }
        }

        impl TryFrom<&str> for $Name {
            type Error = crate::error::CoreError;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::try_new(s).ok_or_else(|| crate::error::CoreError::EmptyName {
                    context: stringify!($Name).to_string(),
                })
            }
        }
    };
}

define_id! {
    /// Identifier of one lineage run.
    pub struct LineageId;
}

define_id! {
    /// Identifier of the organization owning a lineage run.
    pub struct OrganizationId;
}

define_id! {
    /// Identifier of a warehouse object (materialization, column, dashboard)
    /// or of a dependency edge.
    pub struct ResourceId;
}
