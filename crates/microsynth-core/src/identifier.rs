//! Identifiers for diagram nodes and connections.
//!
//! Ids are opaque strings: they come from persisted snapshots or from the
//! editor's uid generator, and must survive a JSON round trip unchanged.
//! The two newtypes keep node ids and connection ids from being mixed up.

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an id from anything string-like.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

string_id!(
    /// Identity of a node, unique within a graph.
    ///
    /// # Examples
    ///
    /// ```
    /// use microsynth_core::identifier::NodeId;
    ///
    /// let id = NodeId::new("orders");
    /// assert_eq!(id, "orders");
    /// assert_eq!(id.to_string(), "orders");
    /// ```
    NodeId
);

string_id!(
    /// Identity of a connection, unique within a graph.
    ConnectionId
);
