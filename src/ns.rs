//! Destination identity for write operations that may span collections
//! and databases.

use std::fmt;

/// A fully-qualified write destination: a database name, a collection name,
/// and an optional target type name used by query/update mapping.
///
/// Pipeline items capture their namespace **by value** at append time, so
/// repositioning a namespace-aware facade afterwards never retargets an
/// already-appended item.
///
/// ```
/// # use mangrove::ns::Namespace;
/// #
/// let ns = Namespace::new("inventory", "products");
/// assert_eq!(ns.to_string(), "inventory.products");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// The name of the database.
    database: String,
    /// The name of the collection within the database.
    collection: String,
    /// The name of the domain type the destination documents map to, if any.
    target_type: Option<String>,
}

impl Namespace {
    /// Creates a namespace without a target type.
    pub fn new<D, C>(database: D, collection: C) -> Self
        where D: Into<String>,
              C: Into<String>,
    {
        Namespace {
            database: database.into(),
            collection: collection.into(),
            target_type: None,
        }
    }

    /// Creates a namespace carrying a target type name for mapping purposes.
    pub fn with_target_type<D, C, T>(database: D, collection: C, target_type: T) -> Self
        where D: Into<String>,
              C: Into<String>,
              T: Into<String>,
    {
        Namespace {
            database: database.into(),
            collection: collection.into(),
            target_type: Some(target_type.into()),
        }
    }

    /// Returns the same destination with the collection swapped out.
    /// The target type does not travel across collections.
    pub fn in_collection<C: Into<String>>(&self, collection: C) -> Self {
        Namespace::new(self.database.clone(), collection)
    }

    /// Returns the same destination with the database swapped out.
    pub fn in_database<D: Into<String>>(&self, database: D) -> Self {
        Namespace::new(database, self.collection.clone())
    }

    /// The name of the database.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The name of the collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The target type name, if one was attached.
    pub fn target_type(&self) -> Option<&str> {
        self.target_type.as_deref()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}
