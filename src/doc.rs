//! A document is a direct member of a collection.

use serde::Serialize;
use crate::write::{ UpdateModelOptions, ReplaceModelOptions, DeleteModelOptions };

/// Implemented by top-level (direct collection member) documents only.
/// These types always have an associated collection name.
///
/// The `*_options()` statics supply the default per-model options a
/// collection-scoped bulk uses when an operation doesn't override them.
pub trait Doc: Serialize {
    /// The name of the collection within the database.
    const NAME: &'static str;

    /// Options for a (strictly non-upsert) update operation.
    fn update_options() -> UpdateModelOptions {
        Default::default()
    }

    /// Options for upserting. `upsert` is on by default, and the
    /// collection-scoped facade forces it back on even if an override
    /// turns it off.
    fn upsert_options() -> UpdateModelOptions {
        UpdateModelOptions {
            upsert: true,
            ..Default::default()
        }
    }

    /// Options for replacing a whole document.
    fn replace_options() -> ReplaceModelOptions {
        Default::default()
    }

    /// Options for a delete operation.
    fn delete_options() -> DeleteModelOptions {
        Default::default()
    }
}
