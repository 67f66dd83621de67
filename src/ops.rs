//! High-level write operations: update, upsert, delete.
//!
//! These traits let callers queue strongly-typed operations on a
//! collection-scoped bulk instead of pasting together ad-hoc filter and
//! update documents at every call site.

use std::fmt::Debug;
use bson::Document;
use crate::{
    doc::Doc,
    write::{ UpdateDefinition, UpdateModelOptions, DeleteModelOptions },
};

/// An update (but not an upsert) operation.
pub trait Update<T: Doc>: Debug {
    /// Filter for restricting documents to update.
    fn filter(&self) -> Document;

    /// The update to perform on matching documents. Either a classic
    /// update operator document or an aggregation-pipeline-shaped update.
    fn update(&self) -> UpdateDefinition;

    /// Options for this update operation.
    fn options() -> UpdateModelOptions {
        T::update_options()
    }
}

/// An upsert (update or insert) operation.
pub trait Upsert<T: Doc>: Debug {
    /// Filter for restricting documents to upsert.
    fn filter(&self) -> Document;

    /// The upsert to perform on matching documents.
    fn upsert(&self) -> UpdateDefinition;

    /// Options for this upsert operation.
    fn options() -> UpdateModelOptions {
        T::upsert_options()
    }
}

/// A deletion / removal operation.
pub trait Delete<T: Doc>: Debug {
    /// Filter for restricting documents to delete.
    fn filter(&self) -> Document;

    /// Options for this deletion operation.
    fn options() -> DeleteModelOptions {
        T::delete_options()
    }
}

/////////////////////////////////////////////
// Blanket and convenience implementations //
/////////////////////////////////////////////

impl<T: Doc> Delete<T> for Document {
    fn filter(&self) -> Document {
        self.clone()
    }
}

impl<T: Doc, U: Update<T>> Update<T> for &U {
    fn filter(&self) -> Document {
        (**self).filter()
    }

    fn update(&self) -> UpdateDefinition {
        (**self).update()
    }

    fn options() -> UpdateModelOptions {
        U::options()
    }
}

impl<T: Doc, U: Upsert<T>> Upsert<T> for &U {
    fn filter(&self) -> Document {
        (**self).filter()
    }

    fn upsert(&self) -> UpdateDefinition {
        (**self).upsert()
    }

    fn options() -> UpdateModelOptions {
        U::options()
    }
}

impl<T: Doc, Q: Delete<T>> Delete<T> for &Q {
    fn filter(&self) -> Document {
        (**self).filter()
    }

    fn options() -> DeleteModelOptions {
        Q::options()
    }
}
