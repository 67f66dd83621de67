//! Wire-level write models and the execution seam.
//!
//! A [`WriteModel`](enum.WriteModel.html) is the fully-materialized, mapped
//! form of one queued write intent, ready to be handed to whatever executes
//! the actual bulk write. Mangrove itself never talks to the network; the
//! [`BulkExecutor`](trait.BulkExecutor.html) trait is the seam behind which
//! a driver (blocking or reactive) lives.

use bson::{ Bson, Document };
use serde_derive::{ Serialize, Deserialize };
use crate::{
    ns::Namespace,
    error::Result,
};

/// The change requested by an update operation: either a classic update
/// operator document (`{ "$set": ... }`) or an aggregation-pipeline-shaped
/// update (an ordered array of pipeline stages).
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateDefinition {
    /// A classic update operator document.
    Document(Document),
    /// An aggregation pipeline update: the stages are applied in order.
    Pipeline(Vec<Document>),
}

impl UpdateDefinition {
    /// Whether this update is aggregation-pipeline-shaped.
    pub fn is_pipeline(&self) -> bool {
        match *self {
            UpdateDefinition::Document(_) => false,
            UpdateDefinition::Pipeline(_) => true,
        }
    }

    /// The wire form of the update: a document or an array of stages.
    pub fn to_bson(&self) -> Bson {
        match *self {
            UpdateDefinition::Document(ref doc) => Bson::Document(doc.clone()),
            UpdateDefinition::Pipeline(ref stages) => Bson::Array(
                stages.iter().cloned().map(Bson::Document).collect()
            ),
        }
    }
}

impl From<Document> for UpdateDefinition {
    fn from(doc: Document) -> Self {
        UpdateDefinition::Document(doc)
    }
}

impl From<Vec<Document>> for UpdateDefinition {
    fn from(stages: Vec<Document>) -> Self {
        UpdateDefinition::Pipeline(stages)
    }
}

/// Options threaded through, unchanged, from an update intent into the
/// generated write model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateModelOptions {
    /// Insert a new document if the filter matches nothing.
    pub upsert: bool,
    /// Filters selecting the array elements positional operators act on.
    pub array_filters: Option<Vec<Document>>,
    /// Collation rules for the filter.
    pub collation: Option<Document>,
    /// Which matching document to update first, when several match.
    pub sort: Option<Document>,
    /// Index hint for the filter.
    pub hint: Option<Bson>,
}

/// Options threaded into a replace write model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplaceModelOptions {
    /// Insert the replacement if the filter matches nothing.
    pub upsert: bool,
    /// Collation rules for the filter.
    pub collation: Option<Document>,
    /// Which matching document to replace, when several match.
    pub sort: Option<Document>,
    /// Index hint for the filter.
    pub hint: Option<Bson>,
}

/// Options threaded into a delete write model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteModelOptions {
    /// Collation rules for the filter.
    pub collation: Option<Document>,
    /// Index hint for the filter.
    pub hint: Option<Bson>,
}

/// One wire-ready write operation, targeting exactly one namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    /// Insert one document.
    InsertOne {
        /// Where the document is headed.
        namespace: Namespace,
        /// The mapped, wire-ready document.
        document: Document,
    },
    /// Update the first document matching the filter.
    UpdateOne {
        /// Where the update applies.
        namespace: Namespace,
        /// The mapped filter.
        filter: Document,
        /// The mapped update definition.
        update: UpdateDefinition,
        /// Caller-supplied update options, passed through unchanged.
        options: UpdateModelOptions,
    },
    /// Update every document matching the filter.
    UpdateMany {
        /// Where the update applies.
        namespace: Namespace,
        /// The mapped filter.
        filter: Document,
        /// The mapped update definition.
        update: UpdateDefinition,
        /// Caller-supplied update options, passed through unchanged.
        options: UpdateModelOptions,
    },
    /// Replace the first document matching the filter wholesale.
    ReplaceOne {
        /// Where the replacement applies.
        namespace: Namespace,
        /// The mapped filter.
        filter: Document,
        /// The mapped, wire-ready replacement document.
        replacement: Document,
        /// Caller-supplied replace options, passed through unchanged.
        options: ReplaceModelOptions,
    },
    /// Delete every document matching the filter. Single-document removal
    /// is expressed through the uniqueness of the filter, not through a
    /// separate model kind.
    DeleteMany {
        /// Where the deletion applies.
        namespace: Namespace,
        /// The mapped filter.
        filter: Document,
        /// Caller-supplied delete options, passed through unchanged.
        options: DeleteModelOptions,
    },
}

impl WriteModel {
    /// The namespace this model targets.
    pub fn namespace(&self) -> &Namespace {
        match *self {
            WriteModel::InsertOne { ref namespace, .. }
            | WriteModel::UpdateOne { ref namespace, .. }
            | WriteModel::UpdateMany { ref namespace, .. }
            | WriteModel::ReplaceOne { ref namespace, .. }
            | WriteModel::DeleteMany { ref namespace, .. } => namespace,
        }
    }
}

/// Whether a bulk write stops at the first failed operation or keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulkMode {
    /// Operations execute in append order; the first failure stops the batch.
    Ordered,
    /// Operations may be reordered and failures don't stop the batch.
    Unordered,
}

/// Bulk writes are ordered unless requested otherwise.
impl Default for BulkMode {
    fn default() -> Self {
        BulkMode::Ordered
    }
}

/// Options for one bulk write round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BulkWriteOptions {
    /// Whether the operations execute in order. See [`BulkMode`](enum.BulkMode.html).
    pub ordered: bool,
}

impl From<BulkMode> for BulkWriteOptions {
    fn from(mode: BulkMode) -> Self {
        BulkWriteOptions {
            ordered: match mode {
                BulkMode::Ordered => true,
                BulkMode::Unordered => false,
            },
        }
    }
}

/// The summary a successful bulk write execution reports back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BulkWriteResult {
    /// The number of inserted documents.
    pub inserted_count: u64,
    /// The number of documents matched by update and replace filters.
    pub matched_count: u64,
    /// The number of documents actually modified.
    pub modified_count: u64,
    /// The number of deleted documents.
    pub deleted_count: u64,
    /// The number of upserted documents.
    pub upserted_count: u64,
}

/// The write-execution collaborator: takes the ordered list of wire-level
/// models and performs the actual bulk write.
///
/// Implementations sit on top of a concrete driver and are expected to
/// translate driver failures into [`Error`](../error/struct.Error.html)s
/// with kind `BulkWriteFailure`. Partial-failure semantics (ordered bulks
/// stopping at the first error, unordered ones continuing) are entirely the
/// executor's business; the pipeline never reinterprets them.
pub trait BulkExecutor {
    /// Executes one bulk write and reports the summary.
    fn execute(&self, models: Vec<WriteModel>, options: BulkWriteOptions) -> Result<BulkWriteResult>;
}
