//! The Mangrove prelude provides re-exports of the most commonly used traits
//! and types for convenience, including ones from the `bson` crate.

pub use crate::{
    doc::Doc,
    ns::Namespace,
    bulk::{ Bulk, ClusterBulk },
    pipeline::{
        BulkContext, BulkPipeline, BulkItem, WriteIntent,
        QueryMapper, IdentityMapper,
    },
    write::{
        WriteModel, UpdateDefinition,
        UpdateModelOptions, ReplaceModelOptions, DeleteModelOptions,
        BulkMode, BulkWriteOptions, BulkWriteResult, BulkExecutor,
    },
    event::{ WriteEvent, WriteEventKind, EventSink, CallbackPhase, EntityCallbacks },
    expr::{ MethodReference, ArgumentMap, method_reference },
    ops::*,
    literal::Order,
    bsn::{ serialize_document, serialize_documents },
    error::ErrorExt,
    error::ResultExt,
    error::Error as MangroveError,
    error::ErrorKind as MangroveErrorKind,
    error::Result as MangroveResult,
};
pub use bson::{ Bson, Document, oid::ObjectId, doc, bson, from_bson, to_bson };
