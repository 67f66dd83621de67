//! The bulk operation pipeline: a uniform three-phase lifecycle over a
//! heterogeneous sequence of queued write intents.
//!
//! Every item starts out *unmapped*, carrying exactly what the caller
//! supplied. Appending it to a [`BulkPipeline`](struct.BulkPipeline.html)
//! eagerly runs its map transform against the shared
//! [`BulkContext`](struct.BulkContext.html), storing the *mapped* result.
//! [`models()`](struct.BulkPipeline.html#method.models) then materializes
//! one [`WriteModel`](../write/enum.WriteModel.html) per item, firing the
//! "before save" hooks and advancing document-carrying items to their
//! *prepared* state, which holds the document exactly as handed to the
//! write. [`post_process()`](struct.BulkPipeline.html#method.post_process)
//! runs the "after save" hooks once the write went through, with that
//! written document.
//!
//! Phase transforms never mutate the item they are called on; they return a
//! new instance. A `BulkPipeline` is **not** thread-safe: confine one
//! pipeline (and its owning facade) to one logical operation sequence.

use std::fmt;
use bson::Document;
use crate::{
    ns::Namespace,
    event::{ WriteEvent, WriteEventKind, EventSink, CallbackPhase, EntityCallbacks },
    write::{
        WriteModel,
        UpdateDefinition,
        UpdateModelOptions,
        ReplaceModelOptions,
        DeleteModelOptions,
    },
    error::{ Error, ErrorKind, Result },
};

/// The query/update mapping collaborator: turns logical filters and update
/// definitions into their wire-ready forms for a given target type.
pub trait QueryMapper {
    /// Maps a logical filter document against an optional target type.
    fn map_query(&self, query: Document, target_type: Option<&str>) -> Result<Document>;

    /// Maps a logical update definition against an optional target type.
    fn map_update(&self, update: UpdateDefinition, target_type: Option<&str>) -> Result<UpdateDefinition>;
}

/// The do-nothing mapper: filters and updates are already wire-shaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl QueryMapper for IdentityMapper {
    fn map_query(&self, query: Document, _target_type: Option<&str>) -> Result<Document> {
        Ok(query)
    }

    fn map_update(&self, update: UpdateDefinition, _target_type: Option<&str>) -> Result<UpdateDefinition> {
        Ok(update)
    }
}

/// Per-pipeline shared configuration: database identity, mapping facilities,
/// and the optional event/callback collaborators. Shared by reference across
/// all items of one pipeline; read-mostly during the map and prepare phases.
pub struct BulkContext {
    /// The database this pipeline's default namespace lives in.
    database: String,
    /// The query/update mapping collaborator.
    mapper: Box<dyn QueryMapper>,
    /// The event-publishing collaborator, if configured.
    events: Option<Box<dyn EventSink>>,
    /// The entity-callback collaborator, if configured.
    callbacks: Option<Box<dyn EntityCallbacks>>,
}

impl BulkContext {
    /// Creates a context with the identity mapper and no optional
    /// collaborators.
    pub fn new<D: Into<String>>(database: D) -> Self {
        BulkContext {
            database: database.into(),
            mapper: Box::new(IdentityMapper),
            events: None,
            callbacks: None,
        }
    }

    /// Replaces the query/update mapper.
    pub fn with_mapper(mut self, mapper: Box<dyn QueryMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    /// Attaches an event-publishing collaborator.
    pub fn with_event_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Attaches an entity-callback collaborator.
    pub fn with_callbacks(mut self, callbacks: Box<dyn EntityCallbacks>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    /// The database this context is bound to.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Publishes a lifecycle event if a sink is configured. Absence of a
    /// sink is a valid, cheaply-checked state, not an error.
    fn publish(&self, kind: WriteEventKind, namespace: &Namespace, document: Option<&Document>) {
        if let Some(sink) = self.events.as_deref() {
            sink.publish(WriteEvent { kind, namespace, document });
        }
    }

    /// Runs the entity callbacks for `phase` if any are configured,
    /// returning the (possibly rewritten) document.
    fn invoke(&self, phase: CallbackPhase, document: Document, namespace: &Namespace) -> Result<Document> {
        match self.callbacks.as_deref() {
            Some(callbacks) => callbacks.invoke(phase, document, namespace),
            None => Ok(document),
        }
    }

    /// Maps a filter for the given destination.
    fn map_query(&self, query: Document, namespace: &Namespace) -> Result<Document> {
        self.mapper.map_query(query, namespace.target_type())
    }

    /// Maps an update definition for the given destination.
    fn map_update(&self, update: UpdateDefinition, namespace: &Namespace) -> Result<UpdateDefinition> {
        self.mapper.map_update(update, namespace.target_type())
    }
}

impl fmt::Debug for BulkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkContext")
            .field("database", &self.database)
            .field("events", &self.events.is_some())
            .field("callbacks", &self.callbacks.is_some())
            .finish()
    }
}

/// The error every phase transform raises when it is invoked on an item
/// that hasn't reached the phase it depends on.
fn illegal_state(item: &'static str, wanted: &'static str) -> Error {
    Error::new(
        ErrorKind::IllegalState,
        format!("{} item must be {} first", item, wanted),
    )
}

/// The capability shared by every queued write intent: the three-phase
/// lifecycle driven by the pipeline.
///
/// All three transforms take `&self` and leave the receiver untouched;
/// `mapped` returns the next-phase instance.
pub trait BulkItem: Sized {
    /// The map-phase transform: resolves the item's payload into its
    /// wire-ready form using the shared context. Idempotent: mapping an
    /// already-mapped item returns a plain copy without re-firing hooks.
    fn mapped(&self, ctx: &BulkContext) -> Result<Self>;

    /// The prepare-for-write transform: fires the "before write" hooks and
    /// materializes the wire-level write model, returning it together with
    /// the prepared next-phase item so finish hooks later observe the
    /// document that was actually written. Errs with `IllegalState` if the
    /// item was never mapped.
    fn prepare(&self, ctx: &BulkContext) -> Result<(Self, WriteModel)>;

    /// The finish hook: fires the "after write" hooks. Must only run after
    /// the prepare phase, once the underlying write actually succeeded;
    /// errs with `IllegalState` otherwise.
    fn finish(&self, ctx: &BulkContext) -> Result<()>;

    /// The destination this item captured at construction time.
    fn namespace(&self) -> &Namespace;
}

/// A queued insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertItem {
    /// As appended: the serialized source object, not yet through the
    /// convert hooks.
    Unmapped {
        /// The captured destination.
        namespace: Namespace,
        /// The source object in document form.
        source: Document,
    },
    /// After the map phase: the wire-ready document.
    Mapped {
        /// The captured destination.
        namespace: Namespace,
        /// The converted, wire-ready document.
        document: Document,
    },
    /// After the prepare phase: the document exactly as handed to the
    /// write, before-save rewrites included.
    Prepared {
        /// The captured destination.
        namespace: Namespace,
        /// The written document.
        document: Document,
    },
}

impl InsertItem {
    /// Creates an unmapped insert intent.
    pub fn new(namespace: Namespace, source: Document) -> Self {
        InsertItem::Unmapped { namespace, source }
    }

    /// Whether the map phase already ran.
    pub fn is_mapped(&self) -> bool {
        match *self {
            InsertItem::Unmapped { .. } => false,
            InsertItem::Mapped { .. } | InsertItem::Prepared { .. } => true,
        }
    }

    /// The mapped document. Errs with `IllegalState` before the map phase.
    pub fn mapped_document(&self) -> Result<&Document> {
        match *self {
            InsertItem::Mapped { ref document, .. }
            | InsertItem::Prepared { ref document, .. } => Ok(document),
            InsertItem::Unmapped { .. } => Err(illegal_state("insert", "mapped")),
        }
    }
}

impl BulkItem for InsertItem {
    fn mapped(&self, ctx: &BulkContext) -> Result<Self> {
        match *self {
            InsertItem::Unmapped { ref namespace, ref source } => {
                ctx.publish(WriteEventKind::BeforeConvert, namespace, Some(source));
                let converted = ctx.invoke(CallbackPhase::BeforeConvert, source.clone(), namespace)?;
                Ok(InsertItem::Mapped {
                    namespace: namespace.clone(),
                    document: converted,
                })
            }
            ref mapped => Ok(mapped.clone()),
        }
    }

    fn prepare(&self, ctx: &BulkContext) -> Result<(Self, WriteModel)> {
        match *self {
            InsertItem::Mapped { ref namespace, ref document }
            | InsertItem::Prepared { ref namespace, ref document } => {
                ctx.publish(WriteEventKind::BeforeSave, namespace, Some(document));
                let saved = ctx.invoke(CallbackPhase::BeforeSave, document.clone(), namespace)?;
                let model = WriteModel::InsertOne {
                    namespace: namespace.clone(),
                    document: saved.clone(),
                };
                let prepared = InsertItem::Prepared {
                    namespace: namespace.clone(),
                    document: saved,
                };
                Ok((prepared, model))
            }
            InsertItem::Unmapped { .. } => Err(illegal_state("insert", "mapped")),
        }
    }

    fn finish(&self, ctx: &BulkContext) -> Result<()> {
        match *self {
            InsertItem::Prepared { ref namespace, ref document } => {
                ctx.publish(WriteEventKind::AfterSave, namespace, Some(document));
                ctx.invoke(CallbackPhase::AfterSave, document.clone(), namespace)?;
                Ok(())
            }
            InsertItem::Unmapped { .. }
            | InsertItem::Mapped { .. } => Err(illegal_state("insert", "prepared")),
        }
    }

    fn namespace(&self) -> &Namespace {
        match *self {
            InsertItem::Unmapped { ref namespace, .. }
            | InsertItem::Mapped { ref namespace, .. }
            | InsertItem::Prepared { ref namespace, .. } => namespace,
        }
    }
}

/// A queued update, covering both single- and multi-document intent.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateItem {
    /// As appended: logical filter and update definition.
    Unmapped {
        /// The captured destination.
        namespace: Namespace,
        /// The logical filter.
        filter: Document,
        /// The logical update definition.
        update: UpdateDefinition,
        /// Caller-supplied options, threaded through unchanged.
        options: UpdateModelOptions,
        /// Whether every matching document is updated, or only the first.
        multi: bool,
    },
    /// After the map phase: wire-ready filter and update definition.
    Mapped {
        /// The captured destination.
        namespace: Namespace,
        /// The mapped filter.
        filter: Document,
        /// The mapped update definition.
        update: UpdateDefinition,
        /// Caller-supplied options, threaded through unchanged.
        options: UpdateModelOptions,
        /// Whether every matching document is updated, or only the first.
        multi: bool,
    },
}

impl UpdateItem {
    /// Creates an unmapped single-document update intent.
    pub fn one(
        namespace: Namespace,
        filter: Document,
        update: UpdateDefinition,
        options: UpdateModelOptions,
    ) -> Self {
        UpdateItem::Unmapped { namespace, filter, update, options, multi: false }
    }

    /// Creates an unmapped multi-document update intent.
    pub fn many(
        namespace: Namespace,
        filter: Document,
        update: UpdateDefinition,
        options: UpdateModelOptions,
    ) -> Self {
        UpdateItem::Unmapped { namespace, filter, update, options, multi: true }
    }

    /// Whether the map phase already ran.
    pub fn is_mapped(&self) -> bool {
        match *self {
            UpdateItem::Unmapped { .. } => false,
            UpdateItem::Mapped { .. } => true,
        }
    }
}

impl BulkItem for UpdateItem {
    fn mapped(&self, ctx: &BulkContext) -> Result<Self> {
        match *self {
            UpdateItem::Unmapped { ref namespace, ref filter, ref update, ref options, multi } => {
                Ok(UpdateItem::Mapped {
                    namespace: namespace.clone(),
                    filter: ctx.map_query(filter.clone(), namespace)?,
                    update: ctx.map_update(update.clone(), namespace)?,
                    options: options.clone(),
                    multi,
                })
            }
            ref mapped => Ok(mapped.clone()),
        }
    }

    fn prepare(&self, _ctx: &BulkContext) -> Result<(Self, WriteModel)> {
        match *self {
            UpdateItem::Mapped { ref namespace, ref filter, ref update, ref options, multi } => {
                // The document-vs-pipeline branch lives in the
                // `UpdateDefinition` the model carries; serialization picks
                // the wire form from the definition's kind.
                let model = if multi {
                    WriteModel::UpdateMany {
                        namespace: namespace.clone(),
                        filter: filter.clone(),
                        update: update.clone(),
                        options: options.clone(),
                    }
                } else {
                    WriteModel::UpdateOne {
                        namespace: namespace.clone(),
                        filter: filter.clone(),
                        update: update.clone(),
                        options: options.clone(),
                    }
                };
                Ok((self.clone(), model))
            }
            UpdateItem::Unmapped { .. } => Err(illegal_state("update", "mapped")),
        }
    }

    fn finish(&self, _ctx: &BulkContext) -> Result<()> {
        // Updates carry no document, so there are no "after save" hooks.
        match *self {
            UpdateItem::Mapped { .. } => Ok(()),
            UpdateItem::Unmapped { .. } => Err(illegal_state("update", "mapped")),
        }
    }

    fn namespace(&self) -> &Namespace {
        match *self {
            UpdateItem::Unmapped { ref namespace, .. }
            | UpdateItem::Mapped { ref namespace, .. } => namespace,
        }
    }
}

/// A queued removal.
///
/// The prepare phase always builds a delete-**many** model; single-document
/// intent is expressed through the uniqueness of the filter, and multiplicity
/// stays the business of the option object rather than the model kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoveItem {
    /// As appended: the logical filter.
    Unmapped {
        /// The captured destination.
        namespace: Namespace,
        /// The logical filter.
        filter: Document,
        /// Caller-supplied options, threaded through unchanged.
        options: DeleteModelOptions,
    },
    /// After the map phase: the wire-ready filter.
    Mapped {
        /// The captured destination.
        namespace: Namespace,
        /// The mapped filter.
        filter: Document,
        /// Caller-supplied options, threaded through unchanged.
        options: DeleteModelOptions,
    },
}

impl RemoveItem {
    /// Creates an unmapped removal intent.
    pub fn new(namespace: Namespace, filter: Document, options: DeleteModelOptions) -> Self {
        RemoveItem::Unmapped { namespace, filter, options }
    }

    /// Whether the map phase already ran.
    pub fn is_mapped(&self) -> bool {
        match *self {
            RemoveItem::Unmapped { .. } => false,
            RemoveItem::Mapped { .. } => true,
        }
    }
}

impl BulkItem for RemoveItem {
    fn mapped(&self, ctx: &BulkContext) -> Result<Self> {
        match *self {
            RemoveItem::Unmapped { ref namespace, ref filter, ref options } => {
                Ok(RemoveItem::Mapped {
                    namespace: namespace.clone(),
                    filter: ctx.map_query(filter.clone(), namespace)?,
                    options: options.clone(),
                })
            }
            ref mapped => Ok(mapped.clone()),
        }
    }

    fn prepare(&self, _ctx: &BulkContext) -> Result<(Self, WriteModel)> {
        match *self {
            RemoveItem::Mapped { ref namespace, ref filter, ref options } => {
                let model = WriteModel::DeleteMany {
                    namespace: namespace.clone(),
                    filter: filter.clone(),
                    options: options.clone(),
                };
                Ok((self.clone(), model))
            }
            RemoveItem::Unmapped { .. } => Err(illegal_state("remove", "mapped")),
        }
    }

    fn finish(&self, _ctx: &BulkContext) -> Result<()> {
        match *self {
            RemoveItem::Mapped { .. } => Ok(()),
            RemoveItem::Unmapped { .. } => Err(illegal_state("remove", "mapped")),
        }
    }

    fn namespace(&self) -> &Namespace {
        match *self {
            RemoveItem::Unmapped { ref namespace, .. }
            | RemoveItem::Mapped { ref namespace, .. } => namespace,
        }
    }
}

/// A queued whole-document replacement. Semantically a full-document save,
/// so it fires the same convert/save hooks as an insert.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplaceItem {
    /// As appended: logical filter and serialized replacement.
    Unmapped {
        /// The captured destination.
        namespace: Namespace,
        /// The logical filter.
        filter: Document,
        /// The replacement in document form, not yet through convert hooks.
        replacement: Document,
        /// Caller-supplied options, threaded through unchanged.
        options: ReplaceModelOptions,
    },
    /// After the map phase: wire-ready filter and replacement.
    Mapped {
        /// The captured destination.
        namespace: Namespace,
        /// The mapped filter.
        filter: Document,
        /// The converted, wire-ready replacement.
        replacement: Document,
        /// Caller-supplied options, threaded through unchanged.
        options: ReplaceModelOptions,
    },
    /// After the prepare phase: the replacement exactly as handed to the
    /// write, before-save rewrites included.
    Prepared {
        /// The captured destination.
        namespace: Namespace,
        /// The mapped filter.
        filter: Document,
        /// The written replacement.
        replacement: Document,
        /// Caller-supplied options, threaded through unchanged.
        options: ReplaceModelOptions,
    },
}

impl ReplaceItem {
    /// Creates an unmapped replacement intent.
    pub fn new(
        namespace: Namespace,
        filter: Document,
        replacement: Document,
        options: ReplaceModelOptions,
    ) -> Self {
        ReplaceItem::Unmapped { namespace, filter, replacement, options }
    }

    /// Whether the map phase already ran.
    pub fn is_mapped(&self) -> bool {
        match *self {
            ReplaceItem::Unmapped { .. } => false,
            ReplaceItem::Mapped { .. } | ReplaceItem::Prepared { .. } => true,
        }
    }
}

impl BulkItem for ReplaceItem {
    fn mapped(&self, ctx: &BulkContext) -> Result<Self> {
        match *self {
            ReplaceItem::Unmapped { ref namespace, ref filter, ref replacement, ref options } => {
                ctx.publish(WriteEventKind::BeforeConvert, namespace, Some(replacement));
                let converted = ctx.invoke(CallbackPhase::BeforeConvert, replacement.clone(), namespace)?;
                Ok(ReplaceItem::Mapped {
                    namespace: namespace.clone(),
                    filter: ctx.map_query(filter.clone(), namespace)?,
                    replacement: converted,
                    options: options.clone(),
                })
            }
            ref mapped => Ok(mapped.clone()),
        }
    }

    fn prepare(&self, ctx: &BulkContext) -> Result<(Self, WriteModel)> {
        match *self {
            ReplaceItem::Mapped { ref namespace, ref filter, ref replacement, ref options }
            | ReplaceItem::Prepared { ref namespace, ref filter, ref replacement, ref options } => {
                ctx.publish(WriteEventKind::BeforeSave, namespace, Some(replacement));
                let saved = ctx.invoke(CallbackPhase::BeforeSave, replacement.clone(), namespace)?;
                let model = WriteModel::ReplaceOne {
                    namespace: namespace.clone(),
                    filter: filter.clone(),
                    replacement: saved.clone(),
                    options: options.clone(),
                };
                let prepared = ReplaceItem::Prepared {
                    namespace: namespace.clone(),
                    filter: filter.clone(),
                    replacement: saved,
                    options: options.clone(),
                };
                Ok((prepared, model))
            }
            ReplaceItem::Unmapped { .. } => Err(illegal_state("replace", "mapped")),
        }
    }

    fn finish(&self, ctx: &BulkContext) -> Result<()> {
        match *self {
            ReplaceItem::Prepared { ref namespace, ref replacement, .. } => {
                ctx.publish(WriteEventKind::AfterSave, namespace, Some(replacement));
                ctx.invoke(CallbackPhase::AfterSave, replacement.clone(), namespace)?;
                Ok(())
            }
            ReplaceItem::Unmapped { .. }
            | ReplaceItem::Mapped { .. } => Err(illegal_state("replace", "prepared")),
        }
    }

    fn namespace(&self) -> &Namespace {
        match *self {
            ReplaceItem::Unmapped { ref namespace, .. }
            | ReplaceItem::Mapped { ref namespace, .. }
            | ReplaceItem::Prepared { ref namespace, .. } => namespace,
        }
    }
}

/// The sum of all queued write kinds, so one pipeline can hold a
/// heterogeneous mix of intents.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteIntent {
    /// An insert.
    Insert(InsertItem),
    /// A single- or multi-document update.
    Update(UpdateItem),
    /// A removal.
    Remove(RemoveItem),
    /// A whole-document replacement.
    Replace(ReplaceItem),
}

impl From<InsertItem> for WriteIntent {
    fn from(item: InsertItem) -> Self {
        WriteIntent::Insert(item)
    }
}

impl From<UpdateItem> for WriteIntent {
    fn from(item: UpdateItem) -> Self {
        WriteIntent::Update(item)
    }
}

impl From<RemoveItem> for WriteIntent {
    fn from(item: RemoveItem) -> Self {
        WriteIntent::Remove(item)
    }
}

impl From<ReplaceItem> for WriteIntent {
    fn from(item: ReplaceItem) -> Self {
        WriteIntent::Replace(item)
    }
}

impl BulkItem for WriteIntent {
    fn mapped(&self, ctx: &BulkContext) -> Result<Self> {
        match *self {
            WriteIntent::Insert(ref item) => item.mapped(ctx).map(WriteIntent::Insert),
            WriteIntent::Update(ref item) => item.mapped(ctx).map(WriteIntent::Update),
            WriteIntent::Remove(ref item) => item.mapped(ctx).map(WriteIntent::Remove),
            WriteIntent::Replace(ref item) => item.mapped(ctx).map(WriteIntent::Replace),
        }
    }

    fn prepare(&self, ctx: &BulkContext) -> Result<(Self, WriteModel)> {
        match *self {
            WriteIntent::Insert(ref item) => item.prepare(ctx)
                .map(|(next, model)| (WriteIntent::Insert(next), model)),
            WriteIntent::Update(ref item) => item.prepare(ctx)
                .map(|(next, model)| (WriteIntent::Update(next), model)),
            WriteIntent::Remove(ref item) => item.prepare(ctx)
                .map(|(next, model)| (WriteIntent::Remove(next), model)),
            WriteIntent::Replace(ref item) => item.prepare(ctx)
                .map(|(next, model)| (WriteIntent::Replace(next), model)),
        }
    }

    fn finish(&self, ctx: &BulkContext) -> Result<()> {
        match *self {
            WriteIntent::Insert(ref item) => item.finish(ctx),
            WriteIntent::Update(ref item) => item.finish(ctx),
            WriteIntent::Remove(ref item) => item.finish(ctx),
            WriteIntent::Replace(ref item) => item.finish(ctx),
        }
    }

    fn namespace(&self) -> &Namespace {
        match *self {
            WriteIntent::Insert(ref item) => item.namespace(),
            WriteIntent::Update(ref item) => item.namespace(),
            WriteIntent::Remove(ref item) => item.namespace(),
            WriteIntent::Replace(ref item) => item.namespace(),
        }
    }
}

/// The ordered container driving the three-phase lifecycle.
///
/// The three operations must be invoked in the relative order `append*`,
/// `models`, `post_process`, exactly once per execution cycle; the pipeline
/// does not enforce this ordering, it is a caller contract. Pipelines are
/// not reused across executions.
pub struct BulkPipeline<I> {
    /// The shared per-pipeline configuration.
    context: BulkContext,
    /// The insertion-ordered items. Grows via `append` only.
    items: Vec<I>,
}

impl<I: BulkItem> BulkPipeline<I> {
    /// Creates an empty pipeline around the given context.
    pub fn new(context: BulkContext) -> Self {
        BulkPipeline {
            context,
            items: Vec::new(),
        }
    }

    /// The shared context.
    pub fn context(&self) -> &BulkContext {
        &self.context
    }

    /// The number of queued items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether anything was queued yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Runs the item's map transform against the shared context, eagerly,
    /// and stores the returned item at the end of the sequence.
    ///
    /// If the map transform fails, the pipeline keeps the items appended
    /// before the failure; there is no rollback.
    pub fn append<T: Into<I>>(&mut self, item: T) -> Result<()> {
        let mapped = item.into().mapped(&self.context)?;
        self.items.push(mapped);
        Ok(())
    }

    /// Runs each item's prepare-for-write transform in append order,
    /// stores the prepared items back, and returns the ordered write
    /// models. "Before write" hooks fire here, so call this immediately
    /// before handing the list to the executor.
    ///
    /// A failure partway through discards the partial list; side effects
    /// already fired by earlier items are not undone, and items prepared
    /// before the failure stay prepared.
    pub fn models(&mut self) -> Result<Vec<WriteModel>> {
        let context = &self.context;
        let mut models = Vec::with_capacity(self.items.len());

        for item in &mut self.items {
            let (prepared, model) = item.prepare(context)?;
            *item = prepared;
            models.push(model);
        }

        Ok(models)
    }

    /// Runs each item's finish hook in append order. Only call this after
    /// the underlying write completed successfully; finish hooks assume the
    /// write went through and there is no mechanism to skip them on partial
    /// bulk failure.
    pub fn post_process(&self) -> Result<()> {
        self.items
            .iter()
            .try_for_each(|item| item.finish(&self.context))
    }
}

impl<I> fmt::Debug for BulkPipeline<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkPipeline")
            .field("context", &self.context)
            .field("items", &self.items.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use crate::error::{ ErrorKind, ErrorExt };
    use super::*;

    /// Transforms return new instances; the receiver stays in its
    /// pre-call phase.
    #[test]
    fn map_phase_does_not_mutate() -> Result<()> {
        let ctx = BulkContext::new("db");
        let ns = Namespace::new("db", "coll");
        let item = InsertItem::new(ns, doc!{ "name": "a" });
        let snapshot = item.clone();

        let mapped = item.mapped(&ctx)?;

        assert!(mapped.is_mapped());
        assert!(!item.is_mapped());
        assert_eq!(item, snapshot);

        Ok(())
    }

    #[test]
    fn premature_model_access_is_an_illegal_state() {
        let ctx = BulkContext::new("db");
        let ns = Namespace::new("db", "coll");
        let item = InsertItem::new(ns, doc!{ "name": "a" });

        let error = item.prepare(&ctx).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::IllegalState);

        let error = item.mapped_document().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::IllegalState);
    }

    #[test]
    fn finish_requires_the_prepare_phase() -> Result<()> {
        let ctx = BulkContext::new("db");
        let ns = Namespace::new("db", "coll");
        let item = InsertItem::new(ns, doc!{ "name": "a" });

        let error = item.finish(&ctx).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::IllegalState);

        // mapped but never prepared is still too early
        let mapped = item.mapped(&ctx)?;
        let error = mapped.finish(&ctx).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::IllegalState);

        let (prepared, _) = mapped.prepare(&ctx)?;
        prepared.finish(&ctx)?;

        Ok(())
    }

    #[test]
    fn prepare_keeps_the_written_document() -> Result<()> {
        /// Stamps every document it sees in the before-save phase.
        #[derive(Debug, Clone, Copy)]
        struct Stamp;

        impl EntityCallbacks for Stamp {
            fn invoke(
                &self,
                phase: CallbackPhase,
                mut document: Document,
                _namespace: &Namespace,
            ) -> Result<Document> {
                if phase == CallbackPhase::BeforeSave {
                    document.insert("stamped", true);
                }
                Ok(document)
            }
        }

        let ctx = BulkContext::new("db").with_callbacks(Box::new(Stamp));
        let ns = Namespace::new("db", "coll");
        let item = InsertItem::new(ns, doc!{ "name": "a" }).mapped(&ctx)?;

        let (prepared, model) = item.prepare(&ctx)?;

        // the stale mapped document, and the one the model carries
        assert_eq!(item.mapped_document()?, &doc!{ "name": "a" });
        match model {
            WriteModel::InsertOne { ref document, .. } => {
                assert_eq!(document, &doc!{ "name": "a", "stamped": true });
            }
            ref other => panic!("unexpected model: {:?}", other),
        }

        // the prepared item holds the document that was written
        assert_eq!(prepared.mapped_document()?,
                   &doc!{ "name": "a", "stamped": true });

        Ok(())
    }

    #[test]
    fn remapping_is_idempotent() -> Result<()> {
        let ctx = BulkContext::new("db");
        let ns = Namespace::new("db", "coll");
        let item = InsertItem::new(ns, doc!{ "name": "a" }).mapped(&ctx)?;

        assert_eq!(item.mapped(&ctx)?, item);

        Ok(())
    }
}
