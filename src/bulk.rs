//! Bulk write facades: the typed, collection-scoped [`Bulk`](struct.Bulk.html)
//! and the namespace-aware [`ClusterBulk`](struct.ClusterBulk.html).
//!
//! Both are thin state machines over a [`BulkPipeline`](../pipeline/struct.BulkPipeline.html):
//! they translate high-level operations into pipeline items, capturing the
//! destination namespace **by value** at the moment of the call. Neither
//! facade is thread-safe; hand one out per logical operation sequence.

use std::fmt;
use std::marker::PhantomData;
use bson::Document;
use serde::Serialize;
use crate::{
    bsn::{ serialize_document, serialize_documents },
    doc::Doc,
    ns::Namespace,
    ops::{ Update, Upsert, Delete },
    pipeline::{ BulkContext, BulkPipeline, WriteIntent, InsertItem, UpdateItem, RemoveItem, ReplaceItem },
    write::{
        WriteModel,
        UpdateDefinition,
        UpdateModelOptions,
        ReplaceModelOptions,
        DeleteModelOptions,
        BulkMode,
        BulkWriteResult,
        BulkExecutor,
    },
    error::Result,
};

/// A bulk operation sequence scoped to the collection of a single `Doc`
/// type. The destination namespace is fixed at construction, and every
/// queued operation carries the type's name as the mapping target type.
pub struct Bulk<T: Doc> {
    /// The underlying item pipeline.
    pipeline: BulkPipeline<WriteIntent>,
    /// The fixed destination of every operation queued on this instance.
    namespace: Namespace,
    /// Whether the eventual bulk write is ordered.
    mode: BulkMode,
    /// Only `Doc`s of type `T` pass through this instance.
    _marker: PhantomData<T>,
}

impl<T: Doc> Bulk<T> {
    /// Creates an empty, ordered bulk over `T`'s collection in the
    /// context's database.
    pub fn new(context: BulkContext) -> Self {
        let namespace = Namespace::with_target_type(
            context.database(),
            T::NAME,
            std::any::type_name::<T>(),
        );
        Bulk {
            pipeline: BulkPipeline::new(context),
            namespace,
            mode: BulkMode::default(),
            _marker: PhantomData,
        }
    }

    /// Switches the ordering mode of the eventual bulk write.
    pub fn with_mode(mut self, mode: BulkMode) -> Self {
        self.mode = mode;
        self
    }

    /// The ordering mode of the eventual bulk write.
    pub fn mode(&self) -> BulkMode {
        self.mode
    }

    /// The destination every operation on this instance targets.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The number of queued operations.
    pub fn len(&self) -> usize {
        self.pipeline.len()
    }

    /// Whether any operations were queued yet.
    pub fn is_empty(&self) -> bool {
        self.pipeline.is_empty()
    }

    /// Queues inserting the entity. The entity is serialized and run
    /// through the "before convert" hooks right away.
    pub fn insert(&mut self, entity: &T) -> Result<()> {
        let source = serialize_document(entity)?;
        self.pipeline.append(InsertItem::new(self.namespace.clone(), source))
    }

    /// Queues inserting each entity, in order. The whole batch is
    /// serialized up front, so a conversion failure anywhere in it
    /// queues nothing.
    pub fn insert_many(&mut self, entities: &[T]) -> Result<()> {
        for source in serialize_documents::<T, _>(entities)? {
            self.pipeline.append(InsertItem::new(self.namespace.clone(), source))?;
        }
        Ok(())
    }

    /// Queues updating the first document matched by the operation's filter.
    pub fn update_one<U: Update<T>>(&mut self, update: U) -> Result<()> {
        self.pipeline.append(UpdateItem::one(
            self.namespace.clone(),
            update.filter(),
            update.update(),
            U::options(),
        ))
    }

    /// Queues updating every document matched by the operation's filter.
    pub fn update_many<U: Update<T>>(&mut self, update: U) -> Result<()> {
        self.pipeline.append(UpdateItem::many(
            self.namespace.clone(),
            update.filter(),
            update.update(),
            U::options(),
        ))
    }

    /// Queues upserting the first document matched by the operation's
    /// filter. The `upsert` flag is forced on regardless of what the
    /// operation's options say.
    pub fn upsert_one<U: Upsert<T>>(&mut self, upsert: U) -> Result<()> {
        let options = UpdateModelOptions {
            upsert: true,
            ..U::options()
        };
        self.pipeline.append(UpdateItem::one(
            self.namespace.clone(),
            upsert.filter(),
            upsert.upsert(),
            options,
        ))
    }

    /// Queues removing every document matched by the operation's filter.
    pub fn remove<Q: Delete<T>>(&mut self, query: Q) -> Result<()> {
        self.pipeline.append(RemoveItem::new(
            self.namespace.clone(),
            query.filter(),
            Q::options(),
        ))
    }

    /// Queues replacing the first document matching `filter` with the
    /// entity, wholesale. The replacement goes through the same convert
    /// hooks as an insert.
    pub fn replace_one(&mut self, filter: Document, entity: &T) -> Result<()> {
        let replacement = serialize_document(entity)?;
        self.pipeline.append(ReplaceItem::new(
            self.namespace.clone(),
            filter,
            replacement,
            T::replace_options(),
        ))
    }

    /// Materializes the queued operations into wire-level models, in
    /// append order, firing the "before save" hooks and advancing the
    /// items to their prepared state.
    pub fn models(&mut self) -> Result<Vec<WriteModel>> {
        self.pipeline.models()
    }

    /// Prepares the models, hands them to the executor, and runs the
    /// "after save" hooks once the executor reports success.
    pub fn execute<E: BulkExecutor>(&mut self, executor: &E) -> Result<BulkWriteResult> {
        let models = self.pipeline.models()?;
        let result = executor.execute(models, self.mode.into())?;
        self.pipeline.post_process()?;
        Ok(result)
    }
}

impl<T: Doc> fmt::Debug for Bulk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bulk<{}>[{}]", T::NAME, self.pipeline.len())
    }
}

/// A bulk operation sequence that may span collections and databases.
///
/// The facade keeps a *current* namespace; every operation captures it by
/// value at call time, so repositioning via
/// [`in_collection`](#method.in_collection) or
/// [`in_database`](#method.in_database) only affects operations queued
/// afterwards.
///
/// ```
/// # use bson::doc;
/// # use mangrove::prelude::*;
/// # use mangrove::pipeline::BulkContext;
/// #
/// # fn main() -> MangroveResult<()> {
/// #
/// let mut bulk = ClusterBulk::new(BulkContext::new("db1"), "coll1");
/// bulk.insert(&doc!{ "name": "a" })?;
///
/// bulk.in_collection("coll2");
/// bulk.remove(doc!{ "name": "a" })?;
///
/// let models = bulk.models()?;
/// assert_eq!(models[0].namespace().to_string(), "db1.coll1");
/// assert_eq!(models[1].namespace().to_string(), "db1.coll2");
/// #
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ClusterBulk {
    /// The underlying item pipeline.
    pipeline: BulkPipeline<WriteIntent>,
    /// The namespace operations queued *from now on* are headed to.
    current: Namespace,
    /// Whether the eventual bulk write is ordered.
    mode: BulkMode,
}

impl ClusterBulk {
    /// Creates an empty, ordered bulk positioned at `collection` in the
    /// context's database.
    pub fn new(context: BulkContext, collection: &str) -> Self {
        let current = Namespace::new(context.database(), collection);
        ClusterBulk {
            pipeline: BulkPipeline::new(context),
            current,
            mode: BulkMode::default(),
        }
    }

    /// Switches the ordering mode of the eventual bulk write.
    pub fn with_mode(mut self, mode: BulkMode) -> Self {
        self.mode = mode;
        self
    }

    /// The ordering mode of the eventual bulk write.
    pub fn mode(&self) -> BulkMode {
        self.mode
    }

    /// The namespace subsequently queued operations will target.
    pub fn namespace(&self) -> &Namespace {
        &self.current
    }

    /// The number of queued operations.
    pub fn len(&self) -> usize {
        self.pipeline.len()
    }

    /// Whether any operations were queued yet.
    pub fn is_empty(&self) -> bool {
        self.pipeline.is_empty()
    }

    /// Repositions the facade at another collection of the same database.
    /// Already-queued operations keep the namespace they captured.
    pub fn in_collection(&mut self, collection: &str) -> &mut Self {
        self.current = self.current.in_collection(collection);
        self
    }

    /// Repositions the facade at the same-named collection of another
    /// database. Already-queued operations keep the namespace they captured.
    pub fn in_database(&mut self, database: &str) -> &mut Self {
        self.current = self.current.in_database(database);
        self
    }

    /// Queues inserting the entity at the current namespace.
    pub fn insert<T: Serialize>(&mut self, entity: &T) -> Result<()> {
        let source = serialize_document(entity)?;
        self.pipeline.append(InsertItem::new(self.current.clone(), source))
    }

    /// Queues inserting each entity at the current namespace, in order.
    /// The whole batch is serialized up front, so a conversion failure
    /// anywhere in it queues nothing.
    pub fn insert_many<T: Serialize>(&mut self, entities: &[T]) -> Result<()> {
        for source in serialize_documents::<T, _>(entities)? {
            self.pipeline.append(InsertItem::new(self.current.clone(), source))?;
        }
        Ok(())
    }

    /// Queues updating the first document matching `filter` at the
    /// current namespace.
    pub fn update_one<U: Into<UpdateDefinition>>(
        &mut self,
        filter: Document,
        update: U,
        options: UpdateModelOptions,
    ) -> Result<()> {
        self.pipeline.append(UpdateItem::one(
            self.current.clone(),
            filter,
            update.into(),
            options,
        ))
    }

    /// Queues updating every document matching `filter` at the
    /// current namespace.
    pub fn update_many<U: Into<UpdateDefinition>>(
        &mut self,
        filter: Document,
        update: U,
        options: UpdateModelOptions,
    ) -> Result<()> {
        self.pipeline.append(UpdateItem::many(
            self.current.clone(),
            filter,
            update.into(),
            options,
        ))
    }

    /// Queues upserting the first document matching `filter` at the
    /// current namespace. The `upsert` flag is forced on.
    pub fn upsert_one<U: Into<UpdateDefinition>>(
        &mut self,
        filter: Document,
        update: U,
    ) -> Result<()> {
        let options = UpdateModelOptions {
            upsert: true,
            ..Default::default()
        };
        self.pipeline.append(UpdateItem::one(
            self.current.clone(),
            filter,
            update.into(),
            options,
        ))
    }

    /// Queues removing every document matching `filter` at the
    /// current namespace.
    pub fn remove(&mut self, filter: Document) -> Result<()> {
        self.pipeline.append(RemoveItem::new(
            self.current.clone(),
            filter,
            DeleteModelOptions::default(),
        ))
    }

    /// Queues replacing the first document matching `filter` at the
    /// current namespace with the entity, wholesale.
    pub fn replace_one<T: Serialize>(&mut self, filter: Document, entity: &T) -> Result<()> {
        let replacement = serialize_document(entity)?;
        self.pipeline.append(ReplaceItem::new(
            self.current.clone(),
            filter,
            replacement,
            ReplaceModelOptions::default(),
        ))
    }

    /// Materializes the queued operations into wire-level models, in
    /// append order, firing the "before save" hooks and advancing the
    /// items to their prepared state.
    pub fn models(&mut self) -> Result<Vec<WriteModel>> {
        self.pipeline.models()
    }

    /// Prepares the models, hands them to the executor, and runs the
    /// "after save" hooks once the executor reports success.
    pub fn execute<E: BulkExecutor>(&mut self, executor: &E) -> Result<BulkWriteResult> {
        let models = self.pipeline.models()?;
        let result = executor.execute(models, self.mode.into())?;
        self.pipeline.post_process()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use serde_derive::Serialize;
    use crate::ops;
    use super::*;

    #[derive(Debug, Serialize)]
    struct User {
        name: String,
    }

    impl Doc for User {
        const NAME: &'static str = "user";
    }

    #[derive(Debug)]
    struct RenameTo(&'static str, &'static str);

    impl Update<User> for RenameTo {
        fn filter(&self) -> Document {
            doc!{ "name": self.0 }
        }

        fn update(&self) -> UpdateDefinition {
            doc!{ "$set": { "name": self.1 } }.into()
        }
    }

    #[test]
    fn collection_bulk_targets_one_namespace() -> Result<()> {
        let mut bulk = Bulk::<User>::new(BulkContext::new("db"));
        bulk.insert(&User { name: "a".into() })?;
        bulk.update_many(RenameTo("a", "b"))?;
        bulk.remove(doc!{ "name": "b" })?;

        let models = bulk.models()?;
        assert_eq!(models.len(), 3);
        for model in &models {
            assert_eq!(model.namespace().to_string(), "db.user");
            assert_eq!(model.namespace().target_type(),
                       Some(std::any::type_name::<User>()));
        }

        Ok(())
    }

    #[test]
    fn upsert_flag_is_forced_on() -> Result<()> {
        #[derive(Debug)]
        struct Touch;

        impl Upsert<User> for Touch {
            fn filter(&self) -> Document {
                doc!{ "name": "a" }
            }

            fn upsert(&self) -> UpdateDefinition {
                doc!{ "$set": { "touched": true } }.into()
            }

            // deliberately contradicts the flag
            fn options() -> UpdateModelOptions {
                UpdateModelOptions::default()
            }
        }

        let mut bulk = Bulk::<User>::new(BulkContext::new("db"));
        bulk.upsert_one(Touch)?;

        match bulk.models()?.remove(0) {
            WriteModel::UpdateOne { options, .. } => assert!(options.upsert),
            model => panic!("unexpected model: {:?}", model),
        }

        Ok(())
    }

    #[test]
    fn repositioning_does_not_retarget_queued_items() -> Result<()> {
        let mut bulk = ClusterBulk::new(BulkContext::new("db1"), "coll1");
        bulk.insert(&doc!{ "name": "a" })?;

        bulk.in_collection("coll2");
        bulk.remove(doc!{ "name": "a" })?;

        bulk.in_database("db2");
        bulk.insert(&doc!{ "name": "b" })?;

        let models = bulk.models()?;
        assert_eq!(models[0].namespace().to_string(), "db1.coll1");
        assert_eq!(models[1].namespace().to_string(), "db1.coll2");
        assert_eq!(models[2].namespace().to_string(), "db2.coll2");

        Ok(())
    }
}
