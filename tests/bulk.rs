//! End-to-end tests of the bulk facades: lifecycle hook ordering, namespace
//! capture, query mapping, and the executor seam.

use std::sync::{ Arc, Mutex };
use serde_derive::Serialize;
use mangrove::prelude::*;
use mangrove::pipeline::{ BulkContext, QueryMapper };

#[derive(Debug, Serialize)]
struct User {
    name: String,
}

impl Doc for User {
    const NAME: &'static str = "user";
}

/// Records every published event as `"Kind@db.coll"`.
#[derive(Debug, Clone, Default)]
struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl EventSink for Recorder {
    fn publish(&self, event: WriteEvent<'_>) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{:?}@{}", event.kind, event.namespace));
    }
}

/// Stamps documents in the before-save phase and records every invocation.
#[derive(Debug, Clone, Default)]
struct Stamper {
    log: Arc<Mutex<Vec<String>>>,
}

impl EntityCallbacks for Stamper {
    fn invoke(
        &self,
        phase: CallbackPhase,
        mut document: Document,
        _namespace: &Namespace,
    ) -> MangroveResult<Document> {
        self.log.lock().unwrap().push(format!("{:?}", phase));
        if phase == CallbackPhase::BeforeSave {
            document.insert("savedBy", "callback");
        }
        Ok(document)
    }
}

/// Stamps documents in the before-save phase and records the documents
/// the after-save phase is handed.
#[derive(Debug, Clone, Default)]
struct SaveAudit {
    after: Arc<Mutex<Vec<Document>>>,
}

impl EntityCallbacks for SaveAudit {
    fn invoke(
        &self,
        phase: CallbackPhase,
        mut document: Document,
        _namespace: &Namespace,
    ) -> MangroveResult<Document> {
        match phase {
            CallbackPhase::BeforeSave => {
                document.insert("savedBy", "callback");
            }
            CallbackPhase::AfterSave => {
                self.after.lock().unwrap().push(document.clone());
            }
            CallbackPhase::BeforeConvert => {}
        }
        Ok(document)
    }
}

/// Refuses documents carrying a `poison` key at save time.
#[derive(Debug, Clone, Copy, Default)]
struct SaveVeto;

impl EntityCallbacks for SaveVeto {
    fn invoke(
        &self,
        phase: CallbackPhase,
        document: Document,
        _namespace: &Namespace,
    ) -> MangroveResult<Document> {
        if phase == CallbackPhase::BeforeSave && document.contains_key("poison") {
            Err(MangroveError::new(MangroveErrorKind::EntityCallback, "document vetoed"))
        } else {
            Ok(document)
        }
    }
}

/// Refuses documents carrying a `poison` key during conversion.
#[derive(Debug, Clone, Copy, Default)]
struct Veto;

impl EntityCallbacks for Veto {
    fn invoke(
        &self,
        phase: CallbackPhase,
        document: Document,
        _namespace: &Namespace,
    ) -> MangroveResult<Document> {
        if phase == CallbackPhase::BeforeConvert && document.contains_key("poison") {
            Err(MangroveError::new(MangroveErrorKind::EntityCallback, "document vetoed"))
        } else {
            Ok(document)
        }
    }
}

/// Captures the models and options it is handed and reports success.
#[derive(Debug, Clone, Default)]
struct CapturingExecutor {
    calls: Arc<Mutex<Vec<(Vec<WriteModel>, BulkWriteOptions)>>>,
}

impl CapturingExecutor {
    fn calls(&self) -> Vec<(Vec<WriteModel>, BulkWriteOptions)> {
        self.calls.lock().unwrap().clone()
    }
}

impl BulkExecutor for CapturingExecutor {
    fn execute(
        &self,
        models: Vec<WriteModel>,
        options: BulkWriteOptions,
    ) -> MangroveResult<BulkWriteResult> {
        self.calls.lock().unwrap().push((models, options));
        Ok(BulkWriteResult::default())
    }
}

/// Always fails, as a broken connection would.
#[derive(Debug, Clone, Copy, Default)]
struct BrokenExecutor;

impl BulkExecutor for BrokenExecutor {
    fn execute(
        &self,
        _models: Vec<WriteModel>,
        _options: BulkWriteOptions,
    ) -> MangroveResult<BulkWriteResult> {
        Err(MangroveError::new(MangroveErrorKind::BulkWriteFailure, "connection reset"))
    }
}

/// Prefixes every filter key with the target type, so mapping is
/// observable from the generated models.
#[derive(Debug, Clone, Copy, Default)]
struct PrefixingMapper;

impl QueryMapper for PrefixingMapper {
    fn map_query(&self, query: Document, target_type: Option<&str>) -> MangroveResult<Document> {
        let prefix = target_type.unwrap_or("untyped");
        Ok(query
            .into_iter()
            .map(|(key, value)| (format!("{}.{}", prefix, key), value))
            .collect())
    }

    fn map_update(
        &self,
        update: UpdateDefinition,
        _target_type: Option<&str>,
    ) -> MangroveResult<UpdateDefinition> {
        Ok(update)
    }
}

#[test]
fn hooks_fire_in_lifecycle_order() -> MangroveResult<()> {
    let recorder = Recorder::default();
    let stamper = Stamper::default();
    let context = BulkContext::new("db")
        .with_event_sink(Box::new(recorder.clone()))
        .with_callbacks(Box::new(stamper.clone()));

    let mut bulk = Bulk::<User>::new(context);
    bulk.insert(&User { name: "a".into() })?;
    bulk.insert(&User { name: "b".into() })?;

    // convert hooks fired eagerly, at queueing time
    assert_eq!(recorder.entries(), vec![
        "BeforeConvert@db.user",
        "BeforeConvert@db.user",
    ]);

    let executor = CapturingExecutor::default();
    bulk.execute(&executor)?;

    assert_eq!(recorder.entries(), vec![
        "BeforeConvert@db.user",
        "BeforeConvert@db.user",
        "BeforeSave@db.user",
        "BeforeSave@db.user",
        "AfterSave@db.user",
        "AfterSave@db.user",
    ]);
    assert_eq!(
        *stamper.log.lock().unwrap(),
        ["BeforeConvert", "BeforeConvert",
         "BeforeSave", "BeforeSave",
         "AfterSave", "AfterSave"],
    );

    Ok(())
}

#[test]
fn before_save_rewrite_reaches_the_model() -> MangroveResult<()> {
    let context = BulkContext::new("db")
        .with_callbacks(Box::new(Stamper::default()));

    let mut bulk = Bulk::<User>::new(context);
    bulk.insert(&User { name: "a".into() })?;

    match bulk.models()?.remove(0) {
        WriteModel::InsertOne { document, .. } => {
            assert_eq!(document.get_str("name").unwrap(), "a");
            assert_eq!(document.get_str("savedBy").unwrap(), "callback");
        }
        model => panic!("unexpected model: {:?}", model),
    }

    Ok(())
}

#[test]
fn after_save_hooks_see_the_written_document() -> MangroveResult<()> {
    let audit = SaveAudit::default();
    let context = BulkContext::new("db")
        .with_callbacks(Box::new(audit.clone()));

    let mut bulk = Bulk::<User>::new(context);
    bulk.insert(&User { name: "a".into() })?;
    bulk.execute(&CapturingExecutor::default())?;

    // the after-save hook gets the document as written, rewrites included
    let seen = audit.after.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].get_str("name").unwrap(), "a");
    assert_eq!(seen[0].get_str("savedBy").unwrap(), "callback");

    Ok(())
}

#[test]
fn prepare_failure_discards_the_list_but_not_earlier_side_effects() -> MangroveResult<()> {
    let recorder = Recorder::default();
    let context = BulkContext::new("db")
        .with_event_sink(Box::new(recorder.clone()))
        .with_callbacks(Box::new(SaveVeto));

    let mut bulk = ClusterBulk::new(context, "coll");
    bulk.insert(&doc!{ "name": "a" })?;
    bulk.insert(&doc!{ "name": "b", "poison": true })?;

    let error = bulk.models().unwrap_err();
    assert_eq!(error.kind(), MangroveErrorKind::EntityCallback);

    // the first item's before-save event had already fired and stays
    // fired; nothing ever reaches the after-save phase
    assert_eq!(recorder.entries(), vec![
        "BeforeConvert@db.coll",
        "BeforeConvert@db.coll",
        "BeforeSave@db.coll",
        "BeforeSave@db.coll",
    ]);

    Ok(())
}

#[test]
fn namespace_capture_survives_repositioning() -> MangroveResult<()> {
    let executor = CapturingExecutor::default();
    let mut bulk = ClusterBulk::new(BulkContext::new("db1"), "coll1");

    bulk.insert(&doc!{ "name": "a" })?;
    bulk.in_collection("coll2");
    bulk.remove(doc!{ "name": "a" })?;

    bulk.execute(&executor)?;

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);

    let (models, _) = &calls[0];
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].namespace().to_string(), "db1.coll1");
    assert_eq!(models[1].namespace().to_string(), "db1.coll2");

    match &models[0] {
        WriteModel::InsertOne { document, .. } => {
            assert_eq!(document, &doc!{ "name": "a" });
        }
        model => panic!("unexpected model: {:?}", model),
    }
    match &models[1] {
        WriteModel::DeleteMany { filter, .. } => {
            assert_eq!(filter, &doc!{ "name": "a" });
        }
        model => panic!("unexpected model: {:?}", model),
    }

    Ok(())
}

#[test]
fn unordered_mode_reaches_the_executor() -> MangroveResult<()> {
    let executor = CapturingExecutor::default();

    let mut bulk = Bulk::<User>::new(BulkContext::new("db"))
        .with_mode(BulkMode::Unordered);
    bulk.insert(&User { name: "a".into() })?;
    bulk.execute(&executor)?;

    let mut ordered_bulk = Bulk::<User>::new(BulkContext::new("db"));
    ordered_bulk.insert(&User { name: "a".into() })?;
    ordered_bulk.execute(&executor)?;

    let calls = executor.calls();
    assert!(!calls[0].1.ordered);
    assert!(calls[1].1.ordered);

    Ok(())
}

#[test]
fn queries_are_mapped_against_the_target_type() -> MangroveResult<()> {
    let context = BulkContext::new("db")
        .with_mapper(Box::new(PrefixingMapper));

    let mut bulk = Bulk::<User>::new(context);
    bulk.remove(doc!{ "name": "a" })?;

    let mut expected = Document::new();
    expected.insert(format!("{}.name", std::any::type_name::<User>()), "a");

    match bulk.models()?.remove(0) {
        WriteModel::DeleteMany { filter, .. } => assert_eq!(filter, expected),
        model => panic!("unexpected model: {:?}", model),
    }

    Ok(())
}

#[test]
fn cluster_bulk_queries_have_no_target_type() -> MangroveResult<()> {
    let context = BulkContext::new("db")
        .with_mapper(Box::new(PrefixingMapper));

    let mut bulk = ClusterBulk::new(context, "coll");
    bulk.remove(doc!{ "name": "a" })?;

    match bulk.models()?.remove(0) {
        WriteModel::DeleteMany { filter, .. } => {
            assert_eq!(filter, doc!{ "untyped.name": "a" });
        }
        model => panic!("unexpected model: {:?}", model),
    }

    Ok(())
}

#[test]
fn rejected_item_is_not_queued_but_earlier_ones_survive() -> MangroveResult<()> {
    let context = BulkContext::new("db")
        .with_callbacks(Box::new(Veto));

    let mut bulk = ClusterBulk::new(context, "coll");
    bulk.insert(&doc!{ "name": "a" })?;

    let error = bulk.insert(&doc!{ "name": "b", "poison": true }).unwrap_err();
    assert_eq!(error.kind(), MangroveErrorKind::EntityCallback);

    // the failed item was never appended; the earlier one is intact
    assert_eq!(bulk.len(), 1);
    assert_eq!(bulk.models()?.len(), 1);

    Ok(())
}

#[test]
fn failed_execution_skips_after_save_hooks() -> MangroveResult<()> {
    let recorder = Recorder::default();
    let context = BulkContext::new("db")
        .with_event_sink(Box::new(recorder.clone()));

    let mut bulk = Bulk::<User>::new(context);
    bulk.insert(&User { name: "a".into() })?;

    let error = bulk.execute(&BrokenExecutor).unwrap_err();
    assert_eq!(error.kind(), MangroveErrorKind::BulkWriteFailure);

    assert!(recorder
            .entries()
            .iter()
            .all(|entry| !entry.starts_with("AfterSave")));

    Ok(())
}

#[test]
fn pipeline_shaped_updates_are_threaded_through() -> MangroveResult<()> {
    let mut bulk = ClusterBulk::new(BulkContext::new("db"), "coll");
    bulk.update_many(
        doc!{ "active": true },
        vec![
            doc!{ "$set": { "audited": true } },
            doc!{ "$unset": "legacy" },
        ],
        UpdateModelOptions::default(),
    )?;

    match bulk.models()?.remove(0) {
        WriteModel::UpdateMany { update, .. } => {
            assert!(update.is_pipeline());
            assert_eq!(update.to_bson(), Bson::Array(vec![
                Bson::Document(doc!{ "$set": { "audited": true } }),
                Bson::Document(doc!{ "$unset": "legacy" }),
            ]));
        }
        model => panic!("unexpected model: {:?}", model),
    }

    Ok(())
}

#[test]
fn sort_options_thread_through_to_the_model() -> MangroveResult<()> {
    let mut bulk = ClusterBulk::new(BulkContext::new("db"), "coll");
    bulk.update_one(
        doc!{ "active": true },
        doc!{ "$set": { "seen": true } },
        UpdateModelOptions {
            sort: Some(doc!{ "name": Order::Ascending, "age": Order::Descending }),
            ..Default::default()
        },
    )?;

    match bulk.models()?.remove(0) {
        WriteModel::UpdateOne { options, .. } => {
            assert_eq!(options.sort, Some(doc!{ "name": 1, "age": -1 }));
        }
        model => panic!("unexpected model: {:?}", model),
    }

    Ok(())
}

#[test]
fn insert_many_queues_in_order() -> MangroveResult<()> {
    let mut bulk = Bulk::<User>::new(BulkContext::new("db"));
    bulk.insert_many(&[
        User { name: "a".into() },
        User { name: "b".into() },
    ])?;

    let models = bulk.models()?;
    assert_eq!(models.len(), 2);
    for (model, name) in models.iter().zip(["a", "b"]) {
        match model {
            WriteModel::InsertOne { document, .. } => {
                assert_eq!(document.get_str("name").unwrap(), name);
            }
            other => panic!("unexpected model: {:?}", other),
        }
    }

    Ok(())
}

#[test]
fn insert_many_rejects_the_whole_batch_on_conversion_failure() -> MangroveResult<()> {
    #[derive(Debug, Serialize)]
    struct Counter {
        value: u64,
    }

    let mut bulk = ClusterBulk::new(BulkContext::new("db"), "coll");
    let error = bulk
        .insert_many(&[
            Counter { value: 1 },
            Counter { value: u64::MAX },
        ])
        .unwrap_err();

    assert_eq!(error.kind(), MangroveErrorKind::BsonNumberRepr);
    assert!(bulk.is_empty());

    Ok(())
}

#[test]
fn replace_goes_through_convert_and_save_hooks() -> MangroveResult<()> {
    let recorder = Recorder::default();
    let stamper = Stamper::default();
    let context = BulkContext::new("db")
        .with_event_sink(Box::new(recorder.clone()))
        .with_callbacks(Box::new(stamper.clone()));

    let mut bulk = Bulk::<User>::new(context);
    bulk.replace_one(doc!{ "name": "a" }, &User { name: "b".into() })?;

    match bulk.models()?.remove(0) {
        WriteModel::ReplaceOne { replacement, .. } => {
            assert_eq!(replacement.get_str("savedBy").unwrap(), "callback");
        }
        model => panic!("unexpected model: {:?}", model),
    }

    assert_eq!(recorder.entries(), vec![
        "BeforeConvert@db.user",
        "BeforeSave@db.user",
    ]);

    Ok(())
}
