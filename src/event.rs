//! Lifecycle notifications and entity callbacks fired while a bulk
//! pipeline maps and prepares its items.
//!
//! Both collaborators are optional on the context: when absent, the
//! pipeline skips them with a cheap `Option` check. Events are pure
//! notifications; callbacks participate in the data path and may rewrite
//! the document they are handed.

use bson::Document;
use crate::{
    ns::Namespace,
    error::Result,
};

/// Which point of an item's lifecycle an event or callback belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteEventKind {
    /// The source object is about to be converted to its wire form.
    BeforeConvert,
    /// The wire-ready document is about to be handed to the write.
    BeforeSave,
    /// The write completed successfully.
    AfterSave,
}

/// A lifecycle notification, published to the configured
/// [`EventSink`](trait.EventSink.html) if one is present.
#[derive(Debug, Clone, Copy)]
pub struct WriteEvent<'a> {
    /// The lifecycle point this event marks.
    pub kind: WriteEventKind,
    /// The destination of the write the event belongs to.
    pub namespace: &'a Namespace,
    /// The document in its current shape, when one exists at this point.
    pub document: Option<&'a Document>,
}

/// The event-publishing collaborator. Publishing is a notification with no
/// way to veto or alter the write, hence infallible.
pub trait EventSink {
    /// Publishes one lifecycle event.
    fn publish(&self, event: WriteEvent<'_>);
}

/// Lifecycle phases an entity callback can be registered for. Mirrors
/// [`WriteEventKind`](enum.WriteEventKind.html), but kept separate because
/// callbacks see (and may rewrite) the document while events only observe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackPhase {
    /// Before the source object is converted to its wire form.
    BeforeConvert,
    /// Before the wire-ready document is handed to the write.
    BeforeSave,
    /// After the write completed successfully.
    AfterSave,
}

/// The entity-callback collaborator. Invoked with the document in its
/// current shape and the destination namespace; returns the (possibly
/// rewritten) document to carry forward.
pub trait EntityCallbacks {
    /// Invokes the callbacks registered for `phase`.
    fn invoke(&self, phase: CallbackPhase, document: Document, namespace: &Namespace) -> Result<Document>;
}
