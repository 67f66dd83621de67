//! # Mangrove: strongly-typed bulk writes for MongoDB-shaped data
//!
//! This library lets you queue heterogeneous write operations — inserts,
//! updates, upserts, replacements and removals — against one or several
//! collections, run them through a uniform mapping and lifecycle-hook
//! pipeline, and hand the resulting wire-level models to whatever actually
//! executes the bulk write. It also knows how to translate call-syntax
//! aggregation *method references* (e.g. `dateDiff(...)`) into their native
//! operator expressions.
//!
//! Mangrove never talks to the network itself. The
//! [`BulkExecutor`](write/trait.BulkExecutor.html) trait is the seam behind
//! which a concrete driver (blocking or reactive) lives, so everything in
//! this crate is testable without a running database.
//!
//! ### The Prelude
//!
//! Let's get this one out of the way quickly. The most useful and most
//! frequently utilized types from Mangrove as well as the `bson` crate are
//! publicly re-exported under the module [`prelude`](prelude/index.html).
//! Therefore, for most purposes, it's enough to import the library in your
//! code like this:
//!
//! ```rust
//! use mangrove::prelude::*;
//! ```
//!
//! ### Documents and collection-scoped bulks
//!
//! The first step is defining your domain model / entity types. Transcoding
//! them to BSON is handled by Serde and the BSON crate. Any `Serialize`
//! type with a globally-unique collection name can be a top-level entity;
//! these constraints are captured by the [`Doc`](doc/trait.Doc.html) trait:
//!
//! ```
//! # use serde_derive::Serialize;
//! # use mangrove::prelude::*;
//! #
//! #[derive(Debug, Serialize)]
//! struct Product {
//!     name: String,
//!     num_employees: usize,
//! }
//!
//! impl Doc for Product {
//!     const NAME: &'static str = "Product";
//! }
//! ```
//!
//! A [`Bulk`](bulk/struct.Bulk.html) is scoped to the collection of one
//! `Doc` type. Operations are queued in order and materialized into
//! wire-level [`WriteModel`](write/enum.WriteModel.html)s on demand:
//!
//! ```
//! # use serde_derive::Serialize;
//! # use mangrove::prelude::*;
//! # use mangrove::pipeline::BulkContext;
//! #
//! # #[derive(Debug, Serialize)]
//! # struct Product {
//! #     name: String,
//! #     num_employees: usize,
//! # }
//! #
//! # impl Doc for Product {
//! #     const NAME: &'static str = "Product";
//! # }
//! #
//! # fn main() -> MangroveResult<()> {
//! #
//! let mut bulk = Bulk::<Product>::new(BulkContext::new("inventory"));
//!
//! bulk.insert(&Product { name: "SuperProduct".into(), num_employees: 99 })?;
//! bulk.remove(doc!{ "num_employees": { "$lt": 10 } })?;
//!
//! let models = bulk.models()?;
//! assert_eq!(models.len(), 2);
//! assert_eq!(models[0].namespace().to_string(), "inventory.Product");
//! #
//! # Ok(())
//! # }
//! ```
//!
//! Updates, upserts and deletions are expressed as strongly-typed operation
//! objects implementing the [`Update`](ops/trait.Update.html),
//! [`Upsert`](ops/trait.Upsert.html) and [`Delete`](ops/trait.Delete.html)
//! traits from the [`ops`](ops/index.html) module, instead of ad-hoc filter
//! documents pasted together at every call site. (For deletions, a raw
//! filter `Document` works too.)
//!
//! ### Namespace-aware bulks
//!
//! A [`ClusterBulk`](bulk/struct.ClusterBulk.html) may span collections and
//! databases. It keeps a *current* namespace; every queued operation
//! captures it **by value**, so repositioning the bulk afterwards never
//! retargets an already-queued operation:
//!
//! ```
//! # use mangrove::prelude::*;
//! # use mangrove::pipeline::BulkContext;
//! #
//! # fn main() -> MangroveResult<()> {
//! #
//! let mut bulk = ClusterBulk::new(BulkContext::new("db1"), "coll1");
//!
//! bulk.insert(&doc!{ "name": "a" })?;
//! bulk.in_collection("coll2");
//! bulk.remove(doc!{ "name": "a" })?;
//!
//! let models = bulk.models()?;
//! assert_eq!(models[0].namespace().to_string(), "db1.coll1");
//! assert_eq!(models[1].namespace().to_string(), "db1.coll2");
//! #
//! # Ok(())
//! # }
//! ```
//!
//! ### The item lifecycle
//!
//! Every queued operation goes through three phases, driven by the
//! [`pipeline`](pipeline/index.html) module:
//!
//! 1. **map**, eagerly at queueing time: entities are serialized and run
//!    through the "before convert" hooks, filters and updates through the
//!    configured [`QueryMapper`](pipeline/trait.QueryMapper.html);
//! 2. **prepare**, when `models()` is called: the "before save" hooks fire
//!    and each item becomes one wire-level model, advancing to its
//!    *prepared* state, which holds the document exactly as handed to the
//!    write;
//! 3. **finish**, after the executor reported success: the "after save"
//!    hooks fire, with the prepared (written) document.
//!
//! Lifecycle hooks come in two flavors, both optional on the
//! [`BulkContext`](pipeline/struct.BulkContext.html): an
//! [`EventSink`](event/trait.EventSink.html) observes documents without
//! being able to alter anything, while
//! [`EntityCallbacks`](event/trait.EntityCallbacks.html) participate in
//! the data path and may rewrite the document they are handed.
//!
//! Each phase transform returns a *new* item; an item is never mutated in
//! place, and asking a pre-map item for phase-dependent state yields an
//! error of kind `IllegalState` rather than garbage.
//!
//! ### Aggregation method references
//!
//! The [`expr`](expr/index.html) module owns a static table translating
//! call-syntax method names to native aggregation operators, together with
//! the wire shape of their arguments:
//!
//! ```
//! # use mangrove::expr::{ method_reference, ArgumentMap };
//! #
//! let date_diff = method_reference("dateDiff(purchase, delivery, 'day')")
//!     .unwrap();
//! assert_eq!(date_diff.operator(), "$dateDiff");
//! assert_eq!(date_diff.argument_map(), ArgumentMap::Map);
//! assert_eq!(date_diff.parameters()[0], "startDate");
//!
//! // unknown names are not an error
//! assert!(method_reference("totallyMadeUp(42)").is_none());
//! ```
//!
//! ### Threading
//!
//! Bulks and pipelines are deliberately **not** thread-safe: a bulk
//! represents one logical operation sequence, and its state machine
//! (current namespace, queued items) would be meaningless if interleaved
//! across threads. Create one bulk per sequence; the immutable collaborators
//! behind the context can be shared freely by the types implementing them.

#![doc(html_root_url = "https://docs.rs/mangrove/0.1.0")]
#![deny(missing_debug_implementations, missing_copy_implementations,
        trivial_casts, trivial_numeric_casts,
        unsafe_code,
        unstable_features,
        anonymous_parameters, bare_trait_objects,
        unused_import_braces, unused_qualifications, missing_docs)]
#![allow(clippy::single_match, clippy::match_same_arms, clippy::match_ref_pats,
         clippy::clone_on_ref_ptr, clippy::needless_pass_by_value)]
#![deny(clippy::used_underscore_binding,
        clippy::similar_names,
        clippy::missing_docs_in_private_items,
        clippy::non_ascii_literal, clippy::unicode_not_nfc,
        clippy::unwrap_used,
        clippy::map_unwrap_or,
        clippy::shadow_unrelated, clippy::shadow_reuse, clippy::shadow_same,
        clippy::int_plus_one, clippy::string_add_assign, clippy::if_not_else,
        clippy::invalid_upcast_comparisons,
        clippy::cast_precision_loss, clippy::cast_lossless,
        clippy::cast_possible_wrap, clippy::cast_possible_truncation,
        clippy::mutex_integer, clippy::mut_mut, clippy::items_after_statements,
        clippy::print_stdout, clippy::mem_forget, clippy::maybe_infinite_iter)]

pub mod error;
pub mod bsn;
pub mod ns;
pub mod doc;
pub mod ops;
pub mod literal;
pub mod event;
pub mod write;
pub mod pipeline;
pub mod bulk;
pub mod expr;
pub mod prelude;
