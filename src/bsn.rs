//! BSON serialization and deserialization helpers. This module is the
//! value-conversion seam of the crate: entities enter the bulk pipeline
//! through [`serialize_document`](fn.serialize_document.html).

use std::borrow::Borrow;
use std::convert::TryFrom;
use serde_json::Value;
use bson::{ Bson, Document };
use bson::document::ValueAccessError;
use serde::Serialize;
use crate::error::{ Error, ErrorKind, Result };

/// Methods for dynamically type-checking JSON.
pub trait JsonExt: Sized {
    /// Ensures that this tree of values doesn't contain integers
    /// which are not expressible by `i64` (e.g. too big `u64`s).
    /// The presence of such values would result in over- or underflow
    /// or truncation, leading to potentially hard-to-debug errors.
    ///
    /// If this check succeeds, `self` is converted into a `Bson` tree,
    /// honoring the extended JSON format (e.g. `$oid`). Preservation of
    /// the order of keys in maps is ensured by the `preserve_order`
    /// feature of the `serde_json` crate.
    fn try_into_bson(self) -> Result<Bson>;
}

/// Methods for dynamically type-checking BSON.
pub trait BsonExt: Sized {
    /// Ensures that the BSON value is a `Document` and unwraps it.
    fn try_into_doc(self) -> Result<Document>;
}

/// Checks every number in the tree for `i64`/`f64` representability.
fn check_numbers(value: &Value) -> Result<()> {
    match *value {
        Value::Number(ref n) => if n.is_i64() || n.is_f64() {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::BsonNumberRepr,
                format!("value `{}` can't be represented in BSON", n)
            ))
        },
        Value::Array(ref values) => values.iter().try_for_each(check_numbers),
        Value::Object(ref values) => values.values().try_for_each(check_numbers),
        _ => Ok(()),
    }
}

impl JsonExt for Value {
    fn try_into_bson(self) -> Result<Bson> {
        check_numbers(&self)?;
        Bson::try_from(self).map_err(From::from)
    }
}

impl BsonExt for Bson {
    fn try_into_doc(self) -> Result<Document> {
        match self {
            Bson::Document(doc) => Ok(doc),
            value => Err(Error::with_cause(
                format!("expected Document, got {:?}", value.element_type()),
                ValueAccessError::UnexpectedType,
            ))
        }
    }
}

/// Creates a BSON `Document` out of a serializable value.
pub fn serialize_document<T: Serialize>(value: &T) -> Result<Document> {
    serde_json::to_value(value)
        .map_err(From::from)
        .and_then(JsonExt::try_into_bson)
        .and_then(BsonExt::try_into_doc)
}

/// Creates an array of `Document`s from an iterator over serializable values.
pub fn serialize_documents<T, I>(values: I) -> Result<Vec<Document>>
    where T: Serialize,
          I: IntoIterator,
          I::Item: Borrow<T>,
{
    values
        .into_iter()
        .map(|val| serialize_document(val.borrow()))
        .collect()
}
