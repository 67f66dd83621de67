//! Helper types for making the construction of filter, update, etc. documents
//! a little less stringly-typed.

use std::fmt;
use bson::Bson;
use serde::{
    ser::{ Serialize, Serializer },
    de::{ Deserialize, Deserializer, Visitor },
};

/// Ordering, for specifying in which order to sort results yielded by a query
/// or which matching document an update/replace touches first.
/// ```
/// # use bson::doc;
/// # use mangrove::literal::Order;
/// #
/// let sorting = doc! {
///     "_id": Order::Ascending,
///     "zip": Order::Descending,
/// };
/// assert_eq!(sorting, doc!{
///     "_id":  1,
///     "zip": -1,
/// });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Order {
    /// Order smaller values first.
    Ascending  =  1,
    /// Order greater values first.
    Descending = -1,
}

/// The default ordering is `Ascending`.
impl Default for Order {
    fn default() -> Self {
        Order::Ascending
    }
}

/// This impl is provided so that you can use these more expressive ordering
/// names instead of the not very clear `1` and `-1` when constructing literal
/// BSON sort documents.
impl From<Order> for Bson {
    fn from(order: Order) -> Self {
        Bson::Int32(order as _)
    }
}

impl Serialize for Order {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_i32(*self as _)
    }
}

/// ```
/// # use bson::{ Bson, from_bson };
/// # use mangrove::prelude::*;
/// #
/// # fn main() -> MangroveResult<()> {
/// #
/// let asc_i32 = Bson::Int32(1);
/// let desc_i64 = Bson::Int64(-1);
/// let bad_i32 = Bson::Int32(0);
///
/// assert_eq!(from_bson::<Order>(asc_i32)?, Order::Ascending);
/// assert_eq!(from_bson::<Order>(desc_i64)?, Order::Descending);
/// assert!(from_bson::<Order>(bad_i32)
///         .unwrap_err()
///         .to_string()
///         .contains("invalid ordering"));
/// #
/// # Ok(())
/// # }
/// ```
impl<'a> Deserialize<'a> for Order {
    fn deserialize<D: Deserializer<'a>>(de: D) -> Result<Self, D::Error> {
        de.deserialize_i32(OrderVisitor)
    }
}

/// A serde visitor that produces an `Order` from +1 or -1.
struct OrderVisitor;

impl<'a> Visitor<'a> for OrderVisitor {
    type Value = Order;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "an integer expressing ordering: {} or {}",
            Order::Ascending as i32,
            Order::Descending as i32,
        )
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
        if v == Order::Ascending as i64 {
            Ok(Order::Ascending)
        } else if v == Order::Descending as i64 {
            Ok(Order::Descending)
        } else {
            Err(E::custom(format!("invalid ordering: {}", v)))
        }
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
        if v == Order::Ascending as u64 {
            Ok(Order::Ascending)
        } else {
            Err(E::custom(format!("invalid ordering: {}", v)))
        }
    }

    #[allow(clippy::float_cmp, clippy::cast_lossless, clippy::cast_precision_loss)]
    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if v == Order::Ascending as i32 as f64 {
            Ok(Order::Ascending)
        } else if v == Order::Descending as i32 as f64 {
            Ok(Order::Descending)
        } else {
            Err(E::custom(format!("invalid ordering: {}", v)))
        }
    }
}
