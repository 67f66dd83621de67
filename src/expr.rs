//! Translation of aggregation method references to native operator
//! expressions.
//!
//! A *method reference* is the call-syntax spelling of an aggregation
//! operator, e.g. `dateDiff(purchase, delivery, "day")`. This module owns
//! the static, build-once lookup table from method names to
//! [`MethodReference`](struct.MethodReference.html) descriptors: the native
//! operator name, the shape its arguments serialize to, and, for
//! document-shaped operators, the ordered parameter names.
//!
//! Lookup is by the method *name*; anything from the first `(` on is
//! ignored. An unknown name is not an error, it simply yields `None` so the
//! caller can fall back to treating the expression as something else
//! (a field path, a literal, and so on).

use std::collections::HashMap;
use bson::{ Bson, Document };
use lazy_static::lazy_static;
use crate::error::{ Error, ErrorKind, Result };

/// How the arguments of an aggregation operator are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentMap {
    /// The single argument is the operator's value, verbatim.
    Single,
    /// The arguments form an ordered array.
    Array,
    /// The arguments fill a document, keyed by the declared parameter
    /// names in order.
    Map,
    /// The operator takes no arguments; its value is the empty document.
    EmptyDocument,
}

/// One entry of the method reference table: everything needed to render a
/// call-syntax aggregation method as its native operator expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodReference {
    /// The native operator name, `$` prefix included.
    operator: &'static str,
    /// The wire shape of the operator's arguments.
    argument_map: ArgumentMap,
    /// The ordered document keys for `Map`-shaped operators; empty
    /// otherwise.
    parameters: &'static [&'static str],
}

impl MethodReference {
    /// Creates a reference with the given operator and argument shape and
    /// no declared parameters.
    pub const fn new(operator: &'static str, argument_map: ArgumentMap) -> Self {
        MethodReference {
            operator,
            argument_map,
            parameters: &[],
        }
    }

    /// Declares the ordered parameter names a `Map`-shaped operator keys
    /// its arguments by.
    ///
    /// # Panics
    ///
    /// Panics unless the argument shape is `Map` and at least one
    /// parameter name is given. The table is built once at first use, so a
    /// malformed entry blows up at load time rather than at lookup time.
    pub fn mapping_parameters_to(mut self, parameters: &'static [&'static str]) -> Self {
        assert!(
            self.argument_map == ArgumentMap::Map,
            "`{}` doesn't map its arguments to parameters",
            self.operator,
        );
        assert!(
            !parameters.is_empty(),
            "`{}` declares no parameter names",
            self.operator,
        );
        self.parameters = parameters;
        self
    }

    /// The native operator name, `$` prefix included.
    pub fn operator(&self) -> &'static str {
        self.operator
    }

    /// The wire shape of the operator's arguments.
    pub fn argument_map(&self) -> ArgumentMap {
        self.argument_map
    }

    /// The ordered parameter names of a `Map`-shaped operator.
    pub fn parameters(&self) -> &'static [&'static str] {
        self.parameters
    }

    /// Lays out already-rendered arguments in this reference's wire shape:
    /// the operator's value in `{ "$op": <value> }`.
    ///
    /// Errs with kind `ArgumentShape` when the argument count doesn't fit
    /// the declared shape. `Map`-shaped operators accept *fewer* arguments
    /// than declared parameters (trailing parameters are optional), never
    /// more.
    pub fn serialize_arguments(&self, mut arguments: Vec<Bson>) -> Result<Bson> {
        match self.argument_map {
            ArgumentMap::Single => {
                if arguments.len() == 1 {
                    Ok(arguments.remove(0))
                } else {
                    Err(self.shape_error(arguments.len(), "exactly 1 argument"))
                }
            }
            ArgumentMap::Array => Ok(Bson::Array(arguments)),
            ArgumentMap::Map => {
                if arguments.len() > self.parameters.len() {
                    return Err(self.shape_error(
                        arguments.len(),
                        "no more arguments than declared parameters",
                    ));
                }
                let doc: Document = self.parameters
                    .iter()
                    .zip(arguments)
                    .map(|(&name, value)| (name.to_owned(), value))
                    .collect();
                Ok(Bson::Document(doc))
            }
            ArgumentMap::EmptyDocument => {
                if arguments.is_empty() {
                    Ok(Bson::Document(Document::new()))
                } else {
                    Err(self.shape_error(arguments.len(), "no arguments"))
                }
            }
        }
    }

    /// Builds the `ArgumentShape` error for a bad argument count.
    fn shape_error(&self, actual: usize, expected: &str) -> Error {
        Error::new(
            ErrorKind::ArgumentShape,
            format!("`{}` takes {}, got {}", self.operator, expected, actual),
        )
    }
}

/// Looks up the method reference for a call-syntax signature. Only the
/// method name matters; the argument list, starting at the first `(`, is
/// ignored. Unknown names yield `None`.
///
/// ```
/// # use mangrove::expr::{ method_reference, ArgumentMap };
/// #
/// let date_diff = method_reference("dateDiff(purchase, delivery, 'day')")
///     .unwrap();
/// assert_eq!(date_diff.operator(), "$dateDiff");
/// assert_eq!(date_diff.argument_map(), ArgumentMap::Map);
///
/// assert!(method_reference("bogusOperator(1, 2)").is_none());
/// ```
pub fn method_reference(signature: &str) -> Option<&'static MethodReference> {
    let name = match signature.find('(') {
        Some(index) => &signature[..index],
        None => signature,
    };
    METHOD_REFERENCES.get(name)
}

/// Iterates over every `(method name, reference)` pair of the table.
pub fn method_references() -> impl Iterator<Item = (&'static str, &'static MethodReference)> {
    METHOD_REFERENCES.iter().map(|(&name, reference)| (name, reference))
}

/// Method names whose single argument is the operator's value, verbatim.
static SINGLE_VALUE: &[(&str, &str)] = &[
    // arithmetic
    ("abs",              "$abs"),
    ("ceil",             "$ceil"),
    ("exp",              "$exp"),
    ("floor",            "$floor"),
    ("ln",               "$ln"),
    ("log10",            "$log10"),
    ("sqrt",             "$sqrt"),
    // trigonometry
    ("sin",              "$sin"),
    ("cos",              "$cos"),
    ("tan",              "$tan"),
    ("asin",             "$asin"),
    ("acos",             "$acos"),
    ("atan",             "$atan"),
    ("sinh",             "$sinh"),
    ("cosh",             "$cosh"),
    ("tanh",             "$tanh"),
    ("asinh",            "$asinh"),
    ("acosh",            "$acosh"),
    ("atanh",            "$atanh"),
    ("degreesToRadians", "$degreesToRadians"),
    ("radiansToDegrees", "$radiansToDegrees"),
    // arrays and objects
    ("arrayToObject",    "$arrayToObject"),
    ("objectToArray",    "$objectToArray"),
    ("first",            "$first"),
    ("last",             "$last"),
    ("isArray",          "$isArray"),
    ("reverseArray",     "$reverseArray"),
    ("size",             "$size"),
    // boolean
    ("not",              "$not"),
    // dates
    ("dayOfMonth",       "$dayOfMonth"),
    ("dayOfWeek",        "$dayOfWeek"),
    ("dayOfYear",        "$dayOfYear"),
    ("hour",             "$hour"),
    ("minute",           "$minute"),
    ("second",           "$second"),
    ("millisecond",      "$millisecond"),
    ("month",            "$month"),
    ("week",             "$week"),
    ("year",             "$year"),
    ("isoDayOfWeek",     "$isoDayOfWeek"),
    ("isoWeek",          "$isoWeek"),
    ("isoWeekYear",      "$isoWeekYear"),
    ("toDate",           "$toDate"),
    ("tsIncrement",      "$tsIncrement"),
    ("tsSecond",         "$tsSecond"),
    // strings
    ("strLenBytes",      "$strLenBytes"),
    ("strLenCP",         "$strLenCP"),
    ("toLower",          "$toLower"),
    ("toUpper",          "$toUpper"),
    // type handling
    ("isNumber",         "$isNumber"),
    ("toBool",           "$toBool"),
    ("toDecimal",        "$toDecimal"),
    ("toDouble",         "$toDouble"),
    ("toInt",            "$toInt"),
    ("toLong",           "$toLong"),
    ("toObjectId",       "$toObjectId"),
    ("toString",         "$toString"),
    ("type",             "$type"),
    // miscellaneous
    ("literal",          "$literal"),
    ("meta",             "$meta"),
    ("sampleRate",       "$sampleRate"),
    ("bitNot",           "$bitNot"),
];

/// Method names whose arguments form an ordered array.
static ARRAY_VALUE: &[(&str, &str)] = &[
    // arithmetic
    ("add",             "$add"),
    ("divide",          "$divide"),
    ("log",             "$log"),
    ("mod",             "$mod"),
    ("multiply",        "$multiply"),
    ("pow",             "$pow"),
    ("round",           "$round"),
    ("subtract",        "$subtract"),
    ("trunc",           "$trunc"),
    ("atan2",           "$atan2"),
    // boolean
    ("and",             "$and"),
    ("or",              "$or"),
    // comparison
    ("cmp",             "$cmp"),
    ("eq",              "$eq"),
    ("gt",              "$gt"),
    ("gte",             "$gte"),
    ("lt",              "$lt"),
    ("lte",             "$lte"),
    ("ne",              "$ne"),
    ("ifNull",          "$ifNull"),
    // arrays
    ("arrayElemAt",     "$arrayElemAt"),
    ("concatArrays",    "$concatArrays"),
    ("in",              "$in"),
    ("indexOfArray",    "$indexOfArray"),
    ("range",           "$range"),
    ("slice",           "$slice"),
    // sets
    ("allElementsTrue", "$allElementsTrue"),
    ("anyElementTrue",  "$anyElementTrue"),
    ("setDifference",   "$setDifference"),
    ("setEquals",       "$setEquals"),
    ("setIntersection", "$setIntersection"),
    ("setIsSubset",     "$setIsSubset"),
    ("setUnion",        "$setUnion"),
    // objects
    ("mergeObjects",    "$mergeObjects"),
    // strings
    ("concat",          "$concat"),
    ("indexOfBytes",    "$indexOfBytes"),
    ("indexOfCP",       "$indexOfCP"),
    ("split",           "$split"),
    ("strcasecmp",      "$strcasecmp"),
    ("substr",          "$substr"),
    ("substrBytes",     "$substrBytes"),
    ("substrCP",        "$substrCP"),
    // accumulators usable in expressions
    ("avg",             "$avg"),
    ("max",             "$max"),
    ("min",             "$min"),
    ("stdDevPop",       "$stdDevPop"),
    ("stdDevSamp",      "$stdDevSamp"),
    ("sum",             "$sum"),
    // bitwise
    ("bitAnd",          "$bitAnd"),
    ("bitOr",           "$bitOr"),
    ("bitXor",          "$bitXor"),
];

/// Method names taking no arguments; the operator's value is `{}`.
static EMPTY_DOCUMENT: &[(&str, &str)] = &[
    ("rand", "$rand"),
];

/// Method names whose arguments fill a document, keyed by the declared
/// parameter names in order. Trailing parameters are optional.
static MAPPED_VALUE: &[(&str, &str, &[&str])] = &[
    // arrays
    ("filter",         "$filter",         &["input", "as", "cond", "limit"]),
    ("reduce",         "$reduce",         &["input", "initialValue", "in"]),
    ("sortArray",      "$sortArray",      &["input", "sortBy"]),
    ("zip",            "$zip",            &["inputs", "useLongestLength", "defaults"]),
    ("map",            "$map",            &["input", "as", "in"]),
    // conditional
    ("cond",           "$cond",           &["if", "then", "else"]),
    ("switch",         "$switch",         &["branches", "default"]),
    // dates
    ("dateAdd",        "$dateAdd",        &["startDate", "unit", "amount", "timezone"]),
    ("dateDiff",       "$dateDiff",       &["startDate", "endDate", "unit", "timezone", "startOfWeek"]),
    ("dateSubtract",   "$dateSubtract",   &["startDate", "unit", "amount", "timezone"]),
    ("dateFromParts",  "$dateFromParts",  &["year", "month", "day", "hour", "minute", "second", "millisecond", "timezone"]),
    ("dateFromString", "$dateFromString", &["dateString", "format", "timezone", "onError", "onNull"]),
    ("dateToParts",    "$dateToParts",    &["date", "timezone", "iso8601"]),
    ("dateToString",   "$dateToString",   &["date", "format", "timezone", "onNull"]),
    ("dateTrunc",      "$dateTrunc",      &["date", "unit", "binSize", "timezone", "startOfWeek"]),
    // strings
    ("ltrim",          "$ltrim",          &["input", "chars"]),
    ("rtrim",          "$rtrim",          &["input", "chars"]),
    ("trim",           "$trim",           &["input", "chars"]),
    ("regexFind",      "$regexFind",      &["input", "regex", "options"]),
    ("regexFindAll",   "$regexFindAll",   &["input", "regex", "options"]),
    ("regexMatch",     "$regexMatch",     &["input", "regex", "options"]),
    ("replaceOne",     "$replaceOne",     &["input", "find", "replacement"]),
    ("replaceAll",     "$replaceAll",     &["input", "find", "replacement"]),
    // type handling
    ("convert",        "$convert",        &["input", "to", "onError", "onNull"]),
    // field access
    ("getField",       "$getField",       &["field", "input"]),
    ("setField",       "$setField",       &["field", "input", "value"]),
    ("unsetField",     "$unsetField",     &["field", "input"]),
    // accumulators usable in expressions
    ("bottom",         "$bottom",         &["output", "sortBy"]),
    ("bottomN",        "$bottomN",        &["n", "output", "sortBy"]),
    ("top",            "$top",            &["output", "sortBy"]),
    ("topN",           "$topN",           &["n", "output", "sortBy"]),
    ("firstN",         "$firstN",         &["n", "input"]),
    ("lastN",          "$lastN",          &["n", "input"]),
    ("maxN",           "$maxN",           &["n", "input"]),
    ("minN",           "$minN",           &["n", "input"]),
    ("median",         "$median",         &["input", "method"]),
    ("percentile",     "$percentile",     &["input", "p", "method"]),
    // variables
    ("let",            "$let",            &["vars", "in"]),
];

lazy_static! {
    /// The build-once method name lookup table. Malformed `Map` entries
    /// panic here, at first use.
    static ref METHOD_REFERENCES: HashMap<&'static str, MethodReference> = {
        let mut map = HashMap::with_capacity(
            SINGLE_VALUE.len() + ARRAY_VALUE.len()
            + EMPTY_DOCUMENT.len() + MAPPED_VALUE.len()
        );

        for &(name, operator) in SINGLE_VALUE {
            map.insert(name, MethodReference::new(operator, ArgumentMap::Single));
        }
        for &(name, operator) in ARRAY_VALUE {
            map.insert(name, MethodReference::new(operator, ArgumentMap::Array));
        }
        for &(name, operator) in EMPTY_DOCUMENT {
            map.insert(name, MethodReference::new(operator, ArgumentMap::EmptyDocument));
        }
        for &(name, operator, parameters) in MAPPED_VALUE {
            map.insert(
                name,
                MethodReference::new(operator, ArgumentMap::Map)
                    .mapping_parameters_to(parameters),
            );
        }

        map
    };
}
