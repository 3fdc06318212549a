//! Bounded dumping of inspected host values.
//!
//! Host values are described in a [`ValueArena`] (directly, or through the
//! [`Introspect`] trait) and turned into a [`SerializedValue`] by a
//! [`Dumper`] under four independent limits:
//! - `level_limit`: container nesting, at most [`MAX_LEVEL_LIMIT`]
//! - `items_count_limit`: children per container
//! - `item_size_limit`: characters per string or key
//! - `dump_size_limit`: approximate size of the JSON encoding
//!
//! Every limit hit is visible in the output as a marker.

mod dumper;
mod introspect;
mod serialized;
mod value;

pub use dumper::{
    Dumper, DumperLimits, DEFAULT_DUMP_SIZE_LIMIT, DEFAULT_ITEMS_COUNT_LIMIT,
    DEFAULT_ITEM_SIZE_LIMIT, DEFAULT_LEVEL_LIMIT, MAX_LEVEL_LIMIT,
};
pub use encoding_rs::Encoding;
pub use introspect::Introspect;
pub use serialized::{
    MappingEntry, PropertyEntry, SerializedValue, Truncation, TruncationReason, Visibility,
};
pub use value::{ArenaError, Node, NodeId, Property, Value, ValueArena};
