use std::collections::HashSet;

use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};

use crate::introspect::Introspect;
use crate::serialized::{
    MappingEntry, PropertyEntry, SerializedValue, Truncation, TruncationReason,
};
use crate::value::{Node, NodeId, Property, Value, ValueArena};

pub const DEFAULT_LEVEL_LIMIT: usize = 5;
pub const DEFAULT_ITEMS_COUNT_LIMIT: usize = 100;
pub const DEFAULT_ITEM_SIZE_LIMIT: usize = 50_000;
pub const DEFAULT_DUMP_SIZE_LIMIT: usize = 500_000;
/// Hard ceiling on `level_limit`. The traversal recurses once per level.
pub const MAX_LEVEL_LIMIT: usize = 64;

/// Class name used for callables when callback detection is off.
const CALLABLE_CLASS: &str = "callable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumperLimits {
    /// Maximum container nesting. Containers below it become `Truncated`
    /// markers. Values above [`MAX_LEVEL_LIMIT`] are clamped.
    pub level_limit: usize,
    /// Maximum children dumped per container.
    pub items_count_limit: usize,
    /// Maximum characters of any string or mapping key.
    pub item_size_limit: usize,
    /// Approximate budget for the JSON encoding of the whole dump.
    pub dump_size_limit: usize,
}

impl Default for DumperLimits {
    fn default() -> Self {
        Self {
            level_limit: DEFAULT_LEVEL_LIMIT,
            items_count_limit: DEFAULT_ITEMS_COUNT_LIMIT,
            item_size_limit: DEFAULT_ITEM_SIZE_LIMIT,
            dump_size_limit: DEFAULT_DUMP_SIZE_LIMIT,
        }
    }
}

/// Converts host values into bounded [`SerializedValue`] trees.
///
/// Dumping is total: dangling node ids and opaque nodes become `Unreadable`
/// markers, cycles become a single `Circular` marker at the point where the
/// path re-enters a node, and every limit hit leaves a visible marker.
#[derive(Debug, Clone)]
pub struct Dumper {
    limits: DumperLimits,
    detect_callbacks: bool,
    encoding: &'static Encoding,
}

impl Default for Dumper {
    fn default() -> Self {
        Self::new(DumperLimits::default())
    }
}

impl Dumper {
    pub fn new(mut limits: DumperLimits) -> Self {
        limits.level_limit = limits.level_limit.min(MAX_LEVEL_LIMIT);
        Self {
            limits,
            detect_callbacks: true,
            encoding: UTF_8,
        }
    }

    pub fn with_detect_callbacks(mut self, detect_callbacks: bool) -> Self {
        self.detect_callbacks = detect_callbacks;
        self
    }

    /// Encoding used to decode `Value::Bytes`.
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn limits(&self) -> DumperLimits {
        self.limits
    }

    pub fn detect_callbacks(&self) -> bool {
        self.detect_callbacks
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn dump(&self, arena: &ValueArena, value: &Value) -> SerializedValue {
        let mut state = DumpState {
            dumper: self,
            arena,
            path: HashSet::new(),
            size: 0,
            exhausted: false,
        };
        state.value(value, 0)
    }

    /// Introspect `value` into a scratch arena and dump it.
    pub fn dump_value<T: Introspect + ?Sized>(&self, value: &T) -> SerializedValue {
        let mut arena = ValueArena::new();
        let root = value.introspect(&mut arena);
        self.dump(&arena, &root)
    }

    /// Decode raw bytes with the configured server encoding.
    pub fn decode_bytes(&self, bytes: &[u8]) -> String {
        let (text, _, _) = self.encoding.decode(bytes);
        text.into_owned()
    }
}

struct DumpState<'a> {
    dumper: &'a Dumper,
    arena: &'a ValueArena,
    /// Nodes on the current traversal path.
    path: HashSet<NodeId>,
    size: usize,
    exhausted: bool,
}

/// Encoded sizes of the fixed parts of each `SerializedValue` shape, in
/// compact JSON. Charged against `dump_size_limit` so the budget tracks the
/// bytes the client actually receives.
mod cost {
    pub const NULL: usize = 15;
    pub const BOOL: usize = 29;
    pub const INT: usize = 23;
    pub const FLOAT: usize = 50;
    pub const STRING: usize = 28;
    pub const STRING_TRUNCATED: usize = 13;
    pub const SEQUENCE: usize = 37;
    pub const MAPPING: usize = 38;
    pub const ENTRY: usize = 19;
    pub const OBJECT: usize = 44;
    pub const PROPERTY: usize = 45;
    pub const CALLABLE: usize = 34;
    pub const TRUNCATION: usize = 48;
    pub const MARKER: usize = 55;
    pub const SEPARATOR: usize = 1;
}

/// Longest class or type name copied into a marker summary.
const SUMMARY_CHARS: usize = 64;

impl DumpState<'_> {
    fn limits(&self) -> &DumperLimits {
        &self.dumper.limits
    }

    /// Reserve `cost` bytes of the dump budget. Once a reservation fails every
    /// later one fails too, so the rest of the traversal degrades to markers.
    fn charge(&mut self, cost: usize) -> bool {
        if self.exhausted {
            return false;
        }
        let next = self.size.saturating_add(cost);
        if next > self.limits().dump_size_limit {
            self.exhausted = true;
            return false;
        }
        self.size = next;
        true
    }

    /// Markers are always emitted; charging them only moves the budget.
    fn marker(&mut self, value: SerializedValue) -> SerializedValue {
        let summary_len = match &value {
            SerializedValue::Truncated { summary, .. }
            | SerializedValue::Circular { summary }
            | SerializedValue::Unreadable { summary } => json_str_len(summary),
            _ => 0,
        };
        self.charge(cost::MARKER + summary_len);
        value
    }

    fn overflow(&mut self, summary: String) -> SerializedValue {
        self.marker(SerializedValue::Truncated {
            reason: TruncationReason::DumpSize,
            summary,
        })
    }

    /// `depth` is the number of containers already entered above `value`.
    fn value(&mut self, value: &Value, depth: usize) -> SerializedValue {
        match value {
            Value::Null => self.scalar(cost::NULL, "null", SerializedValue::Null),
            Value::Bool(v) => self.scalar(cost::BOOL, "bool", SerializedValue::Bool { value: *v }),
            Value::Int(v) => {
                let cost = cost::INT + v.to_string().len();
                self.scalar(cost, "int", SerializedValue::Int { value: *v })
            }
            Value::UInt(v) => {
                let cost = cost::INT + 1 + v.to_string().len();
                self.scalar(cost, "uint", SerializedValue::UInt { value: *v })
            }
            Value::Float(v) => match non_finite_repr(*v) {
                Some(repr) => self.string(repr),
                None => self.scalar(cost::FLOAT, "float", SerializedValue::Float { value: *v }),
            },
            Value::Str(s) => self.string(s),
            Value::Bytes(bytes) => {
                let text = self.dumper.decode_bytes(bytes);
                self.string(&text)
            }
            Value::Node(id) => self.node(*id, depth),
        }
    }

    fn scalar(&mut self, cost: usize, kind: &str, value: SerializedValue) -> SerializedValue {
        if self.charge(cost) {
            value
        } else {
            self.overflow(kind.to_string())
        }
    }

    fn string(&mut self, s: &str) -> SerializedValue {
        let (value, truncated) = cut_chars(s, self.limits().item_size_limit);
        let mut cost = cost::STRING + json_str_len(&value);
        if let Some(omitted) = truncated {
            cost += cost::STRING_TRUNCATED + omitted.to_string().len();
        }
        if !self.charge(cost) {
            return self.overflow(format!("string({})", s.chars().count()));
        }
        SerializedValue::String { value, truncated }
    }

    fn node(&mut self, id: NodeId, depth: usize) -> SerializedValue {
        let arena = self.arena;
        let Some(node) = arena.get(id) else {
            return self.marker(SerializedValue::Unreadable {
                summary: format!("unknown node {id}"),
            });
        };

        match node {
            Node::Opaque { .. } => self.marker(SerializedValue::Unreadable {
                summary: summarize(node),
            }),
            Node::Callable { name } if self.dumper.detect_callbacks => {
                let (name, _) = cut_chars(name, self.limits().item_size_limit);
                let reference = format!("(callback {name})");
                if !self.charge(cost::CALLABLE + json_str_len(&reference)) {
                    return self.overflow(summarize(node));
                }
                SerializedValue::Callable { reference }
            }
            _ => self.container(id, node, depth),
        }
    }

    fn container(&mut self, id: NodeId, node: &Node, depth: usize) -> SerializedValue {
        if self.path.contains(&id) {
            return self.marker(SerializedValue::Circular {
                summary: summarize(node),
            });
        }
        if depth >= self.limits().level_limit {
            return self.marker(SerializedValue::Truncated {
                reason: TruncationReason::Level,
                summary: summarize(node),
            });
        }

        self.path.insert(id);
        let dumped = match node {
            Node::Sequence(items) => self.sequence(items, depth + 1),
            Node::Mapping(entries) => self.mapping(entries, depth + 1),
            Node::Object { class, properties } => self.object(class, properties, depth + 1),
            Node::Callable { .. } => self.object(CALLABLE_CLASS, &[], depth + 1),
            Node::Opaque { .. } => Some(SerializedValue::Unreadable {
                summary: summarize(node),
            }),
        };
        self.path.remove(&id);
        dumped.unwrap_or_else(|| self.overflow(summarize(node)))
    }

    /// Returns the truncation to record before dumping child `index` of
    /// `len`, if the container must stop there.
    fn stop_before(&self, index: usize, len: usize) -> Option<Truncation> {
        let reason = if index >= self.limits().items_count_limit {
            TruncationReason::ItemsCount
        } else if self.exhausted {
            TruncationReason::DumpSize
        } else {
            return None;
        };
        Some(Truncation {
            reason,
            omitted: len - index,
        })
    }

    /// The truncation field is recorded even past the budget; an omitted
    /// count is never hidden.
    fn record(&mut self, truncation: Truncation) -> Option<Truncation> {
        self.size = self
            .size
            .saturating_add(cost::TRUNCATION + truncation.omitted.to_string().len());
        Some(truncation)
    }

    fn sequence(&mut self, items: &[Value], depth: usize) -> Option<SerializedValue> {
        if !self.charge(cost::SEQUENCE + items.len().to_string().len()) {
            return None;
        }
        let mut out = Vec::new();
        let mut truncated = None;
        for (index, item) in items.iter().enumerate() {
            if let Some(stop) = self.stop_before(index, items.len()) {
                truncated = self.record(stop);
                break;
            }
            if index > 0 {
                self.charge(cost::SEPARATOR);
            }
            out.push(self.value(item, depth));
        }
        Some(SerializedValue::Sequence {
            items: out,
            len: items.len(),
            truncated,
        })
    }

    fn mapping(&mut self, entries: &[(String, Value)], depth: usize) -> Option<SerializedValue> {
        if !self.charge(cost::MAPPING + entries.len().to_string().len()) {
            return None;
        }
        let mut out = Vec::new();
        let mut truncated = None;
        for (index, (key, value)) in entries.iter().enumerate() {
            if let Some(stop) = self.stop_before(index, entries.len()) {
                truncated = self.record(stop);
                break;
            }
            let (key, _) = cut_chars(key, self.limits().item_size_limit);
            if !self.charge(cost::ENTRY + cost::SEPARATOR + json_str_len(&key)) {
                truncated = self.record(Truncation {
                    reason: TruncationReason::DumpSize,
                    omitted: entries.len() - index,
                });
                break;
            }
            let value = self.value(value, depth);
            out.push(MappingEntry { key, value });
        }
        Some(SerializedValue::Mapping {
            entries: out,
            len: entries.len(),
            truncated,
        })
    }

    fn object(
        &mut self,
        class: &str,
        properties: &[Property],
        depth: usize,
    ) -> Option<SerializedValue> {
        let (class, _) = cut_chars(class, self.limits().item_size_limit);
        if !self.charge(cost::OBJECT + json_str_len(&class)) {
            return None;
        }

        let mut out = Vec::new();
        let mut truncated = None;
        for (index, property) in properties.iter().enumerate() {
            if let Some(stop) = self.stop_before(index, properties.len()) {
                truncated = self.record(stop);
                break;
            }
            let (name, _) = cut_chars(&property.name, self.limits().item_size_limit);
            if !self.charge(cost::PROPERTY + cost::SEPARATOR + json_str_len(&name)) {
                truncated = self.record(Truncation {
                    reason: TruncationReason::DumpSize,
                    omitted: properties.len() - index,
                });
                break;
            }
            let value = self.value(&property.value, depth);
            out.push(PropertyEntry {
                name,
                visibility: property.visibility,
                value,
            });
        }
        Some(SerializedValue::Object {
            class,
            properties: out,
            truncated,
        })
    }
}

fn summarize(node: &Node) -> String {
    let short = |name: &str| cut_chars(name, SUMMARY_CHARS).0;
    match node {
        Node::Sequence(items) => format!("sequence({})", items.len()),
        Node::Mapping(entries) => format!("mapping({})", entries.len()),
        Node::Object { class, .. } => format!("object({})", short(class)),
        Node::Callable { name } => format!("callable({})", short(name)),
        Node::Opaque { type_name } => short(type_name),
    }
}

fn cut_chars(s: &str, limit: usize) -> (String, Option<usize>) {
    match s.char_indices().nth(limit) {
        None => (s.to_owned(), None),
        Some((byte_idx, _)) => {
            let omitted = s[byte_idx..].chars().count();
            (s[..byte_idx].to_owned(), Some(omitted))
        }
    }
}

/// Length of `s` once escaped inside a JSON string literal, without quotes.
fn json_str_len(s: &str) -> usize {
    s.chars()
        .map(|c| match c {
            '"' | '\\' | '\n' | '\r' | '\t' | '\u{8}' | '\u{c}' => 2,
            c if (c as u32) < 0x20 => 6,
            c => c.len_utf8(),
        })
        .sum()
}

fn non_finite_repr(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some("NAN")
    } else if value == f64::INFINITY {
        Some("INF")
    } else if value == f64::NEG_INFINITY {
        Some("-INF")
    } else {
        None
    }
}
