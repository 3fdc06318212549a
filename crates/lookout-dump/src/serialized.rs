use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// Which limit caused content to be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TruncationReason {
    Level,
    ItemsCount,
    ItemSize,
    DumpSize,
}

/// Attached to a container whose trailing children were not dumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncation {
    pub reason: TruncationReason,
    pub omitted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub key: String,
    pub value: SerializedValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyEntry {
    pub name: String,
    pub visibility: Visibility,
    pub value: SerializedValue,
}

/// Bounded, client-facing description of a dumped value.
///
/// Anything the dumper did not emit is visible as either a marker variant or
/// a `truncated` field; content is never dropped silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SerializedValue {
    Null,
    Bool {
        value: bool,
    },
    Int {
        value: i64,
    },
    #[serde(rename = "uint")]
    UInt {
        value: u64,
    },
    Float {
        value: f64,
    },
    String {
        value: String,
        /// Number of characters cut by the item size limit.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        truncated: Option<usize>,
    },
    Sequence {
        items: Vec<SerializedValue>,
        len: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        truncated: Option<Truncation>,
    },
    Mapping {
        entries: Vec<MappingEntry>,
        len: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        truncated: Option<Truncation>,
    },
    Object {
        class: String,
        properties: Vec<PropertyEntry>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        truncated: Option<Truncation>,
    },
    Callable {
        reference: String,
    },
    /// A whole value replaced because a limit was reached before it.
    Truncated {
        reason: TruncationReason,
        summary: String,
    },
    Circular {
        summary: String,
    },
    Unreadable {
        summary: String,
    },
}

impl SerializedValue {
    pub fn string(value: impl Into<String>) -> Self {
        SerializedValue::String {
            value: value.into(),
            truncated: None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SerializedValue::String { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Direct children, in emission order.
    pub fn children(&self) -> Box<dyn Iterator<Item = &SerializedValue> + '_> {
        match self {
            SerializedValue::Sequence { items, .. } => Box::new(items.iter()),
            SerializedValue::Mapping { entries, .. } => Box::new(entries.iter().map(|e| &e.value)),
            SerializedValue::Object { properties, .. } => {
                Box::new(properties.iter().map(|p| &p.value))
            }
            _ => Box::new(std::iter::empty()),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            SerializedValue::Sequence { .. }
                | SerializedValue::Mapping { .. }
                | SerializedValue::Object { .. }
        )
    }

    /// Container nesting depth; scalars and markers have depth 0.
    pub fn depth(&self) -> usize {
        if !self.is_container() {
            return 0;
        }
        1 + self.children().map(SerializedValue::depth).max().unwrap_or(0)
    }

    /// Largest number of direct children found on any node.
    pub fn max_items(&self) -> usize {
        let own = self.children().count();
        self.children()
            .map(SerializedValue::max_items)
            .max()
            .unwrap_or(0)
            .max(own)
    }

    /// Pre-order traversal.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a SerializedValue)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// True when any part of the tree was cut by a limit.
    pub fn is_truncated(&self) -> bool {
        let mut truncated = false;
        self.walk(&mut |node| {
            truncated |= match node {
                SerializedValue::Truncated { .. } => true,
                SerializedValue::String { truncated, .. } => truncated.is_some(),
                SerializedValue::Sequence { truncated, .. }
                | SerializedValue::Mapping { truncated, .. }
                | SerializedValue::Object { truncated, .. } => truncated.is_some(),
                _ => false,
            };
        });
        truncated
    }

    /// Length of the compact JSON encoding.
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }
}
