use std::fmt;

use thiserror::Error;

use crate::serialized::Visibility;

/// Identity of a container node inside a [`ValueArena`].
///
/// Two `Value::Node` references with the same id are the *same* host value;
/// this is what cycle detection keys on (identity, not structural equality).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A host value as seen by the dumper: either an immediate scalar or a
/// reference to a node in the arena.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    /// Raw bytes in the server encoding; decoded when dumped.
    Bytes(Vec<u8>),
    Node(NodeId),
}

impl Value {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub name: String,
    pub visibility: Visibility,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Sequence(Vec<Value>),
    Mapping(Vec<(String, Value)>),
    Object {
        class: String,
        properties: Vec<Property>,
    },
    /// A function/method reference, e.g. `Router::dispatch` or a closure.
    Callable { name: String },
    /// A value the host could not introspect.
    Opaque { type_name: String },
}

impl Node {
    fn kind(&self) -> &'static str {
        match self {
            Node::Sequence(_) => "sequence",
            Node::Mapping(_) => "mapping",
            Node::Object { .. } => "object",
            Node::Callable { .. } => "callable",
            Node::Opaque { .. } => "opaque",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("node {id} is a {found}, expected a {expected}")]
    KindMismatch {
        id: NodeId,
        expected: &'static str,
        found: &'static str,
    },
}

/// Arena holding the container nodes of one or more inspected values.
///
/// Nodes are append-only: a `NodeId` stays valid for the lifetime of the
/// arena, and containers can be filled after allocation so that
/// self-referential structures can be described.
#[derive(Clone, Debug, Default)]
pub struct ValueArena {
    nodes: Vec<Node>,
}

impl ValueArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        id
    }

    pub fn sequence(&mut self, items: impl IntoIterator<Item = Value>) -> Value {
        Value::Node(self.alloc(Node::Sequence(items.into_iter().collect())))
    }

    pub fn mapping<K: Into<String>>(
        &mut self,
        entries: impl IntoIterator<Item = (K, Value)>,
    ) -> Value {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Node(self.alloc(Node::Mapping(entries)))
    }

    pub fn object(&mut self, class: impl Into<String>) -> NodeId {
        self.alloc(Node::Object {
            class: class.into(),
            properties: Vec::new(),
        })
    }

    pub fn callable(&mut self, name: impl Into<String>) -> Value {
        Value::Node(self.alloc(Node::Callable { name: name.into() }))
    }

    pub fn opaque(&mut self, type_name: impl Into<String>) -> Value {
        Value::Node(self.alloc(Node::Opaque {
            type_name: type_name.into(),
        }))
    }

    pub fn push_item(&mut self, sequence: NodeId, item: Value) -> Result<(), ArenaError> {
        match self.node_mut(sequence)? {
            Node::Sequence(items) => {
                items.push(item);
                Ok(())
            }
            other => Err(ArenaError::KindMismatch {
                id: sequence,
                expected: "sequence",
                found: other.kind(),
            }),
        }
    }

    /// Insert or replace `key` in a mapping node. Insertion order is kept.
    pub fn insert_entry(
        &mut self,
        mapping: NodeId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), ArenaError> {
        let key = key.into();
        match self.node_mut(mapping)? {
            Node::Mapping(entries) => {
                match entries.iter_mut().find(|(existing, _)| *existing == key) {
                    Some((_, slot)) => *slot = value,
                    None => entries.push((key, value)),
                }
                Ok(())
            }
            other => Err(ArenaError::KindMismatch {
                id: mapping,
                expected: "mapping",
                found: other.kind(),
            }),
        }
    }

    pub fn set_property(
        &mut self,
        object: NodeId,
        name: impl Into<String>,
        visibility: Visibility,
        value: Value,
    ) -> Result<(), ArenaError> {
        let name = name.into();
        match self.node_mut(object)? {
            Node::Object { properties, .. } => {
                match properties.iter_mut().find(|p| p.name == name) {
                    Some(existing) => {
                        existing.visibility = visibility;
                        existing.value = value;
                    }
                    None => properties.push(Property {
                        name,
                        visibility,
                        value,
                    }),
                }
                Ok(())
            }
            other => Err(ArenaError::KindMismatch {
                id: object,
                expected: "object",
                found: other.kind(),
            }),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, ArenaError> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or(ArenaError::UnknownNode(id))
    }
}
