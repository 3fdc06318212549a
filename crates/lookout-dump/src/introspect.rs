use std::collections::{BTreeMap, HashMap};

use crate::value::{Value, ValueArena};

/// Describes a host value to the dumper.
///
/// Implementations allocate container nodes in `arena` and return the root
/// [`Value`]. Types with identity (shared or cyclic structures) should build
/// their nodes directly with [`ValueArena`] so repeated references reuse the
/// same `NodeId`.
pub trait Introspect {
    fn introspect(&self, arena: &mut ValueArena) -> Value;
}

impl<T: Introspect + ?Sized> Introspect for &T {
    fn introspect(&self, arena: &mut ValueArena) -> Value {
        (**self).introspect(arena)
    }
}

impl<T: Introspect + ?Sized> Introspect for Box<T> {
    fn introspect(&self, arena: &mut ValueArena) -> Value {
        (**self).introspect(arena)
    }
}

impl Introspect for Value {
    fn introspect(&self, _arena: &mut ValueArena) -> Value {
        self.clone()
    }
}

impl Introspect for () {
    fn introspect(&self, _arena: &mut ValueArena) -> Value {
        Value::Null
    }
}

impl Introspect for bool {
    fn introspect(&self, _arena: &mut ValueArena) -> Value {
        Value::Bool(*self)
    }
}

macro_rules! introspect_signed {
    ($($ty:ty),*) => {
        $(impl Introspect for $ty {
            fn introspect(&self, _arena: &mut ValueArena) -> Value {
                Value::Int(i64::from(*self))
            }
        })*
    };
}

macro_rules! introspect_unsigned {
    ($($ty:ty),*) => {
        $(impl Introspect for $ty {
            fn introspect(&self, _arena: &mut ValueArena) -> Value {
                Value::UInt(u64::from(*self))
            }
        })*
    };
}

introspect_signed!(i8, i16, i32, i64);
introspect_unsigned!(u8, u16, u32, u64);

impl Introspect for isize {
    fn introspect(&self, _arena: &mut ValueArena) -> Value {
        i64::try_from(*self).map_or(Value::Int(i64::MAX), Value::Int)
    }
}

impl Introspect for usize {
    fn introspect(&self, _arena: &mut ValueArena) -> Value {
        u64::try_from(*self).map_or(Value::UInt(u64::MAX), Value::UInt)
    }
}

impl Introspect for f32 {
    fn introspect(&self, _arena: &mut ValueArena) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl Introspect for f64 {
    fn introspect(&self, _arena: &mut ValueArena) -> Value {
        Value::Float(*self)
    }
}

impl Introspect for str {
    fn introspect(&self, _arena: &mut ValueArena) -> Value {
        Value::Str(self.to_owned())
    }
}

impl Introspect for String {
    fn introspect(&self, _arena: &mut ValueArena) -> Value {
        Value::Str(self.clone())
    }
}

impl<T: Introspect> Introspect for Option<T> {
    fn introspect(&self, arena: &mut ValueArena) -> Value {
        match self {
            Some(value) => value.introspect(arena),
            None => Value::Null,
        }
    }
}

impl<T: Introspect> Introspect for [T] {
    fn introspect(&self, arena: &mut ValueArena) -> Value {
        let items: Vec<Value> = self.iter().map(|item| item.introspect(arena)).collect();
        arena.sequence(items)
    }
}

impl<T: Introspect> Introspect for Vec<T> {
    fn introspect(&self, arena: &mut ValueArena) -> Value {
        self.as_slice().introspect(arena)
    }
}

impl<T: Introspect> Introspect for BTreeMap<String, T> {
    fn introspect(&self, arena: &mut ValueArena) -> Value {
        let entries: Vec<(String, Value)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.introspect(arena)))
            .collect();
        arena.mapping(entries)
    }
}

impl<T: Introspect, S> Introspect for HashMap<String, T, S> {
    fn introspect(&self, arena: &mut ValueArena) -> Value {
        // Sorted so repeated dumps of the same map render identically.
        let mut pairs: Vec<(&String, &T)> = self.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        let entries: Vec<(String, Value)> = pairs
            .into_iter()
            .map(|(key, value)| (key.clone(), value.introspect(arena)))
            .collect();
        arena.mapping(entries)
    }
}

impl Introspect for serde_json::Value {
    fn introspect(&self, arena: &mut ValueArena) -> Value {
        match self {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Value::Int(v)
                } else if let Some(v) = n.as_u64() {
                    Value::UInt(v)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => items.introspect(arena),
            serde_json::Value::Object(map) => {
                let entries: Vec<(String, Value)> = map
                    .iter()
                    .map(|(key, value)| (key.clone(), value.introspect(arena)))
                    .collect();
                arena.mapping(entries)
            }
        }
    }
}
