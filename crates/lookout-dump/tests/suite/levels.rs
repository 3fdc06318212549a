use lookout_dump::{
    Dumper, DumperLimits, SerializedValue, TruncationReason, Value, ValueArena, MAX_LEVEL_LIMIT,
};
use serde_json::json;

#[test]
fn containers_below_the_level_limit_become_markers() {
    let limits = DumperLimits {
        level_limit: 2,
        ..DumperLimits::default()
    };
    let value = json!({"a": {"b": {"c": {"d": 1}}}});
    let out = Dumper::new(limits).dump_value(&value);

    let SerializedValue::Mapping { entries, .. } = &out else {
        panic!("expected mapping, got {out:?}");
    };
    assert_eq!(entries[0].key, "a");
    let SerializedValue::Mapping { entries, .. } = &entries[0].value else {
        panic!("expected second level mapping");
    };
    assert_eq!(entries[0].key, "b");
    assert_eq!(
        entries[0].value,
        SerializedValue::Truncated {
            reason: TruncationReason::Level,
            summary: "mapping(1)".into()
        }
    );
    assert_eq!(out.depth(), 2);
}

#[test]
fn scalars_do_not_count_as_a_level() {
    let limits = DumperLimits {
        level_limit: 1,
        ..DumperLimits::default()
    };
    let out = Dumper::new(limits).dump_value(&json!([1, "two", null]));
    assert!(!out.is_truncated());
    assert_eq!(out.depth(), 1);
}

#[test]
fn zero_level_limit_replaces_the_root_container() {
    let limits = DumperLimits {
        level_limit: 0,
        ..DumperLimits::default()
    };
    let out = Dumper::new(limits).dump_value(&json!([1]));
    assert!(matches!(
        out,
        SerializedValue::Truncated {
            reason: TruncationReason::Level,
            ..
        }
    ));
    assert_eq!(Dumper::new(limits).dump_value(&7u8), SerializedValue::UInt { value: 7 });
}

#[test]
fn deep_chains_stop_at_the_level_ceiling() {
    let mut arena = ValueArena::new();
    let mut chain = Value::Null;
    for _ in 0..200_000 {
        chain = arena.sequence([chain]);
    }

    let dumper = Dumper::new(DumperLimits {
        level_limit: usize::MAX,
        ..DumperLimits::default()
    });
    assert_eq!(dumper.limits().level_limit, MAX_LEVEL_LIMIT);

    let out = dumper.dump(&arena, &chain);
    assert_eq!(out.depth(), MAX_LEVEL_LIMIT);
    let mut level_markers = 0;
    out.walk(&mut |node| {
        if matches!(
            node,
            SerializedValue::Truncated {
                reason: TruncationReason::Level,
                ..
            }
        ) {
            level_markers += 1;
        }
    });
    assert_eq!(level_markers, 1);
}
