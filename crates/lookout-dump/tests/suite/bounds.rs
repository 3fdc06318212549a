use lookout_dump::{Dumper, DumperLimits, SerializedValue};
use proptest::prelude::*;
use serde_json::Value as Json;

const PROPTEST_CASES: u32 = 128;

/// Upper bound on what markers and truncation fields may add once the budget
/// is spent: at most one of each per open container plus the root.
const SLACK_PER_LEVEL: usize = 256;

fn arb_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            8 => prop::sample::select(vec!['a', 'b', 'z', '0', ' ', '-']),
            1 => Just('"'),
            1 => Just('\n'),
            1 => Just('é'),
            1 => Just('🦀'),
        ],
        0..24,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn arb_json() -> impl Strategy<Value = Json> {
    let leaf = prop_oneof![
        Just(Json::Null),
        any::<bool>().prop_map(Json::Bool),
        any::<i64>().prop_map(Json::from),
        (-1.0e9f64..1.0e9).prop_map(Json::from),
        arb_text().prop_map(Json::String),
    ];
    leaf.prop_recursive(6, 128, 12, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..12).prop_map(Json::Array),
            prop::collection::vec((arb_text(), inner), 0..12)
                .prop_map(|entries| Json::Object(entries.into_iter().collect())),
        ]
    })
}

fn arb_limits() -> impl Strategy<Value = DumperLimits> {
    (1usize..5, 1usize..8, 1usize..16, 64usize..4_096).prop_map(
        |(level_limit, items_count_limit, item_size_limit, dump_size_limit)| DumperLimits {
            level_limit,
            items_count_limit,
            item_size_limit,
            dump_size_limit,
        },
    )
}

fn longest_string(value: &SerializedValue) -> usize {
    let mut longest = 0;
    value.walk(&mut |node| {
        if let SerializedValue::String { value, .. } = node {
            longest = longest.max(value.chars().count());
        }
    });
    longest
}

proptest! {
    #![proptest_config(ProptestConfig { cases: PROPTEST_CASES, .. ProptestConfig::default() })]

    #[test]
    fn dumps_respect_every_limit(json in arb_json(), limits in arb_limits()) {
        let out = Dumper::new(limits).dump_value(&json);

        prop_assert!(out.depth() <= limits.level_limit);
        prop_assert!(out.max_items() <= limits.items_count_limit);
        prop_assert!(longest_string(&out) <= limits.item_size_limit.max(4));

        let slack = (limits.level_limit + 2) * SLACK_PER_LEVEL;
        prop_assert!(
            out.encoded_len() <= limits.dump_size_limit + slack,
            "encoded {} bytes for a {} byte budget",
            out.encoded_len(),
            limits.dump_size_limit
        );
    }

    #[test]
    fn dumping_is_deterministic(json in arb_json(), limits in arb_limits()) {
        let dumper = Dumper::new(limits);
        prop_assert_eq!(dumper.dump_value(&json), dumper.dump_value(&json));
    }
}
