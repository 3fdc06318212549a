use lookout_dump::SerializedValue;
use lookout_proto::{pack, DiagnosticPacket, FrameStatus, ResponseFrame, ValueDump, MIN_HEADERS_LIMIT};
use proptest::prelude::*;

const PROPTEST_CASES: u32 = 128;

fn packet(text: String, tag: u8) -> DiagnosticPacket {
    ValueDump {
        value: SerializedValue::string(text),
        location: None,
        trace: Vec::new(),
        tags: vec![format!("t{tag}")],
    }
    .into()
}

fn arb_packets() -> impl Strategy<Value = Vec<DiagnosticPacket>> {
    prop::collection::vec(("[a-z ]{0,300}", any::<u8>()), 0..24)
        .prop_map(|items| items.into_iter().map(|(text, tag)| packet(text, tag)).collect())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: PROPTEST_CASES, .. ProptestConfig::default() })]

    #[test]
    fn packed_frames_never_exceed_the_limit(
        packets in arb_packets(),
        limit in MIN_HEADERS_LIMIT..4_096usize,
    ) {
        let total = packets.len();
        let packed = pack(ResponseFrame::new(FrameStatus::Ok), packets.clone(), limit).unwrap();

        prop_assert!(packed.frame.encode().unwrap().len() <= limit);
        prop_assert_eq!(
            packed.frame.packets.len() + packed.overflow.len() + packed.oversized.len(),
            total
        );
        prop_assert_eq!(packed.frame.pending, packed.overflow.len());

        // Packets too big for the limit travel as size markers; nothing with
        // short tags is ever dropped.
        prop_assert!(packed.oversized.is_empty());

        // Sent packets then spilled packets is the original sequence, each
        // either intact or replaced by its size marker.
        let mut delivered = packed.frame.packets.clone();
        delivered.extend(packed.overflow.iter().cloned());
        prop_assert_eq!(delivered.len(), packets.len());
        let mut markers = 0;
        for (sent, original) in delivered.iter().zip(&packets) {
            if sent != original {
                prop_assert_eq!(sent, &original.size_marker(original.encoded_len().unwrap()));
                markers += 1;
            }
        }
        prop_assert_eq!(markers, packed.shrunk);
    }
}
