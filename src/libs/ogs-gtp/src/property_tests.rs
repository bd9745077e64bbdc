//! Property-Based Tests for the GTPv2-C codec and transaction table

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::net::SocketAddr;

    use bytes::Bytes;
    use proptest::prelude::*;

    use crate::v2::header::GTP2_MAX_SEQUENCE;
    use crate::v2::{Gtp2Header, Gtp2Ie, Gtp2Message, Gtp2MessageType, TeidPool};
    use crate::xact::{GtpXactTable, XactMatch};

    fn routed_type() -> impl Strategy<Value = Gtp2MessageType> {
        prop_oneof![
            Just(Gtp2MessageType::CreateSessionRequest),
            Just(Gtp2MessageType::DeleteSessionRequest),
            Just(Gtp2MessageType::CreateBearerResponse),
            Just(Gtp2MessageType::UpdateBearerResponse),
            Just(Gtp2MessageType::DeleteBearerResponse),
            Just(Gtp2MessageType::BearerResourceCommand),
            Just(Gtp2MessageType::ModifyBearerRequest),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_message_round_trip(
            message_type in routed_type(),
            teid in any::<u32>(),
            sequence in 0u32..=GTP2_MAX_SEQUENCE,
            values in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 0..6),
        ) {
            let ies: Vec<Gtp2Ie> = values
                .into_iter()
                .enumerate()
                .map(|(i, v)| Gtp2Ie::new(i as u8 + 1, 0, v))
                .collect();
            let msg = Gtp2Message::new(Gtp2Header::new(message_type, teid, sequence), ies.clone());
            let decoded = Gtp2Message::decode(msg.encode().freeze()).unwrap();

            prop_assert_eq!(decoded.message_type(), message_type);
            prop_assert_eq!(decoded.header.teid, Some(teid));
            prop_assert_eq!(decoded.header.sequence_number, sequence);
            prop_assert_eq!(decoded.ies(), ies.as_slice());
        }

        #[test]
        fn prop_decode_never_panics(raw in prop::collection::vec(any::<u8>(), 0..64)) {
            let _ = Gtp2Message::decode(Bytes::from(raw));
        }

        #[test]
        fn prop_one_xact_per_distinct_request(
            requests in prop::collection::vec((0u16..4, 0u32..8), 1..40),
        ) {
            let mut table = GtpXactTable::default();
            let mut distinct = HashSet::new();
            for (port, seq) in requests {
                let peer = SocketAddr::from(([127, 0, 0, 1], port));
                let header = Gtp2Header::new(Gtp2MessageType::CreateSessionRequest, 0, seq);
                let m = table.receive(peer, &header).unwrap();
                if distinct.insert((port, seq)) {
                    prop_assert!(matches!(m, XactMatch::New(_)));
                } else {
                    prop_assert!(matches!(m, XactMatch::Duplicate(_)));
                }
            }
            prop_assert_eq!(table.count(), distinct.len());
        }

        #[test]
        fn prop_teid_pool_never_yields_zero_or_taken(
            base in 1u32..1000,
            span in 1u32..64,
            taken in prop::collection::hash_set(0u32..1100, 0..32),
        ) {
            let mut pool = TeidPool::with_range(base, base + span).unwrap();
            let mut issued = HashSet::new();
            loop {
                let next = pool.allocate(|t| taken.contains(&t) || issued.contains(&t));
                let Ok(teid) = next else { break };
                prop_assert_ne!(teid, 0);
                prop_assert!(teid >= base && teid <= base + span);
                prop_assert!(!taken.contains(&teid));
                prop_assert!(issued.insert(teid));
            }
        }
    }
}
