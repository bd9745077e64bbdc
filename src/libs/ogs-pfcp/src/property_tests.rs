//! Property-Based Tests for the PFCP codec and transaction table

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use bytes::Bytes;
    use proptest::prelude::*;

    use crate::header::{PfcpHeader, PfcpMessageType, PFCP_MAX_SEQUENCE};
    use crate::message::{PfcpIe, PfcpMessage};
    use crate::xact::{PfcpXactTable, XactMatch};

    fn any_type() -> impl Strategy<Value = PfcpMessageType> {
        prop_oneof![(1u8..=17), (50u8..=57)]
            .prop_map(PfcpMessageType::from)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_seid_follows_s_flag(
            message_type in any_type(),
            seid in prop::option::of(any::<u64>()),
            sequence in 0u32..=PFCP_MAX_SEQUENCE,
            ies in prop::collection::vec((any::<u16>(), prop::collection::vec(any::<u8>(), 0..12)), 0..5),
        ) {
            let header = match seid {
                Some(seid) => PfcpHeader::new_with_seid(message_type, seid, sequence),
                None => PfcpHeader::new(message_type, sequence),
            };
            let ies: Vec<PfcpIe> = ies.into_iter().map(|(t, v)| PfcpIe::new(t, v)).collect();
            let decoded = PfcpMessage::decode(PfcpMessage::new(header, ies.clone()).encode().freeze())
                .unwrap();

            prop_assert_eq!(decoded.header.seid_presence, seid.is_some());
            prop_assert_eq!(decoded.header.seid, seid);
            prop_assert_eq!(decoded.header.sequence_number, sequence);
            prop_assert_eq!(decoded.message_type(), message_type);
            prop_assert_eq!(decoded.ies, ies);
        }

        #[test]
        fn prop_decode_never_panics(raw in prop::collection::vec(any::<u8>(), 0..64)) {
            let _ = PfcpMessage::decode(Bytes::from(raw));
        }

        #[test]
        fn prop_responses_without_request_are_orphans(
            message_type in any_type().prop_filter("response", |t| !t.is_request()),
            sequence in 0u32..=PFCP_MAX_SEQUENCE,
        ) {
            let mut table = PfcpXactTable::default();
            let peer = SocketAddr::from(([127, 0, 0, 1], 8805));
            prop_assert!(table.receive(peer, &PfcpHeader::new(message_type, sequence)).is_err());
            prop_assert_eq!(table.count(), 0);
        }

        #[test]
        fn prop_local_request_is_answered_once(count in 1usize..20) {
            let mut table = PfcpXactTable::default();
            let peer = SocketAddr::from(([127, 0, 0, 1], 8805));
            for _ in 0..count {
                let x = table
                    .local_create(peer, PfcpMessageType::HeartbeatRequest, None)
                    .unwrap();
                let rsp = PfcpHeader::new(PfcpMessageType::HeartbeatResponse, x.sequence);
                let matched = table.receive(peer, &rsp).unwrap();
                prop_assert!(matches!(matched, XactMatch::Response(ref m) if m.id == x.id));
                table.commit(x.id);
                prop_assert!(table.receive(peer, &rsp).is_err());
            }
            prop_assert_eq!(table.count(), 0);
        }
    }
}
