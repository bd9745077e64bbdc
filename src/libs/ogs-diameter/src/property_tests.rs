//! Property-Based Tests for the Diameter codec

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use proptest::prelude::*;

    use crate::gx::{CcRequestType, GxMessage};
    use crate::message::DiameterMessage;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_cca_fields_survive_encoding(
            session_id in "[a-z0-9.;]{1,40}",
            request_type in 1u32..=4,
            result_code in 1000u32..6000,
        ) {
            let cca = GxMessage::cca(
                &session_id,
                CcRequestType::try_from(request_type).unwrap(),
                result_code,
            );
            let raw = cca.to_diameter().encode();
            prop_assert_eq!(raw.len() % 4, 0);
            prop_assert_eq!(GxMessage::decode(raw.freeze()).unwrap(), cca);
        }

        #[test]
        fn prop_decode_never_panics(raw in prop::collection::vec(any::<u8>(), 0..96)) {
            let _ = DiameterMessage::decode(Bytes::from(raw));
        }
    }
}
