//! GTPv2 Header
//!
//! GTPv2-C header structure as specified in 3GPP TS 29.274 section 5.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{GtpError, GtpResult};

/// GTPv2-C header length (with TEID)
pub const GTPV2C_HEADER_LEN: usize = 12;

/// GTPv2-C header length (without TEID)
pub const GTPV2C_HEADER_LEN_NO_TEID: usize = 8;

/// GTP version carried in the flags octet
pub const GTP2_VERSION: u8 = 2;

/// Sequence numbers are 24 bits wide
pub const GTP2_MAX_SEQUENCE: u32 = 0x00ff_ffff;

macro_rules! gtp2_message_types {
    (@triggered initial) => { false };
    (@triggered triggered) => { true };
    ($($name:ident = $value:literal, $text:literal, $kind:ident;)+) => {
        /// GTPv2-C Message Types
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Gtp2MessageType {
            $($name,)+
            /// A type outside TS 29.274; dispatched as not implemented
            Unknown(u8),
        }

        impl From<u8> for Gtp2MessageType {
            fn from(value: u8) -> Self {
                match value {
                    $($value => Self::$name,)+
                    other => Self::Unknown(other),
                }
            }
        }

        impl Gtp2MessageType {
            /// Wire value of the type
            pub fn value(&self) -> u8 {
                match self {
                    $(Self::$name => $value,)+
                    Self::Unknown(value) => *value,
                }
            }

            /// Human readable name, as used in log lines
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$name => $text,)+
                    Self::Unknown(_) => "Unknown",
                }
            }

            /// Triggered messages answer an earlier initial message on the
            /// same path and never open a transaction of their own.
            pub fn is_triggered(&self) -> bool {
                match self {
                    $(Self::$name => gtp2_message_types!(@triggered $kind),)+
                    Self::Unknown(_) => false,
                }
            }
        }
    };
}

gtp2_message_types! {
    EchoRequest = 1, "Echo Request", initial;
    EchoResponse = 2, "Echo Response", triggered;
    VersionNotSupportedIndication = 3, "Version Not Supported Indication", triggered;
    CreateSessionRequest = 32, "Create Session Request", initial;
    CreateSessionResponse = 33, "Create Session Response", triggered;
    ModifyBearerRequest = 34, "Modify Bearer Request", initial;
    ModifyBearerResponse = 35, "Modify Bearer Response", triggered;
    DeleteSessionRequest = 36, "Delete Session Request", initial;
    DeleteSessionResponse = 37, "Delete Session Response", triggered;
    ChangeNotificationRequest = 38, "Change Notification Request", initial;
    ChangeNotificationResponse = 39, "Change Notification Response", triggered;
    ModifyBearerCommand = 64, "Modify Bearer Command", initial;
    ModifyBearerFailureIndication = 65, "Modify Bearer Failure Indication", triggered;
    DeleteBearerCommand = 66, "Delete Bearer Command", initial;
    DeleteBearerFailureIndication = 67, "Delete Bearer Failure Indication", triggered;
    BearerResourceCommand = 68, "Bearer Resource Command", initial;
    BearerResourceFailureIndication = 69, "Bearer Resource Failure Indication", triggered;
    CreateBearerRequest = 95, "Create Bearer Request", initial;
    CreateBearerResponse = 96, "Create Bearer Response", triggered;
    UpdateBearerRequest = 97, "Update Bearer Request", initial;
    UpdateBearerResponse = 98, "Update Bearer Response", triggered;
    DeleteBearerRequest = 99, "Delete Bearer Request", initial;
    DeleteBearerResponse = 100, "Delete Bearer Response", triggered;
    DeletePdnConnectionSetRequest = 101, "Delete PDN Connection Set Request", initial;
    DeletePdnConnectionSetResponse = 102, "Delete PDN Connection Set Response", triggered;
    ReleaseAccessBearersRequest = 170, "Release Access Bearers Request", initial;
    ReleaseAccessBearersResponse = 171, "Release Access Bearers Response", triggered;
    DownlinkDataNotification = 176, "Downlink Data Notification", initial;
    DownlinkDataNotificationAcknowledge = 177, "Downlink Data Notification Acknowledge", triggered;
    PgwRestartNotification = 179, "PGW Restart Notification", initial;
    PgwRestartNotificationAcknowledge = 180, "PGW Restart Notification Acknowledge", triggered;
    UpdatePdnConnectionSetRequest = 200, "Update PDN Connection Set Request", initial;
    UpdatePdnConnectionSetResponse = 201, "Update PDN Connection Set Response", triggered;
    ModifyAccessBearersRequest = 211, "Modify Access Bearers Request", initial;
    ModifyAccessBearersResponse = 212, "Modify Access Bearers Response", triggered;
}

/// GTPv2-C Header
///
/// ```text
///  0                   1                   2                   3
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |Ver=2|P|T| Spr |  Message Type |        Message Length         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |            Tunnel Endpoint Identifier (if T=1)                |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                Sequence Number                |     Spare     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Header {
    /// Piggybacked flag
    pub piggybacked: bool,
    /// Message type
    pub message_type: Gtp2MessageType,
    /// Message length (excluding the first 4 octets)
    pub length: u16,
    /// Tunnel Endpoint Identifier, present when the T flag is set
    pub teid: Option<u32>,
    /// Sequence number (24 bits)
    pub sequence_number: u32,
}

impl Gtp2Header {
    /// Create a header that carries a TEID
    pub fn new(message_type: Gtp2MessageType, teid: u32, sequence_number: u32) -> Self {
        Self {
            piggybacked: false,
            message_type,
            length: 0,
            teid: Some(teid),
            sequence_number: sequence_number & GTP2_MAX_SEQUENCE,
        }
    }

    /// Create a header without the TEID field (Echo, Version Not Supported)
    pub fn new_no_teid(message_type: Gtp2MessageType, sequence_number: u32) -> Self {
        Self {
            teid: None,
            ..Self::new(message_type, 0, sequence_number)
        }
    }

    /// TEID as the dispatcher sees it: absent and zero are both "unassigned"
    pub fn teid_or_zero(&self) -> u32 {
        self.teid.unwrap_or(0)
    }

    /// Header length on the wire
    pub fn header_len(&self) -> usize {
        if self.teid.is_some() {
            GTPV2C_HEADER_LEN
        } else {
            GTPV2C_HEADER_LEN_NO_TEID
        }
    }

    /// Encode header to bytes
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut flags = GTP2_VERSION << 5;
        if self.piggybacked {
            flags |= 0x10;
        }
        if self.teid.is_some() {
            flags |= 0x08;
        }
        buf.put_u8(flags);
        buf.put_u8(self.message_type.value());
        buf.put_u16(self.length);
        if let Some(teid) = self.teid {
            buf.put_u32(teid);
        }
        buf.put_u32((self.sequence_number & GTP2_MAX_SEQUENCE) << 8);
    }

    /// Decode header from bytes
    pub fn decode(buf: &mut Bytes) -> GtpResult<Self> {
        if buf.remaining() < 4 {
            return Err(GtpError::BufferTooShort {
                needed: 4,
                available: buf.remaining(),
            });
        }

        let flags = buf.get_u8();
        let version = (flags >> 5) & 0x07;
        if version != GTP2_VERSION {
            return Err(GtpError::InvalidVersion(version));
        }
        let piggybacked = flags & 0x10 != 0;
        let teid_presence = flags & 0x08 != 0;

        let message_type = Gtp2MessageType::from(buf.get_u8());
        let length = buf.get_u16();

        let needed = if teid_presence { 8 } else { 4 };
        if buf.remaining() < needed {
            return Err(GtpError::BufferTooShort {
                needed,
                available: buf.remaining(),
            });
        }

        let teid = teid_presence.then(|| buf.get_u32());
        let sequence_number = buf.get_u32() >> 8;

        Ok(Self {
            piggybacked,
            message_type,
            length,
            teid,
            sequence_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_with_teid() {
        let mut header = Gtp2Header::new(Gtp2MessageType::DeleteSessionRequest, 0x1234_5678, 0x42);
        header.length = 8;

        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), GTPV2C_HEADER_LEN);
        assert_eq!(buf[0], 0x48);

        let decoded = Gtp2Header::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.teid_or_zero(), 0x1234_5678);
    }

    #[test]
    fn test_header_without_teid() {
        let header = Gtp2Header::new_no_teid(Gtp2MessageType::EchoRequest, 7);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), GTPV2C_HEADER_LEN_NO_TEID);

        let decoded = Gtp2Header::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.teid, None);
        assert_eq!(decoded.teid_or_zero(), 0);
        assert_eq!(decoded.sequence_number, 7);
    }

    #[test]
    fn test_sequence_is_24_bits() {
        let header = Gtp2Header::new(Gtp2MessageType::CreateSessionRequest, 0, 0x1ff_ffff);
        assert_eq!(header.sequence_number, GTP2_MAX_SEQUENCE);
    }

    #[test]
    fn test_rejects_gtpv1() {
        let mut bytes = Bytes::from_static(&[0x30, 0x20, 0x00, 0x04, 0, 0, 0, 0]);
        assert_eq!(
            Gtp2Header::decode(&mut bytes),
            Err(GtpError::InvalidVersion(1))
        );
    }

    #[test]
    fn test_unknown_type_is_kept() {
        let mut bytes = Bytes::from_static(&[0x40, 0xfe, 0x00, 0x04, 0, 0, 1, 0]);
        let header = Gtp2Header::decode(&mut bytes).unwrap();
        assert_eq!(header.message_type, Gtp2MessageType::Unknown(0xfe));
        assert_eq!(header.message_type.value(), 0xfe);
        assert_eq!(header.message_type.name(), "Unknown");
        assert!(!header.message_type.is_triggered());
        assert_eq!(header.sequence_number, 1);

        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf[1], 0xfe);
    }

    #[test]
    fn test_triggered_classification() {
        assert!(!Gtp2MessageType::CreateSessionRequest.is_triggered());
        assert!(!Gtp2MessageType::BearerResourceCommand.is_triggered());
        assert!(Gtp2MessageType::CreateBearerResponse.is_triggered());
        assert!(Gtp2MessageType::BearerResourceFailureIndication.is_triggered());
        assert_eq!(Gtp2MessageType::UpdateBearerResponse.name(), "Update Bearer Response");
    }
}
