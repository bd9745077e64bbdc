//! PFCP Header
//!
//! PFCP message header as specified in 3GPP TS 29.244 section 7.2.2.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{PfcpError, PfcpResult};

/// PFCP Header length without SEID (8 bytes)
pub const PFCP_HEADER_LEN: usize = 8;

/// PFCP Header length with SEID (16 bytes)
pub const PFCP_HEADER_LEN_WITH_SEID: usize = 16;

/// PFCP version
pub const PFCP_VERSION: u8 = 1;

/// Sequence numbers are 24 bits wide
pub const PFCP_MAX_SEQUENCE: u32 = 0x00ff_ffff;

macro_rules! pfcp_message_types {
    (@request request) => { true };
    (@request response) => { false };
    ($($name:ident = $value:literal, $text:literal, $kind:ident;)+) => {
        /// PFCP Message Types
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PfcpMessageType {
            $($name,)+
            /// A type outside TS 29.244 §7.3
            Unknown(u8),
        }

        impl From<u8> for PfcpMessageType {
            fn from(value: u8) -> Self {
                match value {
                    $($value => Self::$name,)+
                    other => Self::Unknown(other),
                }
            }
        }

        impl PfcpMessageType {
            pub fn value(&self) -> u8 {
                match self {
                    $(Self::$name => $value,)+
                    Self::Unknown(value) => *value,
                }
            }

            /// Get the name of the message type
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$name => $text,)+
                    Self::Unknown(_) => "Unknown",
                }
            }

            /// Requests open a transaction; responses close one. An unknown
            /// type is taken as a request so the receiver can close it.
            pub fn is_request(&self) -> bool {
                match self {
                    $(Self::$name => pfcp_message_types!(@request $kind),)+
                    Self::Unknown(_) => true,
                }
            }
        }
    };
}

pfcp_message_types! {
    HeartbeatRequest = 1, "Heartbeat Request", request;
    HeartbeatResponse = 2, "Heartbeat Response", response;
    PfdManagementRequest = 3, "PFD Management Request", request;
    PfdManagementResponse = 4, "PFD Management Response", response;
    AssociationSetupRequest = 5, "Association Setup Request", request;
    AssociationSetupResponse = 6, "Association Setup Response", response;
    AssociationUpdateRequest = 7, "Association Update Request", request;
    AssociationUpdateResponse = 8, "Association Update Response", response;
    AssociationReleaseRequest = 9, "Association Release Request", request;
    AssociationReleaseResponse = 10, "Association Release Response", response;
    VersionNotSupportedResponse = 11, "Version Not Supported Response", response;
    NodeReportRequest = 12, "Node Report Request", request;
    NodeReportResponse = 13, "Node Report Response", response;
    SessionSetDeletionRequest = 14, "Session Set Deletion Request", request;
    SessionSetDeletionResponse = 15, "Session Set Deletion Response", response;
    SessionSetModificationRequest = 16, "Session Set Modification Request", request;
    SessionSetModificationResponse = 17, "Session Set Modification Response", response;
    SessionEstablishmentRequest = 50, "Session Establishment Request", request;
    SessionEstablishmentResponse = 51, "Session Establishment Response", response;
    SessionModificationRequest = 52, "Session Modification Request", request;
    SessionModificationResponse = 53, "Session Modification Response", response;
    SessionDeletionRequest = 54, "Session Deletion Request", request;
    SessionDeletionResponse = 55, "Session Deletion Response", response;
    SessionReportRequest = 56, "Session Report Request", request;
    SessionReportResponse = 57, "Session Report Response", response;
}

impl PfcpMessageType {
    /// Session related messages carry a SEID in the header
    pub fn has_seid(&self) -> bool {
        self.value() >= 50
    }
}

/// PFCP Header
///
/// ```text
///  0                   1                   2                   3
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | Ver |Spr|F|M|S| Message Type  |        Message Length         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |              SEID (8 octets, if S=1)                          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                Sequence Number                | Prio  | Spare |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfcpHeader {
    /// S flag; a SEID follows the length field
    pub seid_presence: bool,
    /// MP flag; the priority nibble is meaningful
    pub message_priority: bool,
    pub message_type: PfcpMessageType,
    /// Message length (excluding the first 4 octets)
    pub length: u16,
    pub seid: Option<u64>,
    /// Sequence number (24 bits)
    pub sequence_number: u32,
    pub priority: Option<u8>,
}

impl PfcpHeader {
    /// Create a node related header (S=0)
    pub fn new(message_type: PfcpMessageType, sequence_number: u32) -> Self {
        Self {
            seid_presence: false,
            message_priority: false,
            message_type,
            length: 0,
            seid: None,
            sequence_number: sequence_number & PFCP_MAX_SEQUENCE,
            priority: None,
        }
    }

    /// Create a session related header (S=1)
    pub fn new_with_seid(message_type: PfcpMessageType, seid: u64, sequence_number: u32) -> Self {
        Self {
            seid_presence: true,
            seid: Some(seid),
            ..Self::new(message_type, sequence_number)
        }
    }

    /// Header length on the wire
    pub fn header_len(&self) -> usize {
        if self.seid_presence {
            PFCP_HEADER_LEN_WITH_SEID
        } else {
            PFCP_HEADER_LEN
        }
    }

    /// Encode the header to bytes
    pub fn encode(&self, buf: &mut BytesMut) {
        let flags = (PFCP_VERSION << 5)
            | ((self.message_priority as u8) << 1)
            | (self.seid_presence as u8);
        buf.put_u8(flags);
        buf.put_u8(self.message_type.value());
        buf.put_u16(self.length);
        if self.seid_presence {
            buf.put_u64(self.seid.unwrap_or(0));
        }
        let prio = self.priority.unwrap_or(0) & 0x0f;
        buf.put_u32(((self.sequence_number & PFCP_MAX_SEQUENCE) << 8) | u32::from(prio << 4));
    }

    /// Decode header from bytes
    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        if buf.remaining() < 4 {
            return Err(PfcpError::BufferTooShort {
                needed: 4,
                available: buf.remaining(),
            });
        }

        let flags = buf.get_u8();
        let version = flags >> 5;
        if version != PFCP_VERSION {
            return Err(PfcpError::VersionNotSupported(version));
        }
        let message_priority = flags & 0x02 != 0;
        let seid_presence = flags & 0x01 != 0;

        let message_type = PfcpMessageType::from(buf.get_u8());
        let length = buf.get_u16();

        let needed = if seid_presence { 12 } else { 4 };
        if buf.remaining() < needed {
            return Err(PfcpError::BufferTooShort {
                needed,
                available: buf.remaining(),
            });
        }

        let seid = seid_presence.then(|| buf.get_u64());
        let word = buf.get_u32();
        let priority = message_priority.then_some(((word >> 4) & 0x0f) as u8);

        Ok(Self {
            seid_presence,
            message_priority,
            message_type,
            length,
            seid,
            sequence_number: word >> 8,
            priority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_no_seid() {
        let header = PfcpHeader::new(PfcpMessageType::AssociationSetupRequest, 12345);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), PFCP_HEADER_LEN);
        assert_eq!(buf[0], 0x20);

        let decoded = PfcpHeader::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_with_seid() {
        let header = PfcpHeader::new_with_seid(
            PfcpMessageType::SessionEstablishmentResponse,
            0x1234_5678_9abc_def0,
            54321,
        );
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), PFCP_HEADER_LEN_WITH_SEID);
        assert_eq!(buf[0], 0x21);

        let decoded = PfcpHeader::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.seid, Some(0x1234_5678_9abc_def0));
        assert_eq!(decoded.sequence_number, 54321);
    }

    #[test]
    fn test_priority_nibble() {
        let mut header = PfcpHeader::new(PfcpMessageType::HeartbeatRequest, 1);
        header.message_priority = true;
        header.priority = Some(7);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(PfcpHeader::decode(&mut buf.freeze()).unwrap().priority, Some(7));
    }

    #[test]
    fn test_rejects_version_2() {
        let mut bytes = Bytes::from_static(&[0x40, 1, 0, 4, 0, 0, 1, 0]);
        assert_eq!(
            PfcpHeader::decode(&mut bytes),
            Err(PfcpError::VersionNotSupported(2))
        );
    }

    #[test]
    fn test_request_classification() {
        assert!(PfcpMessageType::AssociationSetupRequest.is_request());
        assert!(!PfcpMessageType::AssociationSetupResponse.is_request());
        assert!(!PfcpMessageType::VersionNotSupportedResponse.is_request());
        assert!(PfcpMessageType::SessionSetModificationRequest.is_request());
        assert!(PfcpMessageType::SessionReportRequest.has_seid());
        assert!(!PfcpMessageType::HeartbeatRequest.has_seid());
    }

    #[test]
    fn test_unknown_type_is_kept() {
        let mut bytes = Bytes::from_static(&[0x20, 99, 0, 4, 0, 0, 5, 0]);
        let header = PfcpHeader::decode(&mut bytes).unwrap();
        assert_eq!(header.message_type, PfcpMessageType::Unknown(99));
        assert_eq!(header.message_type.value(), 99);
        assert!(header.message_type.is_request());
        assert_eq!(header.sequence_number, 5);
        assert_eq!(PfcpMessageType::from(56), PfcpMessageType::SessionReportRequest);
    }
}
