//! GTPv2 Messages
//!
//! A decoded GTPv2-C message is its header plus a body. The body is a sum
//! type over the message kinds the S5-C dispatcher routes; every other kind
//! is kept as [`Gtp2Body::Other`] with its information elements untouched.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::header::{Gtp2Header, Gtp2MessageType};
use crate::error::{GtpError, GtpResult};

/// IE types the session-management path looks at
pub mod ie_type {
    pub const IMSI: u8 = 1;
    pub const CAUSE: u8 = 2;
    pub const RECOVERY: u8 = 3;
    pub const APN: u8 = 71;
    pub const EBI: u8 = 73;
    pub const F_TEID: u8 = 87;
    pub const BEARER_CONTEXT: u8 = 93;
}

/// Raw information element: type, instance and undecoded value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Ie {
    pub ie_type: u8,
    pub instance: u8,
    pub value: Bytes,
}

impl Gtp2Ie {
    pub fn new(ie_type: u8, instance: u8, value: impl Into<Bytes>) -> Self {
        Self {
            ie_type,
            instance: instance & 0x0f,
            value: value.into(),
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.ie_type);
        buf.put_u16(self.value.len() as u16);
        buf.put_u8(self.instance & 0x0f);
        buf.put_slice(&self.value);
    }

    fn encoded_len(&self) -> usize {
        4 + self.value.len()
    }

    fn decode(buf: &mut Bytes) -> GtpResult<Self> {
        if buf.remaining() < 4 {
            return Err(GtpError::BufferTooShort {
                needed: 4,
                available: buf.remaining(),
            });
        }
        let ie_type = buf.get_u8();
        let length = buf.get_u16() as usize;
        let instance = buf.get_u8() & 0x0f;
        if buf.remaining() < length {
            return Err(GtpError::InvalidIeLength {
                expected: length,
                actual: buf.remaining(),
            });
        }
        let value = buf.split_to(length);
        Ok(Self {
            ie_type,
            instance,
            value,
        })
    }
}

fn find_ie(ies: &[Gtp2Ie], ie_type: u8, instance: u8) -> Option<&Gtp2Ie> {
    ies.iter()
        .find(|ie| ie.ie_type == ie_type && ie.instance == instance)
}

macro_rules! gtp2_ie_message {
    ($($(#[$doc:meta])* $name:ident;)+) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Default, PartialEq, Eq)]
            pub struct $name {
                pub ies: Vec<Gtp2Ie>,
            }

            impl $name {
                /// Look up an IE by type and instance
                pub fn ie(&self, ie_type: u8, instance: u8) -> Option<&Gtp2Ie> {
                    find_ie(&self.ies, ie_type, instance)
                }
            }
        )+
    };
}

gtp2_ie_message! {
    /// Create Session Request (TS 29.274 7.2.1)
    CreateSessionRequest;
    /// Delete Session Request (TS 29.274 7.2.9)
    DeleteSessionRequest;
    /// Create Bearer Response (TS 29.274 7.2.4)
    CreateBearerResponse;
    /// Update Bearer Response (TS 29.274 7.2.16)
    UpdateBearerResponse;
    /// Delete Bearer Response (TS 29.274 7.2.10)
    DeleteBearerResponse;
    /// Bearer Resource Command (TS 29.274 7.2.5)
    BearerResourceCommand;
}

impl CreateSessionRequest {
    /// IMSI digits decoded from TBCD, if the IE is present
    pub fn imsi(&self) -> Option<String> {
        let ie = self.ie(ie_type::IMSI, 0)?;
        let mut digits = String::with_capacity(ie.value.len() * 2);
        for octet in ie.value.iter() {
            for nibble in [octet & 0x0f, octet >> 4] {
                if nibble > 9 {
                    return Some(digits);
                }
                digits.push(char::from(b'0' + nibble));
            }
        }
        Some(digits)
    }
}

macro_rules! gtp2_cause_accessor {
    ($($name:ident),+) => {
        $(
            impl $name {
                /// Cause value of the response, if present
                pub fn cause(&self) -> Option<u8> {
                    self.ie(ie_type::CAUSE, 0)
                        .and_then(|ie| ie.value.first().copied())
                }
            }
        )+
    };
}

gtp2_cause_accessor!(CreateBearerResponse, UpdateBearerResponse, DeleteBearerResponse);

/// Message body, one arm per routed message kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gtp2Body {
    CreateSessionRequest(CreateSessionRequest),
    DeleteSessionRequest(DeleteSessionRequest),
    CreateBearerResponse(CreateBearerResponse),
    UpdateBearerResponse(UpdateBearerResponse),
    DeleteBearerResponse(DeleteBearerResponse),
    BearerResourceCommand(BearerResourceCommand),
    /// Any kind the control plane does not route
    Other(Gtp2MessageType, Vec<Gtp2Ie>),
}

impl Gtp2Body {
    fn from_ies(message_type: Gtp2MessageType, ies: Vec<Gtp2Ie>) -> Self {
        match message_type {
            Gtp2MessageType::CreateSessionRequest => {
                Self::CreateSessionRequest(CreateSessionRequest { ies })
            }
            Gtp2MessageType::DeleteSessionRequest => {
                Self::DeleteSessionRequest(DeleteSessionRequest { ies })
            }
            Gtp2MessageType::CreateBearerResponse => {
                Self::CreateBearerResponse(CreateBearerResponse { ies })
            }
            Gtp2MessageType::UpdateBearerResponse => {
                Self::UpdateBearerResponse(UpdateBearerResponse { ies })
            }
            Gtp2MessageType::DeleteBearerResponse => {
                Self::DeleteBearerResponse(DeleteBearerResponse { ies })
            }
            Gtp2MessageType::BearerResourceCommand => {
                Self::BearerResourceCommand(BearerResourceCommand { ies })
            }
            other => Self::Other(other, ies),
        }
    }

    fn ies(&self) -> &[Gtp2Ie] {
        match self {
            Self::CreateSessionRequest(m) => &m.ies,
            Self::DeleteSessionRequest(m) => &m.ies,
            Self::CreateBearerResponse(m) => &m.ies,
            Self::UpdateBearerResponse(m) => &m.ies,
            Self::DeleteBearerResponse(m) => &m.ies,
            Self::BearerResourceCommand(m) => &m.ies,
            Self::Other(_, ies) => ies,
        }
    }
}

/// Decoded GTPv2-C message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Message {
    pub header: Gtp2Header,
    pub body: Gtp2Body,
}

impl Gtp2Message {
    /// Build a message from a header and its IEs
    pub fn new(header: Gtp2Header, ies: Vec<Gtp2Ie>) -> Self {
        let body = Gtp2Body::from_ies(header.message_type, ies);
        Self { header, body }
    }

    pub fn message_type(&self) -> Gtp2MessageType {
        self.header.message_type
    }

    pub fn ies(&self) -> &[Gtp2Ie] {
        self.body.ies()
    }

    /// Encode the message; the header length field is computed here
    pub fn encode(&self) -> BytesMut {
        let ies_len: usize = self.ies().iter().map(Gtp2Ie::encoded_len).sum();
        let mut header = self.header.clone();
        header.length = (header.header_len() - 4 + ies_len) as u16;

        let mut buf = BytesMut::with_capacity(header.header_len() + ies_len);
        header.encode(&mut buf);
        for ie in self.ies() {
            ie.encode(&mut buf);
        }
        buf
    }

    /// Decode a complete datagram
    pub fn decode(mut buf: Bytes) -> GtpResult<Self> {
        let header = Gtp2Header::decode(&mut buf)?;

        let declared = (header.length as usize)
            .checked_sub(header.header_len() - 4)
            .ok_or(GtpError::InvalidLength {
                declared: header.length as usize,
                actual: buf.remaining(),
            })?;
        if declared > buf.remaining() {
            return Err(GtpError::InvalidLength {
                declared,
                actual: buf.remaining(),
            });
        }

        // Piggybacked messages follow the declared length; they are ignored
        let mut payload = buf.split_to(declared);
        let mut ies = Vec::new();
        while payload.has_remaining() {
            ies.push(Gtp2Ie::decode(&mut payload)?);
        }

        Ok(Self::new(header, ies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imsi_ie() -> Gtp2Ie {
        // 001010123456789 in TBCD, odd digit count padded with 0xf
        Gtp2Ie::new(
            ie_type::IMSI,
            0,
            Bytes::from_static(&[0x00, 0x01, 0x01, 0x21, 0x43, 0x65, 0x87, 0xf9]),
        )
    }

    #[test]
    fn test_create_session_request_body() {
        let header = Gtp2Header::new(Gtp2MessageType::CreateSessionRequest, 0, 1);
        let msg = Gtp2Message::new(header, vec![imsi_ie()]);
        let decoded = Gtp2Message::decode(msg.encode().freeze()).unwrap();

        match decoded.body {
            Gtp2Body::CreateSessionRequest(ref req) => {
                assert_eq!(req.imsi().as_deref(), Some("001010123456789"));
            }
            ref other => panic!("unexpected body {other:?}"),
        }
        assert_eq!(decoded.header.length, 8 + 12);
    }

    #[test]
    fn test_unrouted_kind_is_other() {
        let header = Gtp2Header::new(Gtp2MessageType::ModifyBearerRequest, 5, 1);
        let msg = Gtp2Message::new(header, Vec::new());
        let decoded = Gtp2Message::decode(msg.encode().freeze()).unwrap();
        assert_eq!(
            decoded.body,
            Gtp2Body::Other(Gtp2MessageType::ModifyBearerRequest, Vec::new())
        );
    }

    #[test]
    fn test_cause_accessor() {
        let header = Gtp2Header::new(Gtp2MessageType::DeleteBearerResponse, 9, 3);
        let msg = Gtp2Message::new(header, vec![Gtp2Ie::new(ie_type::CAUSE, 0, vec![16u8, 0])]);
        match Gtp2Message::decode(msg.encode().freeze()).unwrap().body {
            Gtp2Body::DeleteBearerResponse(rsp) => assert_eq!(rsp.cause(), Some(16)),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_truncated_ie_is_rejected() {
        let header = Gtp2Header::new(Gtp2MessageType::DeleteSessionRequest, 1, 1);
        let mut raw = Gtp2Message::new(header, vec![Gtp2Ie::new(ie_type::EBI, 0, vec![5u8])])
            .encode();
        // Claim a longer IE than the datagram carries
        raw[13] = 0x09;
        assert!(matches!(
            Gtp2Message::decode(raw.freeze()),
            Err(GtpError::InvalidIeLength { .. })
        ));
    }

    #[test]
    fn test_length_beyond_buffer() {
        let bytes = Bytes::from_static(&[0x48, 32, 0x00, 0x40, 0, 0, 0, 0, 0, 0, 1, 0]);
        assert!(matches!(
            Gtp2Message::decode(bytes),
            Err(GtpError::InvalidLength { .. })
        ));
    }
}
