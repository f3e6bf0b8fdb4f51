//! ICMP Echo wire format.
//!
//! Echo header layout (RFC 792), offsets relative to the start of the ICMP message:
//!
//! | offset | width | field      |
//! |--------|-------|------------|
//! | 0      | 1     | type       |
//! | 1      | 1     | code       |
//! | 2      | 2     | checksum   |
//! | 4      | 2     | identifier |
//! | 6      | 2     | sequence   |
//! | 8      | ..    | payload    |
//!
//! All multi-byte fields are big-endian. Inbound datagrams from a raw socket
//! still carry their IPv4 header, whose length is read from the low nibble of
//! byte 0 (in 32-bit words) and whose TTL sits at byte 8.

use thiserror::Error;

use crate::checksum::checksum;

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_ECHO_REQUEST: u8 = 8;

pub const ICMP_HEADER_LEN: usize = 8;
/// Smallest Echo Request we put on the wire, header included.
pub const MIN_PACKET_LEN: usize = 64;
pub const DEFAULT_PAYLOAD_LEN: usize = MIN_PACKET_LEN - ICMP_HEADER_LEN;

const TYPE_OFFSET: usize = 0;
const CODE_OFFSET: usize = 1;
const CHECKSUM_OFFSET: usize = 2;
const IDENTIFIER_OFFSET: usize = 4;
const SEQUENCE_OFFSET: usize = 6;

const IPV4_MIN_HEADER_LEN: usize = 20;
const IPV4_TTL_OFFSET: usize = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("short packet: {len} bytes, need {needed}")]
    ShortPacket { len: usize, needed: usize },
    #[error("not an IPv4 datagram (version {0})")]
    NotIpv4(u8),
    #[error("invalid IPv4 header length {0}")]
    BadHeaderLength(usize),
}

/// One outbound probe. Built per sequence number and dropped after send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoRequest<'a> {
    pub identifier: u16,
    pub sequence: u16,
    pub payload: &'a [u8],
}

impl<'a> EchoRequest<'a> {
    pub fn new(identifier: u16, sequence: u16, payload: &'a [u8]) -> Self {
        Self {
            identifier,
            sequence,
            payload,
        }
    }

    /// Serializes the request, zero-padding the payload so the packet is at
    /// least [`MIN_PACKET_LEN`] bytes, and fills in the checksum.
    pub fn encode(&self) -> Vec<u8> {
        let len = (ICMP_HEADER_LEN + self.payload.len()).max(MIN_PACKET_LEN);
        let mut buf = vec![0u8; len];

        buf[TYPE_OFFSET] = ICMP_ECHO_REQUEST;
        buf[CODE_OFFSET] = 0;
        buf[IDENTIFIER_OFFSET..IDENTIFIER_OFFSET + 2].copy_from_slice(&self.identifier.to_be_bytes());
        buf[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 2].copy_from_slice(&self.sequence.to_be_bytes());
        buf[ICMP_HEADER_LEN..ICMP_HEADER_LEN + self.payload.len()].copy_from_slice(self.payload);

        let sum = checksum(&buf);
        buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&sum.to_be_bytes());
        buf
    }
}

pub fn encode_echo_request(identifier: u16, sequence: u16, payload: &[u8]) -> Vec<u8> {
    EchoRequest::new(identifier, sequence, payload).encode()
}

/// An inbound ICMP message with the fields the engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoReply {
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub identifier: u16,
    pub sequence: u16,
    pub ttl: u8,
    /// Length of the ICMP portion (datagram minus IP header).
    pub icmp_len: usize,
}

impl EchoReply {
    /// A reply belongs to a session iff it is an Echo Reply carrying the
    /// session identifier. The sequence number is not checked.
    pub fn is_reply_for(&self, identifier: u16) -> bool {
        self.icmp_type == ICMP_ECHO_REPLY && self.identifier == identifier
    }
}

/// Decodes a datagram as delivered by a raw IPv4 socket (IP header included).
pub fn decode_reply(datagram: &[u8]) -> Result<EchoReply, ParseError> {
    let first = *datagram.first().ok_or(ParseError::ShortPacket {
        len: 0,
        needed: IPV4_MIN_HEADER_LEN + ICMP_HEADER_LEN,
    })?;

    let version = first >> 4;
    if version != 4 {
        return Err(ParseError::NotIpv4(version));
    }

    let ip_len = usize::from(first & 0x0f) * 4;
    if ip_len < IPV4_MIN_HEADER_LEN {
        return Err(ParseError::BadHeaderLength(ip_len));
    }

    let needed = ip_len + ICMP_HEADER_LEN;
    if datagram.len() < needed {
        return Err(ParseError::ShortPacket {
            len: datagram.len(),
            needed,
        });
    }

    let icmp = &datagram[ip_len..];
    Ok(EchoReply {
        icmp_type: icmp[TYPE_OFFSET],
        icmp_code: icmp[CODE_OFFSET],
        identifier: u16::from_be_bytes([icmp[IDENTIFIER_OFFSET], icmp[IDENTIFIER_OFFSET + 1]]),
        sequence: u16::from_be_bytes([icmp[SEQUENCE_OFFSET], icmp[SEQUENCE_OFFSET + 1]]),
        ttl: datagram[IPV4_TTL_OFFSET],
        icmp_len: icmp.len(),
    })
}

#[cfg(test)]
pub(crate) fn ipv4_wrap(ttl: u8, icmp: &[u8]) -> Vec<u8> {
    let mut datagram = vec![0u8; IPV4_MIN_HEADER_LEN];
    datagram[0] = 0x45;
    datagram[IPV4_TTL_OFFSET] = ttl;
    datagram[9] = 1;
    datagram.extend_from_slice(icmp);
    datagram
}
