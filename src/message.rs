use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{Error, Result};

/// FIFO group shared by every address in the pool.
pub const GROUP_KEY: &str = "available_ip";

pub const ATTR_NAME: &str = "Name";
pub const ATTR_TYPE: &str = "Type";
pub const ATTR_TIMESTAMP: &str = "Timestamp";
pub const NAME_VALUE: &str = "IP Address";
pub const ATTRIBUTE_DATA_TYPE: &str = "String";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpKind {
    V4,
    V6,
}

impl IpKind {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => IpKind::V4,
            IpAddr::V6(_) => IpKind::V6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IpKind::V4 => "ipv4",
            IpKind::V6 => "ipv6",
        }
    }

    pub fn from_attribute(value: &str) -> Option<Self> {
        match value {
            "ipv4" => Some(IpKind::V4),
            "ipv6" => Some(IpKind::V6),
            _ => None,
        }
    }
}

impl fmt::Display for IpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses an address literal, ignoring surrounding whitespace.
pub fn parse_address(input: &str) -> Result<IpAddr> {
    input
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| Error::Parse(input.to_string()))
}

/// One pool entry as published to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseMessage {
    pub address: IpAddr,
    pub issued_at: DateTime<Utc>,
}

impl LeaseMessage {
    pub fn new(address: IpAddr) -> Self {
        Self::issued_at(address, Utc::now())
    }

    pub fn issued_at(address: IpAddr, issued_at: DateTime<Utc>) -> Self {
        Self { address, issued_at }
    }

    /// Canonical text of the address; IPv6 is compressed per RFC 5952.
    pub fn body(&self) -> String {
        self.address.to_string()
    }

    pub fn kind(&self) -> IpKind {
        IpKind::of(&self.address)
    }

    pub fn group_key(&self) -> &'static str {
        GROUP_KEY
    }

    pub fn timestamp(&self) -> String {
        self.issued_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Message attributes in wire order. All of them are typed `String`.
    pub fn attributes(&self) -> [(&'static str, String); 3] {
        [
            (ATTR_NAME, NAME_VALUE.to_string()),
            (ATTR_TYPE, self.kind().as_str().to_string()),
            (ATTR_TIMESTAMP, self.timestamp()),
        ]
    }
}

/// Token the queue hands out with a delivery; needed to delete that delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message as delivered by a receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub body: String,
    pub attributes: HashMap<String, String>,
    pub receipt_handle: ReceiptHandle,
}

impl ReceivedMessage {
    pub fn kind(&self) -> Option<IpKind> {
        self.attributes
            .get(ATTR_TYPE)
            .and_then(|v| IpKind::from_attribute(v))
    }
}

/// Outcome of a single lease attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseResult {
    Unavailable,
    Available {
        address: String,
        receipt_handle: ReceiptHandle,
    },
}

impl LeaseResult {
    pub fn address(&self) -> Option<&str> {
        match self {
            LeaseResult::Available { address, .. } => Some(address),
            LeaseResult::Unavailable => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn classifies_by_parsed_family() {
        let v4 = parse_address("10.0.0.1").unwrap();
        let v6 = parse_address("2001:db8::1").unwrap();
        let mapped = parse_address("::ffff:10.0.0.1").unwrap();
        assert_eq!(IpKind::of(&v4), IpKind::V4);
        assert_eq!(IpKind::of(&v6), IpKind::V6);
        assert_eq!(IpKind::of(&mapped), IpKind::V6);
    }

    #[test]
    fn rejects_non_literals() {
        for input in ["not-an-ip", "", "10.0.0", "10.0.0.256", "example.com"] {
            assert!(matches!(parse_address(input), Err(Error::Parse(_))), "{input}");
        }
    }

    #[test]
    fn body_is_canonical() {
        let addr = parse_address(" 2001:0db8:0000:0000:0000:0000:0000:0001 ").unwrap();
        assert_eq!(LeaseMessage::new(addr).body(), "2001:db8::1");
    }

    #[test]
    fn attributes_use_wire_names() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let msg = LeaseMessage::issued_at(parse_address("192.168.1.5").unwrap(), at);
        let attrs = msg.attributes();
        assert_eq!(attrs[0], ("Name", "IP Address".to_string()));
        assert_eq!(attrs[1], ("Type", "ipv4".to_string()));
        assert_eq!(attrs[2], ("Timestamp", "2024-03-01T12:30:00Z".to_string()));
        assert_eq!(msg.group_key(), "available_ip");
    }

    #[test]
    fn received_kind_reads_type_attribute() {
        let msg = ReceivedMessage {
            body: "2001:db8::1".into(),
            attributes: HashMap::from([("Type".to_string(), "ipv6".to_string())]),
            receipt_handle: ReceiptHandle::new("r-1"),
        };
        assert_eq!(msg.kind(), Some(IpKind::V6));
    }
}
