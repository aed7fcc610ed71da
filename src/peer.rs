//! Raft peer identity and its RLP wire form.
//!
//! Encoded as the ordered list `[raft_id, node_id, ip, p2p_port, raft_port]`.
//! Other nodes decode these bytes, so field order and the 64-byte node id
//! are fixed.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use alloy_primitives::{Bytes, B512};
use alloy_rlp::{Decodable, Encodable, RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, RlpEncodable, RlpDecodable)]
#[serde(rename_all = "camelCase")]
pub struct RaftPeerAddress {
    pub raft_id: u16,
    /// Uncompressed secp256k1 public key without the `0x04` prefix
    pub node_id: B512,
    /// 4 bytes for IPv4, 16 for IPv6
    pub ip: Bytes,
    pub p2p_port: u16,
    pub raft_port: u16,
}

impl RaftPeerAddress {
    pub fn new(raft_id: u16, node_id: B512, ip: IpAddr, p2p_port: u16, raft_port: u16) -> Self {
        let ip = match ip {
            IpAddr::V4(v4) => Bytes::copy_from_slice(&v4.octets()),
            IpAddr::V6(v6) => Bytes::copy_from_slice(&v6.octets()),
        };
        Self {
            raft_id,
            node_id,
            ip,
            p2p_port,
            raft_port,
        }
    }

    /// `None` when the stored ip is neither 4 nor 16 bytes
    pub fn ip_addr(&self) -> Option<IpAddr> {
        match self.ip.len() {
            4 => <[u8; 4]>::try_from(self.ip.as_ref()).ok().map(|b| IpAddr::V4(Ipv4Addr::from(b))),
            16 => <[u8; 16]>::try_from(self.ip.as_ref()).ok().map(|b| IpAddr::V6(Ipv6Addr::from(b))),
            _ => None,
        }
    }

    pub fn to_rlp(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.length());
        self.encode(&mut out);
        out
    }

    /// Decode one address; trailing bytes are rejected.
    pub fn from_rlp(mut bytes: &[u8]) -> alloy_rlp::Result<Self> {
        let address = Self::decode(&mut bytes)?;
        if !bytes.is_empty() {
            return Err(alloy_rlp::Error::Custom("trailing bytes after peer address"));
        }
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RaftPeerAddress {
        RaftPeerAddress::new(1, B512::repeat_byte(0x11), IpAddr::V4(Ipv4Addr::LOCALHOST), 30303, 50400)
    }

    #[test]
    fn test_wire_layout() {
        let encoded = sample().to_rlp();
        assert_eq!(encoded.len(), 80);
        assert_eq!(&encoded[..5], &[0xf8, 0x4e, 0x01, 0xb8, 0x40]);
        assert!(encoded[5..69].iter().all(|b| *b == 0x11));
        assert_eq!(&encoded[69..], &[0x84, 0x7f, 0x00, 0x00, 0x01, 0x82, 0x76, 0x5f, 0x82, 0xc4, 0xe0]);
    }

    #[test]
    fn test_decode_preserves_fields() {
        let peer = RaftPeerAddress::from_rlp(&sample().to_rlp()).unwrap();
        assert_eq!(peer, sample());
        assert_eq!(peer.ip_addr(), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[test]
    fn test_decode_rejects_short_node_id() {
        // Same layout with a 63-byte node id.
        let mut payload = vec![0x01, 0xb8, 0x3f];
        payload.extend_from_slice(&[0x11; 63]);
        payload.extend_from_slice(&[0x84, 0x7f, 0x00, 0x00, 0x01, 0x82, 0x76, 0x5f, 0x82, 0xc4, 0xe0]);
        let mut encoded = vec![0xf8, payload.len() as u8];
        encoded.extend_from_slice(&payload);

        assert!(RaftPeerAddress::from_rlp(&encoded).is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut encoded = sample().to_rlp();
        encoded.push(0x00);
        assert!(RaftPeerAddress::from_rlp(&encoded).is_err());
    }

    #[test]
    fn test_ipv6() {
        let ip: IpAddr = "fe80::1".parse().unwrap();
        let peer = RaftPeerAddress::new(7, B512::ZERO, ip, 1, 2);
        assert_eq!(peer.ip.len(), 16);
        assert_eq!(RaftPeerAddress::from_rlp(&peer.to_rlp()).unwrap().ip_addr(), Some(ip));
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["raftId"], 1);
        assert_eq!(json["p2pPort"], 30303);
        assert_eq!(json["raftPort"], 50400);
        assert_eq!(json["ip"], "0x7f000001");
        assert!(json["nodeId"].as_str().unwrap().starts_with("0x1111"));
    }
}
