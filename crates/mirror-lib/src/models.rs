//! Core data models for the route mirror

use crate::error::RowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Conversion from a record delivered by a remote source into the
/// `(key, attributes)` pair stored in the snapshot table.
pub trait DecodeRow {
    /// Row key, unique per logical entity
    type Key: Ord + Clone + fmt::Debug + Send + Sync + 'static;
    /// Row payload, compared as a whole when diffing
    type Attrs: PartialEq + fmt::Debug + Send + Sync + 'static;

    fn decode(self) -> Result<(Self::Key, Self::Attrs), RowError>;
}

/// Index of a path attribute row: `prefix.prefix_len.peer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteKey {
    pub prefix: Ipv4Addr,
    pub prefix_len: u8,
    pub peer: Ipv4Addr,
}

impl RouteKey {
    /// Build a key, masking `prefix` to `prefix_len` bits
    pub fn new(prefix: Ipv4Addr, prefix_len: u8, peer: Ipv4Addr) -> Result<Self, RowError> {
        let index = Self::index(prefix, prefix_len, peer)?;
        let mask = match prefix_len {
            0 => 0,
            len => u32::MAX << (32 - u32::from(len)),
        };
        Ok(Self {
            prefix: Ipv4Addr::from(u32::from(index.prefix) & mask),
            ..index
        })
    }

    /// Build a search index as given, without masking.
    ///
    /// Stored keys are always masked; an unmasked index is only meaningful
    /// as a position to walk from.
    pub fn index(prefix: Ipv4Addr, prefix_len: u8, peer: Ipv4Addr) -> Result<Self, RowError> {
        if prefix_len > 32 {
            return Err(RowError::InvalidPrefixLength(prefix_len));
        }
        Ok(Self {
            prefix,
            prefix_len,
            peer,
        })
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} via {}", self.prefix, self.prefix_len, self.peer)
    }
}

/// Path attributes received for a route from one peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathAttributes {
    pub origin: u8,
    pub as_path: Vec<u8>,
    pub next_hop: Ipv4Addr,
    pub multi_exit_disc: i32,
    pub local_pref: i32,
    pub atomic_aggregate: i32,
    pub aggregator_as: u16,
    pub aggregator_addr: Ipv4Addr,
    pub calc_local_pref: i32,
    pub best: u16,
    pub unknown: Vec<u8>,
}

/// One route entry as returned by the upstream route list call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRoute {
    pub peer_id: Ipv4Addr,
    pub prefix: Ipv4Addr,
    pub prefix_len: u8,
    /// Best flag in the upper 16 bits, origin in the low byte
    pub best_and_origin: u32,
    #[serde(default)]
    pub as_path: Vec<u8>,
    pub next_hop: Ipv4Addr,
    #[serde(default)]
    pub med: i32,
    #[serde(default)]
    pub local_pref: i32,
    #[serde(default)]
    pub atomic_aggregate: i32,
    /// Empty, or 4 address bytes followed by 2 AS bytes
    #[serde(default)]
    pub aggregator: Vec<u8>,
    #[serde(default)]
    pub calc_local_pref: i32,
    #[serde(default)]
    pub unknown: Vec<u8>,
}

impl DecodeRow for RawRoute {
    type Key = RouteKey;
    type Attrs = PathAttributes;

    fn decode(self) -> Result<(RouteKey, PathAttributes), RowError> {
        let key = RouteKey::new(self.prefix, self.prefix_len, self.peer_id)?;

        let (aggregator_addr, aggregator_as) = match self.aggregator.as_slice() {
            [] => (Ipv4Addr::UNSPECIFIED, 0),
            [a, b, c, d, hi, lo] => (Ipv4Addr::new(*a, *b, *c, *d), u16::from_be_bytes([*hi, *lo])),
            other => return Err(RowError::InvalidAggregator(other.len())),
        };

        let attrs = PathAttributes {
            origin: (self.best_and_origin & 0xFF) as u8,
            as_path: self.as_path,
            next_hop: self.next_hop,
            multi_exit_disc: self.med,
            local_pref: self.local_pref,
            atomic_aggregate: self.atomic_aggregate,
            aggregator_as,
            aggregator_addr,
            calc_local_pref: self.calc_local_pref,
            best: (self.best_and_origin >> 16) as u16,
            unknown: self.unknown,
        };

        Ok((key, attrs))
    }
}
