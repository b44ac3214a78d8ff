//! This module holds entities whose goal is to enable routing requests optimally,
//! that is, choosing a target node such that it is a replica for given token.
//!
//! This includes:
//! - token representation,
//! - partitioners, which compute token based on a partition key,
//! - replica locator, which finds replicas for a given token.
//!

pub mod locator;
pub mod partitioner;

use bytes::Bytes;
use itertools::Itertools;
use std::fmt::Display;

/// Token is a result of computing a hash of a partition key.
///
/// Its representation depends on the partitioner which produced it:
/// - `Murmur3Partitioner` tokens are `i64` numbers. There is one caveat: i64::MIN is not
///   a valid token, it is used to represent infinity. For this reason tokens are normalized -
///   i64::MIN is replaced with i64::MAX when the token is created using [Token::new].
/// - `ByteOrderedPartitioner` tokens are the partition key bytes themselves,
///   ordered lexicographically.
///
/// Tokens produced by different partitioners never meet in a single ring, so the order
/// between them is of no importance (all numeric tokens sort before all byte tokens).
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Debug)]
pub struct Token {
    repr: TokenRepr,
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Debug)]
enum TokenRepr {
    Long(i64),
    Bytes(Bytes),
}

impl Token {
    /// Creates a new numeric token with given value, normalizing the value if necessary.
    #[inline]
    pub fn new(value: i64) -> Self {
        Self {
            repr: TokenRepr::Long(if value == i64::MIN { i64::MAX } else { value }),
        }
    }

    /// Creates a new byte-ordered token.
    #[inline]
    pub fn from_bytes(value: impl Into<Bytes>) -> Self {
        Self {
            repr: TokenRepr::Bytes(value.into()),
        }
    }

    /// Value of a numeric token, `None` for byte-ordered tokens.
    #[inline]
    pub fn value(&self) -> Option<i64> {
        match self.repr {
            TokenRepr::Long(value) => Some(value),
            TokenRepr::Bytes(_) => None,
        }
    }

    /// Bytes of a byte-ordered token, `None` for numeric tokens.
    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.repr {
            TokenRepr::Long(_) => None,
            TokenRepr::Bytes(bytes) => Some(bytes),
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.repr {
            TokenRepr::Long(value) => write!(f, "{}", value),
            TokenRepr::Bytes(bytes) => write!(
                f,
                "0x{}",
                bytes
                    .iter()
                    .format_with("", |byte, g| g(&format_args!("{:02x}", byte)))
            ),
        }
    }
}
