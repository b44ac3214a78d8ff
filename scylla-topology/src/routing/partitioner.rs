//! Partitioners are algorithms that can compute token for a given partition key,
//! ultimately allowing optimised routing of requests (such that a request is routed
//! to replicas, which are nodes that really own the data the request concerns).
//! Currently, two partitioners are supported:
//! - Murmur3Partitioner
//!     - the default partitioner,
//!     - hash based, scatters keys uniformly over the ring,
//!     - modified for compatibility with Cassandra's buggy implementation.
//! - ByteOrderedPartitioner
//!     - order preserving, the token is the partition key itself.

use bytes::{Buf, Bytes, BytesMut};
use std::fmt::Display;
use std::num::Wrapping;

use crate::errors::{TokenCalculationError, TokenParseError};
use crate::routing::Token;

/// Partitioner employed by the cluster.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[non_exhaustive]
pub enum PartitionerName {
    /// `org.apache.cassandra.dht.Murmur3Partitioner`
    #[default]
    Murmur3,
    /// `org.apache.cassandra.dht.ByteOrderedPartitioner`
    ByteOrdered,
}

impl PartitionerName {
    /// Resolves a partitioner by its (possibly fully qualified) class name,
    /// as reported in `system.local`.
    pub fn from_class_name(name: &str) -> Option<Self> {
        if name.ends_with("Murmur3Partitioner") {
            Some(PartitionerName::Murmur3)
        } else if name.ends_with("ByteOrderedPartitioner") {
            Some(PartitionerName::ByteOrdered)
        } else {
            None
        }
    }

    /// Computes the token of a single, already serialized partition key.
    pub fn hash_one(&self, partition_key: &[u8]) -> Token {
        let mut hasher = self.build_hasher();
        hasher.write(partition_key);
        hasher.finish()
    }

    /// Parses a token from its textual form, as found in `system.local.tokens`
    /// and `system.peers.tokens`.
    ///
    /// Murmur3 tokens are decimal `i64` numbers. Byte-ordered tokens are hex strings,
    /// with an optional `0x` prefix.
    pub fn parse_token(&self, token: &str) -> Result<Token, TokenParseError> {
        let parsed = match self {
            PartitionerName::Murmur3 => token.parse::<i64>().ok().map(Token::new),
            PartitionerName::ByteOrdered => decode_hex(token).map(Token::from_bytes),
        };

        parsed.ok_or_else(|| TokenParseError {
            partitioner: *self,
            token: token.to_owned(),
        })
    }
}

impl Display for PartitionerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionerName::Murmur3 => write!(f, "Murmur3Partitioner"),
            PartitionerName::ByteOrdered => write!(f, "ByteOrderedPartitioner"),
        }
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.len() % 2 != 0 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect()
}

impl Partitioner for PartitionerName {
    type Hasher = PartitionerHasherAny;

    fn build_hasher(&self) -> Self::Hasher {
        match self {
            PartitionerName::Murmur3 => {
                PartitionerHasherAny::Murmur3(Murmur3Partitioner.build_hasher())
            }
            PartitionerName::ByteOrdered => {
                PartitionerHasherAny::ByteOrdered(ByteOrderedPartitioner.build_hasher())
            }
        }
    }
}

pub(crate) enum PartitionerHasherAny {
    Murmur3(Murmur3PartitionerHasher),
    ByteOrdered(ByteOrderedPartitionerHasher),
}

impl PartitionerHasher for PartitionerHasherAny {
    fn write(&mut self, pk_part: &[u8]) {
        match self {
            PartitionerHasherAny::Murmur3(h) => h.write(pk_part),
            PartitionerHasherAny::ByteOrdered(h) => h.write(pk_part),
        }
    }

    fn finish(&self) -> Token {
        match self {
            PartitionerHasherAny::Murmur3(h) => h.finish(),
            PartitionerHasherAny::ByteOrdered(h) => h.finish(),
        }
    }
}

/// A trait for creating instances of `PartitionHasher`, which ultimately compute the token.
///
/// The Partitioners' design is based on std::hash design: `Partitioner`
/// corresponds to `HasherBuilder`, and `PartitionerHasher` to `Hasher`.
pub(crate) trait Partitioner {
    type Hasher: PartitionerHasher;

    fn build_hasher(&self) -> Self::Hasher;

    #[cfg(test)]
    fn hash_one(&self, data: &[u8]) -> Token {
        let mut hasher = self.build_hasher();
        hasher.write(data);
        hasher.finish()
    }
}

/// A trait for hashing a stream of serialized partition key components.
///
/// Instances of this trait are created by a `Partitioner` and are stateful.
/// At any point, one can call `finish()` and a `Token` will be computed
/// based on values that has been fed so far.
pub(crate) trait PartitionerHasher {
    fn write(&mut self, pk_part: &[u8]);
    fn finish(&self) -> Token;
}

pub(crate) struct Murmur3Partitioner;

impl Partitioner for Murmur3Partitioner {
    type Hasher = Murmur3PartitionerHasher;

    fn build_hasher(&self) -> Self::Hasher {
        Self::Hasher {
            total_len: 0,
            buf: Default::default(),
            h1: Wrapping(0),
            h2: Wrapping(0),
        }
    }
}

pub(crate) struct Murmur3PartitionerHasher {
    total_len: usize,
    buf: [u8; Self::BUF_CAPACITY],
    h1: Wrapping<i64>,
    h2: Wrapping<i64>,
}

impl Murmur3PartitionerHasher {
    const BUF_CAPACITY: usize = 16;

    const C1: Wrapping<i64> = Wrapping(0x87c3_7b91_1142_53d5_u64 as i64);
    const C2: Wrapping<i64> = Wrapping(0x4cf5_ad43_2745_937f_u64 as i64);

    fn mix_block(&mut self, mut k1: Wrapping<i64>, mut k2: Wrapping<i64>) {
        k1 *= Self::C1;
        k1 = Self::rotl64(k1, 31);
        k1 *= Self::C2;
        self.h1 ^= k1;

        self.h1 = Self::rotl64(self.h1, 27);
        self.h1 += self.h2;
        self.h1 = self.h1 * Wrapping(5) + Wrapping(0x52dce729);

        k2 *= Self::C2;
        k2 = Self::rotl64(k2, 33);
        k2 *= Self::C1;
        self.h2 ^= k2;

        self.h2 = Self::rotl64(self.h2, 31);
        self.h2 += self.h1;
        self.h2 = self.h2 * Wrapping(5) + Wrapping(0x38495ab5);
    }

    fn read_block(buf: &mut &[u8]) -> (Wrapping<i64>, Wrapping<i64>) {
        let k1 = Wrapping(buf.get_i64_le());
        let k2 = Wrapping(buf.get_i64_le());
        (k1, k2)
    }

    #[inline]
    fn rotl64(v: Wrapping<i64>, n: u32) -> Wrapping<i64> {
        Wrapping((v.0 << n) | (v.0 as u64 >> (64 - n)) as i64)
    }

    #[inline]
    fn fmix(mut k: Wrapping<i64>) -> Wrapping<i64> {
        k ^= Wrapping((k.0 as u64 >> 33) as i64);
        k *= Wrapping(0xff51afd7ed558ccd_u64 as i64);
        k ^= Wrapping((k.0 as u64 >> 33) as i64);
        k *= Wrapping(0xc4ceb9fe1a85ec53_u64 as i64);
        k ^= Wrapping((k.0 as u64 >> 33) as i64);

        k
    }
}

// Input is consumed in 16-byte blocks, each mixed into (h1, h2) as soon as it is complete.
// The tail (< 16 bytes) stays in `buf` and is only mixed in `finish()`, which is why
// `finish()` works on copies of h1 and h2.
//
// Tail bytes are sign-extended (`as i8 as i64`), which is the behaviour of Cassandra's
// implementation and must be preserved for the tokens to match the cluster's.
impl PartitionerHasher for Murmur3PartitionerHasher {
    fn write(&mut self, mut pk_part: &[u8]) {
        let mut buf_len = self.total_len % Self::BUF_CAPACITY;
        self.total_len += pk_part.len();

        // Complete a partially filled block first.
        if buf_len > 0 && Self::BUF_CAPACITY - buf_len <= pk_part.len() {
            let to_write = Self::BUF_CAPACITY - buf_len;
            self.buf[buf_len..].copy_from_slice(&pk_part[..to_write]);
            pk_part.advance(to_write);

            let mut block = &self.buf[..];
            let (k1, k2) = Self::read_block(&mut block);
            debug_assert!(block.is_empty());
            self.mix_block(k1, k2);
            buf_len = 0;
        }

        // Whole blocks can be mixed straight from the input.
        if buf_len == 0 {
            while pk_part.len() >= Self::BUF_CAPACITY {
                let (k1, k2) = Self::read_block(&mut pk_part);
                self.mix_block(k1, k2);
            }
        }

        debug_assert!(pk_part.len() < Self::BUF_CAPACITY - buf_len);
        let to_write = pk_part.len();
        self.buf[buf_len..buf_len + to_write].copy_from_slice(pk_part);
    }

    fn finish(&self) -> Token {
        let mut h1 = self.h1;
        let mut h2 = self.h2;

        let mut k1 = Wrapping(0_i64);
        let mut k2 = Wrapping(0_i64);

        let buf_len = self.total_len % Self::BUF_CAPACITY;

        if buf_len > 8 {
            for i in (8..buf_len).rev() {
                k2 ^= Wrapping(self.buf[i] as i8 as i64) << ((i - 8) * 8);
            }

            k2 *= Self::C2;
            k2 = Self::rotl64(k2, 33);
            k2 *= Self::C1;
            h2 ^= k2;
        }

        if buf_len > 0 {
            for i in (0..std::cmp::min(8, buf_len)).rev() {
                k1 ^= Wrapping(self.buf[i] as i8 as i64) << (i * 8);
            }

            k1 *= Self::C1;
            k1 = Self::rotl64(k1, 31);
            k1 *= Self::C2;
            h1 ^= k1;
        }

        h1 ^= Wrapping(self.total_len as i64);
        h2 ^= Wrapping(self.total_len as i64);

        h1 += h2;
        h2 += h1;

        h1 = Self::fmix(h1);
        h2 = Self::fmix(h2);

        h1 += h2;

        Token::new(h1.0)
    }
}

pub(crate) struct ByteOrderedPartitioner;

impl Partitioner for ByteOrderedPartitioner {
    type Hasher = ByteOrderedPartitionerHasher;

    fn build_hasher(&self) -> Self::Hasher {
        Self::Hasher {
            key: BytesMut::new(),
        }
    }
}

/// The "hash" of a byte-ordered partitioner is the key itself.
pub(crate) struct ByteOrderedPartitionerHasher {
    key: BytesMut,
}

impl PartitionerHasher for ByteOrderedPartitionerHasher {
    fn write(&mut self, pk_part: &[u8]) {
        self.key.extend_from_slice(pk_part);
    }

    fn finish(&self) -> Token {
        Token::from_bytes(Bytes::copy_from_slice(&self.key))
    }
}

/// Calculates the token for given partitioner and serialized partition key components.
///
/// A single-column partition key is hashed as is. A composite partition key is
/// hashed in the composite format used by the cluster: each component is prefixed
/// with its length (big-endian `u16`) and followed by a zero byte.
///
/// NOTE: the provided values must completely constitute partition key
/// and be in the order defined in CREATE TABLE statement.
pub fn calculate_token_for_partition_key(
    partition_key_components: &[&[u8]],
    partitioner: &PartitionerName,
) -> Result<Token, TokenCalculationError> {
    let mut partitioner_hasher = partitioner.build_hasher();

    if let [single] = partition_key_components {
        partitioner_hasher.write(single);
    } else {
        for component in partition_key_components {
            let len_u16: u16 = component
                .len()
                .try_into()
                .map_err(|_| TokenCalculationError::ValueTooLong(component.len()))?;
            partitioner_hasher.write(&len_u16.to_be_bytes());
            partitioner_hasher.write(component);
            partitioner_hasher.write(&[0u8]);
        }
    }

    Ok(partitioner_hasher.finish())
}
