use crate::routing::Token;

/// A token ring is a continuous hash ring. It defines association by hashing a key onto the ring and then walking the ring in one direction.
/// Cassandra and Scylla use it for determining data ownership.
/// Each ring member has a token which defines the member's position on the ring.
/// The ring is circular and can be traversed in the order of increasing tokens.
/// `TokenRing` makes it easy and efficient to traverse the ring starting at a given token.
///
/// Every token appears in the ring at most once.
#[derive(Debug, Clone)]
pub struct TokenRing<ElemT> {
    ring: Vec<(Token, ElemT)>,
}

impl<ElemT> TokenRing<ElemT> {
    /// Builds a ring out of (token, member) pairs.
    ///
    /// If several pairs carry the same token, the one yielded last wins,
    /// and `on_duplicate` is called with the token, the replaced member and the winning member.
    pub(crate) fn new(
        ring_iter: impl Iterator<Item = (Token, ElemT)>,
        mut on_duplicate: impl FnMut(&Token, &ElemT, &ElemT),
    ) -> TokenRing<ElemT> {
        // Stable sort keeps pairs with equal tokens in the order they were yielded.
        let mut sorted: Vec<(Token, ElemT)> = ring_iter.collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut ring: Vec<(Token, ElemT)> = Vec::with_capacity(sorted.len());
        for (token, elem) in sorted {
            match ring.last_mut() {
                Some(last) if last.0 == token => {
                    on_duplicate(&token, &last.1, &elem);
                    last.1 = elem;
                }
                _ => ring.push((token, elem)),
            }
        }

        TokenRing { ring }
    }

    /// Iterates over all members of the ring starting at the lowest token.
    pub fn iter(&self) -> impl Iterator<Item = &(Token, ElemT)> {
        self.ring.iter()
    }

    /// Index of the member responsible for the given token: the first member whose
    /// token is not less than the given one, wrapping around to the lowest token.
    /// Returns `None` for an empty ring.
    pub fn position(&self, token: &Token) -> Option<usize> {
        if self.ring.is_empty() {
            return None;
        }

        let index = self.ring.partition_point(|(t, _)| t < token);
        Some(if index == self.ring.len() { 0 } else { index })
    }

    /// Provides an iterator over the ring members starting at the given token.
    /// The iterator traverses the whole ring in the direction of increasing tokens.
    /// After reaching the maximum token it wraps around and continues from the lowest one.
    /// The iterator visits each member once, it doesn't have an infinite length.
    pub fn ring_range_full(&self, token: &Token) -> impl Iterator<Item = &(Token, ElemT)> {
        self.ring_range_full_from(self.position(token).unwrap_or(0))
    }

    /// Like [TokenRing::ring_range_full], but starts at the member with the given index.
    pub(crate) fn ring_range_full_from(
        &self,
        index: usize,
    ) -> impl Iterator<Item = &(Token, ElemT)> {
        let (before, after) = self.ring.split_at(index.min(self.ring.len()));
        after.iter().chain(before.iter())
    }

    /// Provides an iterator over the ring's elements starting at the given token.
    /// To access the token along with the element you can use `ring_range_full`.
    pub fn ring_range(&self, token: &Token) -> impl Iterator<Item = &ElemT> {
        self.ring_range_full(token).map(|(_t, e)| e)
    }

    /// Returns the member at the given index, counting from the lowest token.
    pub(crate) fn get(&self, index: usize) -> Option<&(Token, ElemT)> {
        self.ring.get(index)
    }

    /// Traverses the ring starting at the given token and returns the first ring member encountered.
    pub fn get_elem_for_token(&self, token: &Token) -> Option<&ElemT> {
        self.position(token).map(|index| &self.ring[index].1)
    }

    /// Get the total number of members in the ring.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` if the token ring contains no elements.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
