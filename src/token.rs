use fnv::FnvHashMap;

use crate::htmlpage::HtmlTagType;

/// A tag's (name, role) pair encoded as a single integer: the dictionary
/// sequence number in the low bits, the role in the bits above
/// [`TOKEN_TYPE_SHIFT`]. Text between tags is never tokenized, it is
/// addressed through byte offset ranges on the owning page.
pub type Token = u32;

/// Bit position of the tag role inside a [`Token`].
pub const TOKEN_TYPE_SHIFT: u32 = 24;

/// Token assigned to a (name, role) pair that was never seen while training.
///
/// A frozen dictionary hands this out for unknown tags on pages scraped after
/// training. It compares unequal to every real token, so unknown tags simply
/// break fingerprint runs instead of producing accidental matches.
pub const UNKNOWN_TOKEN: Token = u32::MAX;

/// Extract the role bits of a token.
pub fn token_type(token: Token) -> Option<HtmlTagType> {
    match token >> TOKEN_TYPE_SHIFT {
        1 => Some(HtmlTagType::Open),
        2 => Some(HtmlTagType::Close),
        3 => Some(HtmlTagType::Unpaired),
        _ => None,
    }
}

/// Extract the dictionary sequence number of a token.
pub fn token_seq(token: Token) -> u32 {
    token & ((1 << TOKEN_TYPE_SHIFT) - 1)
}

/// Session scoped mapping from (tag name, role) to dense integer tokens.
///
/// The dictionary is the one piece of shared state between a template and
/// every page compared against it: alignment is only meaningful when both
/// sides were tokenized through the same instance. It is threaded through
/// parsing as an explicit argument, grown while templates are parsed and
/// frozen afterwards, see [`crate::InstanceBasedLearningExtractor`].
#[derive(Debug, Clone, Default)]
pub struct TokenDict {
    /// Per name sequence numbers, one slot per role.
    entries: FnvHashMap<String, [Option<u32>; 3]>,
    next_seq: u32,
}

impl TokenDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct (name, role) pairs seen so far.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .map(|slots| slots.iter().flatten().count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the token for the given (name, role), allocating the next free
    /// sequence number on first sight.
    pub fn tokenize(&mut self, tag: &str, tag_type: HtmlTagType) -> Token {
        let slot = tag_type.index();
        if let Some(seq) = self.entries.get(tag).and_then(|slots| slots[slot]) {
            return seq | ((tag_type as u32) << TOKEN_TYPE_SHIFT);
        }
        let seq = self.next_seq;
        debug_assert!(seq < (1 << TOKEN_TYPE_SHIFT));
        self.next_seq += 1;
        self.entries.entry(tag.to_string()).or_insert([None; 3])[slot] = Some(seq);
        seq | ((tag_type as u32) << TOKEN_TYPE_SHIFT)
    }

    /// Non allocating lookup of an already interned (name, role) pair.
    pub fn find_token(&self, tag: &str, tag_type: HtmlTagType) -> Option<Token> {
        self.entries
            .get(tag)
            .and_then(|slots| slots[tag_type.index()])
            .map(|seq| seq | ((tag_type as u32) << TOKEN_TYPE_SHIFT))
    }

    /// Lookup against a frozen dictionary: unseen pairs map to
    /// [`UNKNOWN_TOKEN`] instead of growing the dictionary.
    pub fn token_or_unknown(&self, tag: &str, tag_type: HtmlTagType) -> Token {
        self.find_token(tag, tag_type).unwrap_or(UNKNOWN_TOKEN)
    }

    /// Reverse lookup of a token's tag name. O(n), diagnostics only, never on
    /// the matching hot path.
    pub fn token_string(&self, token: Token) -> Option<&str> {
        let tag_type = token_type(token)?;
        let seq = token_seq(token);
        self.entries
            .iter()
            .find(|(_, slots)| slots[tag_type.index()] == Some(seq))
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_entry_same_token() {
        let mut dict = TokenDict::new();
        let a = dict.tokenize("div", HtmlTagType::Open);
        let b = dict.tokenize("div", HtmlTagType::Open);
        assert_eq!(a, b);
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn roles_are_distinct() {
        let mut dict = TokenDict::new();
        let open = dict.tokenize("div", HtmlTagType::Open);
        let close = dict.tokenize("div", HtmlTagType::Close);
        assert_ne!(open, close);
        assert_eq!(token_type(open), Some(HtmlTagType::Open));
        assert_eq!(token_type(close), Some(HtmlTagType::Close));
    }

    #[test]
    fn reverse_lookup() {
        let mut dict = TokenDict::new();
        dict.tokenize("html", HtmlTagType::Open);
        let token = dict.tokenize("body", HtmlTagType::Open);
        assert_eq!(dict.token_string(token), Some("body"));
        assert_eq!(dict.find_token("body", HtmlTagType::Open), Some(token));
        assert_eq!(dict.find_token("body", HtmlTagType::Close), None);
    }

    #[test]
    fn frozen_lookup_yields_unknown() {
        let mut dict = TokenDict::new();
        dict.tokenize("div", HtmlTagType::Open);
        assert_eq!(dict.token_or_unknown("span", HtmlTagType::Open), UNKNOWN_TOKEN);
        assert_ne!(dict.token_or_unknown("div", HtmlTagType::Open), UNKNOWN_TOKEN);
    }
}
