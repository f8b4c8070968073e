use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Identifier of an indexed item (a geographic object)
pub type ItemId = u32;

/// Sorted set of item ids
pub type ItemSet = RoaringBitmap;

/// Identifier of a native cell of a cell index
pub type CellId = u32;

/// Identifier of a named region of a cell index
pub type RegionId = u32;

/// Serialized size of an item set, the cost measure for compaction
#[inline]
pub fn byte_size(items: &ItemSet) -> usize {
    items.serialized_size()
}

/// Completion type bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct QueryType(pub u8);

impl QueryType {
    pub const NONE: QueryType = QueryType(0);
    pub const EXACT: QueryType = QueryType(1 << 0);
    pub const PREFIX: QueryType = QueryType(1 << 1);
    pub const SUFFIX: QueryType = QueryType(1 << 2);
    pub const SUBSTRING: QueryType = QueryType(1 << 3);

    pub fn contains(&self, other: QueryType) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether `key` matches `text` under any of the set completion types
    pub fn matches(&self, key: &str, text: &str) -> bool {
        (self.contains(Self::EXACT) && key == text)
            || (self.contains(Self::PREFIX) && key.starts_with(text))
            || (self.contains(Self::SUFFIX) && key.ends_with(text))
            || (self.contains(Self::SUBSTRING) && key.contains(text))
    }
}

impl BitOr for QueryType {
    type Output = QueryType;

    fn bitor(self, rhs: QueryType) -> QueryType {
        QueryType(self.0 | rhs.0)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::EXACT, "exact"),
            (Self::PREFIX, "prefix"),
            (Self::SUFFIX, "suffix"),
            (Self::SUBSTRING, "substring"),
        ];
        let set: Vec<_> = names
            .iter()
            .filter(|(qt, _)| self.contains(*qt))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", set.join("|"))
        }
    }
}

/// What a text lookup should match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueryKind {
    /// Items and regions
    Mixed,
    Items,
    Regions,
}

/// Normalize a query string and derive its completion type.
///
/// `"foo"` is exact, `foo*` prefix, `*foo` suffix and `*foo*` substring; an
/// unmarked string gets `default`. The returned text is trimmed and
/// lowercased.
pub fn normalize_query(text: &str, default: QueryType) -> (String, QueryType) {
    let trimmed = text.trim();

    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        let inner = &trimmed[1..trimmed.len() - 1];
        return (inner.trim().to_lowercase(), QueryType::EXACT);
    }

    let leading = trimmed.starts_with('*');
    let stripped = trimmed.trim_start_matches('*');
    let trailing = stripped.ends_with('*');
    let stripped = stripped.trim_end_matches('*');

    let qt = match (leading, trailing) {
        (true, true) => QueryType::SUBSTRING,
        (true, false) => QueryType::SUFFIX,
        (false, true) => QueryType::PREFIX,
        (false, false) => default,
    };

    (stripped.to_lowercase(), qt)
}
