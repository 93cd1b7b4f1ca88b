//! Hierarchical keys
//!
//! An HKey is the ancestry path of a row inside its group: one segment per
//! level, root first. Segment `i` belongs to the table at depth `i`.
//!
//! Lexicographic comparison of HKeys is a depth-first, parent-before-child
//! traversal of the group: a parent's HKey is a strict prefix of each of its
//! descendants' HKeys and therefore sorts before them.

use std::fmt;

use super::value::Value;

/// One level of an HKey: the table ordinal within the group plus the
/// primary key values of the row at that level.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HKeySegment {
    ordinal: u32,
    keys: Vec<Value>,
}

impl HKeySegment {
    /// Create a segment
    pub fn new(ordinal: u32, keys: Vec<Value>) -> Self {
        Self { ordinal, keys }
    }

    /// Table ordinal within the group
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Key values contributed at this level
    pub fn keys(&self) -> &[Value] {
        &self.keys
    }
}

/// Immutable ancestry path of a row within its group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HKey {
    segments: Vec<HKeySegment>,
}

impl HKey {
    /// HKey of a root-table row
    pub fn root(ordinal: u32, keys: Vec<Value>) -> Self {
        Self {
            segments: vec![HKeySegment::new(ordinal, keys)],
        }
    }

    /// Build an HKey from its segments, root first
    pub fn from_segments(segments: Vec<HKeySegment>) -> Self {
        Self { segments }
    }

    /// HKey of a child row below this one
    pub fn child(&self, ordinal: u32, keys: Vec<Value>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(HKeySegment::new(ordinal, keys));
        Self { segments }
    }

    /// Segments, root first
    pub fn segments(&self) -> &[HKeySegment] {
        &self.segments
    }

    /// Number of segments
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Depth of the row this key identifies (root = 0)
    pub fn depth(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    /// Ordinal of the table this key identifies
    pub fn ordinal(&self) -> Option<u32> {
        self.segments.last().map(HKeySegment::ordinal)
    }

    /// The ancestor key at `depth`, if this key is at least that deep
    pub fn ancestor(&self, depth: usize) -> Option<HKey> {
        if depth >= self.segments.len() {
            return None;
        }
        Some(Self {
            segments: self.segments[..=depth].to_vec(),
        })
    }

    /// The parent key, `None` for a root row
    pub fn parent(&self) -> Option<HKey> {
        if self.segments.len() < 2 {
            return None;
        }
        self.ancestor(self.segments.len() - 2)
    }

    /// True if `self` is `other` or one of its ancestors
    pub fn is_prefix_of(&self, other: &HKey) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

impl fmt::Display for HKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "({}", segment.ordinal)?;
            for key in &segment.keys {
                write!(f, ",{}", key)?;
            }
            write!(f, ")")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Vec<Value> {
        vec![Value::Int(v)]
    }

    #[test]
    fn test_parent_sorts_before_children() {
        let customer = HKey::root(0, int(1));
        let order = customer.child(1, int(10));
        let item = order.child(2, int(100));
        let next_customer = HKey::root(0, int(2));

        let mut keys = vec![
            next_customer.clone(),
            item.clone(),
            customer.clone(),
            order.clone(),
        ];
        keys.sort();
        assert_eq!(keys, vec![customer, order, item, next_customer]);
    }

    #[test]
    fn test_sibling_tables_do_not_interleave() {
        let customer = HKey::root(0, int(1));
        let order_a = customer.child(1, int(50));
        let item = order_a.child(2, int(1));
        let address = customer.child(3, int(1));

        assert!(order_a < item);
        assert!(item < address);
    }

    #[test]
    fn test_ancestor_and_prefix() {
        let item = HKey::root(0, int(1)).child(1, int(10)).child(2, int(100));
        assert_eq!(item.depth(), 2);
        let order = item.parent().unwrap();
        assert_eq!(order.depth(), 1);
        assert!(order.is_prefix_of(&item));
        assert!(!item.is_prefix_of(&order));
        assert_eq!(item.ancestor(0), Some(HKey::root(0, int(1))));
        assert_eq!(item.ancestor(3), None);
    }

    #[test]
    fn test_display() {
        let key = HKey::root(0, int(1)).child(1, vec![Value::text("x")]);
        assert_eq!(key.to_string(), "{(0,1),(1,'x')}");
    }
}
