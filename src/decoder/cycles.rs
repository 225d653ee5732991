use std::collections::HashSet;

/// Offsets of the directories already processed during one walk, as indices of the outermost
/// source (see [`crate::RandomAccessReader::to_unshifted_offset`]).
///
/// The directory structure of a TIFF file should be a forest, but nothing stops a malformed or
/// malicious file from pointing a directory at itself or at one of its ancestors, either through
/// the next-directory link or through a pointer tag. Refusing to visit any offset twice makes
/// every walk terminate.
#[derive(Default, Debug, Clone)]
pub struct VisitedOffsets {
    offsets: HashSet<i64>,
}

impl VisitedOffsets {
    pub fn new() -> Self {
        VisitedOffsets::default()
    }

    /// Records a visit. Returns `false` if the offset was seen before.
    pub fn insert(&mut self, offset: i64) -> bool {
        self.offsets.insert(offset)
    }

    pub fn contains(&self, offset: i64) -> bool {
        self.offsets.contains(&offset)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[test]
fn reflective_visit_is_detected() {
    let mut visited = VisitedOffsets::new();

    assert!(visited.insert(0x20), "first visit is new");
    assert!(!visited.insert(0x20), "self-referential link must be refused");
}

#[test]
fn late_cycle() {
    let mut visited = VisitedOffsets::new();

    for offset in [0x20, 0x40, 0x60, 0x80] {
        assert!(visited.insert(offset));
    }

    // 0x80 pointing back at the start of the chain.
    assert!(visited.contains(0x20));
    assert!(!visited.insert(0x20));
    assert_eq!(visited.len(), 4);
}
