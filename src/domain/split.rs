// ============================================================
// Layer 3 — Corpus Split
// ============================================================
// WikiText ships as three files, one per split. The vocabulary
// is always built from the training split; the other two are
// only ever encoded against it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three independent streams of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    /// All splits in the order they are loaded.
    #[cfg(test)]
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    /// File name of this split inside a WikiText directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Split::Train => "wiki.train.tokens",
            Split::Valid => "wiki.valid.tokens",
            Split::Test  => "wiki.test.tokens",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test  => "test",
        };
        f.write_str(name)
    }
}
