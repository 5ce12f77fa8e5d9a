// ============================================================
// Layer 4 — WikiText Loader
// ============================================================
// Reads the three WikiText split files from a directory.
//
// WikiText-2 is already tokenised: tokens are separated by
// single spaces, rare words have been replaced with <unk>, and
// numbers are split with @,@ / @.@ markers. All we do here is
// read the lines; splitting on whitespace and appending <eos>
// happens when the vocabulary encodes them.
//
// Expected layout:
//   data/wikitext-2/
//     wiki.train.tokens
//     wiki.valid.tokens
//     wiki.test.tokens

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::domain::split::Split;
use crate::domain::traits::TokenSource;

/// Loads WikiText split files from a given directory.
/// Implements the TokenSource trait from Layer 3.
pub struct WikiTextLoader {
    dir: PathBuf,
}

impl WikiTextLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Full path of the file holding `split`.
    pub fn path_of(&self, split: Split) -> PathBuf {
        self.dir.join(split.file_name())
    }
}

impl TokenSource for WikiTextLoader {
    fn load_lines(&self, split: Split) -> Result<Vec<String>> {
        let path = self.path_of(split);
        let text = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read {} split from '{}'. Is --data-dir pointing at a WikiText directory?",
                split,
                path.display()
            )
        })?;

        let lines: Vec<String> = text.lines().map(str::to_owned).collect();
        tracing::debug!("Read {} lines from '{}'", lines.len(), path.display());
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("wiki.valid.tokens"), " = Title = \n\n the cat sat \n").unwrap();

        let loader = WikiTextLoader::new(dir.path());
        let lines  = loader.load_lines(Split::Valid).unwrap();
        assert_eq!(lines, vec![" = Title = ", "", " the cat sat "]);
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let dir    = tempfile::tempdir().unwrap();
        let loader = WikiTextLoader::new(dir.path());
        let err    = loader.load_lines(Split::Test).unwrap_err();
        assert!(format!("{err:#}").contains("wiki.test.tokens"));
    }
}
