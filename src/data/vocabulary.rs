// ============================================================
// Layer 4 — Vocabulary
// ============================================================
// Maps WikiText tokens to integer ids with a HuggingFace
// WordLevel tokenizer.
//
// Id assignment (built from the TRAINING split only):
//   <unk> = 0, <pad> = 1,
//   then every other token by descending frequency,
//   ties broken alphabetically so rebuilding is deterministic.
//
// Every line is terminated with <eos>, so <eos> is counted once
// per line and competes for its id like any other token.
// Tokens that only appear in valid/test map to <unk>.
//
// The tokenizer JSON is written by hand and parsed back, the
// same way a saved tokenizer.json is loaded later on.

use anyhow::{Context, Result};
use std::{collections::HashMap, path::Path};
use tokenizers::Tokenizer;

pub const UNK_TOKEN: &str = "<unk>";
pub const PAD_TOKEN: &str = "<pad>";
pub const EOS_TOKEN: &str = "<eos>";

/// Fixed vocabulary shared by all three splits.
pub struct Vocabulary {
    tokenizer: Tokenizer,
    pad_id:    u32,
    eos_id:    u32,
}

impl Vocabulary {
    /// Count tokens in `lines` and build the vocabulary.
    pub fn build(lines: &[String]) -> Result<Self> {
        let mut freq: HashMap<&str, usize> = HashMap::new();
        for line in lines {
            for word in line.split_whitespace() {
                *freq.entry(word).or_insert(0) += 1;
            }
        }
        *freq.entry(EOS_TOKEN).or_insert(0) += lines.len();

        let mut words: Vec<(&str, usize)> = freq
            .into_iter()
            .filter(|(w, _)| *w != UNK_TOKEN && *w != PAD_TOKEN)
            .collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut vocab = serde_json::Map::new();
        vocab.insert(UNK_TOKEN.to_string(), 0.into());
        vocab.insert(PAD_TOKEN.to_string(), 1.into());
        for (next_id, (word, _)) in (2usize..).zip(&words) {
            vocab.insert((*word).to_string(), next_id.into());
        }

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": 0, "content": UNK_TOKEN, "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 1, "content": PAD_TOKEN, "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": null,
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let tokenizer: Tokenizer = tokenizer_json
            .to_string()
            .parse()
            .map_err(|e| anyhow::anyhow!("Cannot build WordLevel tokenizer: {e}"))?;

        let vocabulary = Self::from_tokenizer(tokenizer)?;
        tracing::info!("Vocabulary built: {} tokens", vocabulary.len());
        Ok(vocabulary)
    }

    /// Load a vocabulary previously written with [`Vocabulary::save`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            anyhow::anyhow!("Cannot load vocabulary from '{}': {}", path.display(), e)
        })?;
        Self::from_tokenizer(tokenizer)
    }

    fn from_tokenizer(tokenizer: Tokenizer) -> Result<Self> {
        let pad_id = tokenizer
            .token_to_id(PAD_TOKEN)
            .with_context(|| format!("Vocabulary has no {PAD_TOKEN} token"))?;
        let eos_id = tokenizer
            .token_to_id(EOS_TOKEN)
            .with_context(|| format!("Vocabulary has no {EOS_TOKEN} token"))?;
        Ok(Self { tokenizer, pad_id, eos_id })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.tokenizer
            .save(path, true)
            .map_err(|e| anyhow::anyhow!("Cannot write vocabulary to '{}': {}", path.display(), e))
    }

    /// Number of distinct ids (`ntoken`).
    pub fn len(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    #[cfg(test)]
    pub fn eos_id(&self) -> u32 {
        self.eos_id
    }

    #[cfg(test)]
    pub fn id_of(&self, token: &str) -> Option<u32> {
        self.tokenizer.token_to_id(token)
    }

    /// Encode `lines` into one flat id stream, <eos> after each line.
    pub fn encode_lines(&self, lines: &[String]) -> Result<Vec<u32>> {
        let inputs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;

        let total: usize = encodings.iter().map(|e| e.get_ids().len() + 1).sum();
        let mut ids = Vec::with_capacity(total);
        for encoding in &encodings {
            ids.extend_from_slice(encoding.get_ids());
            ids.push(self.eos_id);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ids_follow_frequency_then_alphabet() {
        let vocab = Vocabulary::build(&lines(&["b a b", "c a b"])).unwrap();
        assert_eq!(vocab.id_of(UNK_TOKEN), Some(0));
        assert_eq!(vocab.id_of(PAD_TOKEN), Some(1));
        // b=3, a=2, <eos>=2, c=1 → "<eos>" sorts before "a"
        assert_eq!(vocab.id_of("b"), Some(2));
        assert_eq!(vocab.id_of(EOS_TOKEN), Some(3));
        assert_eq!(vocab.id_of("a"), Some(4));
        assert_eq!(vocab.id_of("c"), Some(5));
        assert_eq!(vocab.len(), 6);
    }

    #[test]
    fn test_encode_appends_eos_and_maps_unknown() {
        let vocab = Vocabulary::build(&lines(&["the cat", "the dog"])).unwrap();
        let ids   = vocab.encode_lines(&lines(&["the bird", ""])).unwrap();
        let the   = vocab.id_of("the").unwrap();
        let eos   = vocab.eos_id();
        assert_eq!(ids, vec![the, 0, eos, eos]);
    }

    #[test]
    fn test_literal_unk_in_text_maps_to_unk_id() {
        let vocab = Vocabulary::build(&lines(&["a <unk> b"])).unwrap();
        let ids   = vocab.encode_lines(&lines(&["<unk>"])).unwrap();
        assert_eq!(ids, vec![0, vocab.eos_id()]);
    }

    #[test]
    fn test_saved_vocabulary_reloads_with_same_ids() {
        let dir   = tempfile::tempdir().unwrap();
        let path  = dir.path().join("tokenizer.json");
        let vocab = Vocabulary::build(&lines(&["x y z y"])).unwrap();
        vocab.save(&path).unwrap();

        let reloaded = Vocabulary::from_file(&path).unwrap();
        assert_eq!(reloaded.len(), vocab.len());
        assert_eq!(reloaded.id_of("y"), vocab.id_of("y"));
        assert_eq!(reloaded.eos_id(), vocab.eos_id());
    }
}
