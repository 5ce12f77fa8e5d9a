// ============================================================
// Layer 4 — Corpus
// ============================================================
// The corpus provider seen by the training session: a fixed
// vocabulary size plus three independent BPTT streams.

use anyhow::{ensure, Result};
use burn::data::dataset::Dataset;

use crate::data::{dataset::BpttDataset, vocabulary::Vocabulary};
use crate::domain::{split::Split, traits::TokenSource, window::TokenWindow};

/// Anything that can feed the training session.
pub trait CorpusProvider {
    /// Number of distinct token ids the model must score.
    fn vocab_size(&self) -> usize;

    /// The ordered window stream of `split`.
    fn stream(&self, split: Split) -> &dyn Dataset<TokenWindow>;
}

/// WikiText-style corpus: vocabulary from train, three BPTT streams.
pub struct Corpus {
    vocabulary: Vocabulary,
    train:      BpttDataset,
    valid:      BpttDataset,
    test:       BpttDataset,
}

impl Corpus {
    /// Read all splits from `source`, build the vocabulary on the
    /// training lines and batchify every split.
    pub fn load(source: &impl TokenSource, batch_size: usize, bptt: usize) -> Result<Self> {
        let train_lines = source.load_lines(Split::Train)?;
        let vocabulary  = Vocabulary::build(&train_lines)?;

        let train = Self::batchify(&vocabulary, &train_lines, batch_size, bptt)?;
        let valid = Self::batchify(&vocabulary, &source.load_lines(Split::Valid)?, batch_size, bptt)?;
        let test  = Self::batchify(&vocabulary, &source.load_lines(Split::Test)?, batch_size, bptt)?;

        for (split, ds) in [(Split::Train, &train), (Split::Valid, &valid), (Split::Test, &test)] {
            ensure!(
                ds.len() > 0,
                "The {split} split is too short for batch size {batch_size}"
            );
            tracing::info!("{split}: {} batches of {}x{}", ds.len(), ds.bptt(), ds.batch_size());
        }

        Ok(Self { vocabulary, train, valid, test })
    }

    /// Encode `lines` with an existing vocabulary into a BPTT stream.
    pub fn batchify(
        vocabulary: &Vocabulary,
        lines:      &[String],
        batch_size: usize,
        bptt:       usize,
    ) -> Result<BpttDataset> {
        let ids = vocabulary.encode_lines(lines)?;
        Ok(BpttDataset::new(ids, vocabulary.pad_id(), batch_size, bptt))
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

impl CorpusProvider for Corpus {
    fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    fn stream(&self, split: Split) -> &dyn Dataset<TokenWindow> {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
            Split::Test  => &self.test,
        }
    }
}
