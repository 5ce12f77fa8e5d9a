use anyhow::{ensure, Result};
use burn::{
    module::Param,
    nn::{
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Initializer,
        Lstm, LstmConfig, LstmState,
    },
    prelude::*,
    tensor::module::embedding,
};

use crate::ml::state::RecurrentState;

#[cfg(test)]
use burn::module::{ModuleVisitor, ParamId};

/// Half-width of the uniform range for embedding and decoder weights.
const INIT_RANGE: f64 = 0.1;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct LanguageModelConfig {
    pub vocab_size: usize,
    #[config(default = 64)]
    pub embedding_dim: usize,
    #[config(default = 64)]
    pub hidden_dim: usize,
    #[config(default = 1)]
    pub num_layers: usize,
    #[config(default = 0.2)]
    pub dropout: f64,
    /// Share one matrix between the embedding and the decoder
    /// (Press & Wolf 2016, Inan et al. 2016).
    #[config(default = false)]
    pub tie_weights: bool,
}

impl LanguageModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<LanguageModel<B>> {
        ensure!(self.vocab_size > 0, "vocab_size must be positive");
        ensure!(self.num_layers > 0, "num_layers must be at least 1");
        ensure!(
            (0.0..1.0).contains(&self.dropout),
            "dropout must be in [0, 1), got {}", self.dropout
        );
        ensure!(
            !self.tie_weights || self.hidden_dim == self.embedding_dim,
            "When using the tied flag, hidden_dim ({}) must be equal to embedding_dim ({})",
            self.hidden_dim, self.embedding_dim,
        );

        let (encoder, decoder, decoder_bias) = self.init_weights(device);

        // U(-1/sqrt(h), 1/sqrt(h)), the usual LSTM default.
        let k = 1.0 / (self.hidden_dim as f64).sqrt();
        let rnn = (0..self.num_layers)
            .map(|layer| {
                let d_input = if layer == 0 { self.embedding_dim } else { self.hidden_dim };
                LstmConfig::new(d_input, self.hidden_dim, true)
                    .with_initializer(Initializer::Uniform { min: -k, max: k })
                    .init(device)
            })
            .collect();

        Ok(LanguageModel {
            encoder,
            decoder,
            decoder_bias,
            rnn,
            dropout:    DropoutConfig::new(self.dropout).init(),
            vocab_size: self.vocab_size,
            hidden_dim: self.hidden_dim,
        })
    }

    /// Embedding and decoder weights ~ U(-0.1, 0.1), decoder bias = 0.
    /// With tying there is no separate decoder matrix at all.
    #[allow(clippy::type_complexity)]
    fn init_weights<B: Backend>(
        &self,
        device: &B::Device,
    ) -> (Param<Tensor<B, 2>>, Option<Param<Tensor<B, 2>>>, Param<Tensor<B, 1>>) {
        let uniform = Initializer::Uniform { min: -INIT_RANGE, max: INIT_RANGE };
        let encoder = uniform.init([self.vocab_size, self.embedding_dim], device);
        let decoder = (!self.tie_weights)
            .then(|| uniform.init([self.vocab_size, self.hidden_dim], device));
        let decoder_bias = Initializer::Zeros.init([self.vocab_size], device);
        (encoder, decoder, decoder_bias)
    }
}

/// Whether stochastic regularisation is active.
///
/// A model on an autodiff backend trains; `valid()` hands back the
/// same weights on the inner backend, where dropout is a no-op and
/// no gradient can be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Embedding → stacked LSTM → linear decoder.
#[derive(Module, Debug)]
pub struct LanguageModel<B: Backend> {
    /// [vocab_size, embedding_dim]; also the decoder weight when tied
    encoder:      Param<Tensor<B, 2>>,
    /// [vocab_size, hidden_dim]; None when tied
    decoder:      Option<Param<Tensor<B, 2>>>,
    decoder_bias: Param<Tensor<B, 1>>,
    rnn:          Vec<Lstm<B>>,
    dropout:      Dropout,
    vocab_size:   usize,
    hidden_dim:   usize,
}

impl<B: Backend> LanguageModel<B> {
    /// input: [seq_len, batch] → scores: [seq_len, batch, vocab_size]
    pub fn forward(
        &self,
        input: Tensor<B, 2, Int>,
        state: RecurrentState<B>,
    ) -> Result<(Tensor<B, 3>, RecurrentState<B>)> {
        let [seq_len, batch_size] = input.dims();
        let num_layers = self.rnn.len();

        let (cell, hidden) = state.into_lstm()?;
        let expected = [num_layers, batch_size, self.hidden_dim];
        ensure!(
            cell.dims() == expected && hidden.dims() == expected,
            "Recurrent state has shape {:?}, expected {:?}", cell.dims(), expected
        );

        // Burn's LSTM is batch-first.
        let emb = embedding(self.embedding_weight(), input.swap_dims(0, 1));
        let mut x = self.dropout.forward(emb);

        let mut cells   = Vec::with_capacity(num_layers);
        let mut hiddens = Vec::with_capacity(num_layers);
        for (layer, lstm) in self.rnn.iter().enumerate() {
            let range = [layer..layer + 1, 0..batch_size, 0..self.hidden_dim];
            let c0 = cell.clone().slice(range.clone()).squeeze::<2>(0);
            let h0 = hidden.clone().slice(range).squeeze::<2>(0);

            let (output, next) = lstm.forward(x, Some(LstmState::new(c0, h0)));
            // Dropout between stacked layers, not after the last one.
            x = if layer + 1 < num_layers { self.dropout.forward(output) } else { output };
            cells.push(next.cell);
            hiddens.push(next.hidden);
        }

        let output = self.dropout.forward(x);
        let flat   = output.swap_dims(0, 1).reshape([seq_len * batch_size, self.hidden_dim]);
        let scores = self.decode(flat).reshape([seq_len, batch_size, self.vocab_size]);

        let state = RecurrentState::lstm(Tensor::stack(cells, 0), Tensor::stack(hiddens, 0));
        Ok((scores, state))
    }

    /// Forward pass plus mean next-token cross-entropy.
    pub fn forward_loss(
        &self,
        input:  Tensor<B, 2, Int>,
        target: Tensor<B, 2, Int>,
        state:  RecurrentState<B>,
    ) -> Result<(Tensor<B, 1>, RecurrentState<B>)> {
        let (scores, state) = self.forward(input, state)?;
        Ok((next_token_loss(scores, target), state))
    }

    /// [n, hidden] → [n, vocab_size]
    fn decode(&self, hidden: Tensor<B, 2>) -> Tensor<B, 2> {
        hidden.matmul(self.projection_weight().transpose())
            + self.decoder_bias.val().unsqueeze::<2>()
    }

    /// Zero state for `batch_size` columns.
    pub fn init_state(&self, batch_size: usize) -> RecurrentState<B> {
        RecurrentState::zeros_lstm(self.rnn.len(), batch_size, self.hidden_dim, &self.device())
    }

    pub fn mode(&self) -> Mode {
        if B::ad_enabled() { Mode::Train } else { Mode::Eval }
    }

    pub fn device(&self) -> B::Device {
        self.encoder.val().device()
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn num_layers(&self) -> usize {
        self.rnn.len()
    }

    pub fn is_tied(&self) -> bool {
        self.decoder.is_none()
    }

    /// Embedding-role view of the input table.
    pub fn embedding_weight(&self) -> Tensor<B, 2> {
        self.encoder.val()
    }

    /// Projection-role view; the embedding table itself when tied.
    pub fn projection_weight(&self) -> Tensor<B, 2> {
        self.projection_param().val()
    }

    #[cfg(test)]
    pub fn embedding_param_id(&self) -> ParamId {
        self.encoder.id
    }

    #[cfg(test)]
    pub fn projection_param_id(&self) -> ParamId {
        self.projection_param().id
    }

    #[cfg(test)]
    pub fn decoder_bias(&self) -> Tensor<B, 1> {
        self.decoder_bias.val()
    }

    fn projection_param(&self) -> &Param<Tensor<B, 2>> {
        self.decoder.as_ref().unwrap_or(&self.encoder)
    }

    /// Every float parameter value, in module visiting order.
    #[cfg(test)]
    pub fn parameter_snapshot(&self) -> Vec<f32> {
        let mut snapshot = ParamSnapshot::default();
        self.visit(&mut snapshot);
        snapshot.values
    }
}

/// Mean cross-entropy between [seq, batch, vocab] scores and [seq, batch] targets.
///
/// The scores go through log-softmax before the NLL, unlike the classic
/// word-language-model script that applies NLL straight to decoder output,
/// so `exp(loss)` is a true perplexity.
pub fn next_token_loss<B: Backend>(scores: Tensor<B, 3>, target: Tensor<B, 2, Int>) -> Tensor<B, 1> {
    let [seq_len, batch_size, vocab_size] = scores.dims();
    let ce = CrossEntropyLossConfig::new().init(&scores.device());
    ce.forward(
        scores.reshape([seq_len * batch_size, vocab_size]),
        target.reshape([seq_len * batch_size]),
    )
}

#[cfg(test)]
#[derive(Default)]
struct ParamSnapshot {
    values: Vec<f32>,
}

#[cfg(test)]
impl<B: Backend> ModuleVisitor<B> for ParamSnapshot {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.values.extend(tensor.to_data().iter::<f32>());
    }
}
