// ============================================================
// Layer 5 — Global Gradient-Norm Clipping
// ============================================================
// Burn's optimiser-level GradientClipping works tensor by
// tensor. Recurrent nets want the global version instead: one
// L2 norm over every gradient of the model, and one shared
// scale factor so relative directions are preserved.
//
//   total = sqrt(Σ ||g_i||²)
//   if total > max_norm:  g_i ← g_i · max_norm / (total + 1e-6)

use std::marker::PhantomData;

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

const EPS: f64 = 1e-6;

/// Global L2 norm of all gradients belonging to `module`.
pub fn grad_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm::<B> { grads, sum_sq: 0.0, _backend: PhantomData };
    module.visit(&mut visitor);
    visitor.sum_sq.sqrt()
}

/// Rescale `grads` in place so their global norm is at most `max_norm`.
/// Returns the norm measured before clipping.
pub fn clip_grad_norm<B, M>(module: &M, grads: &mut GradientsParams, max_norm: f64) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let total = grad_norm::<B, M>(module, grads);
    let scale = max_norm / (total + EPS);
    if scale < 1.0 {
        let mut visitor = Rescale::<B> { grads, scale, _backend: PhantomData };
        module.visit(&mut visitor);
    }
    total
}

struct SquaredNorm<'a, B: AutodiffBackend> {
    grads:    &'a GradientsParams,
    sum_sq:   f64,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.sum_sq += grad.powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        }
    }
}

struct Rescale<'a, B: AutodiffBackend> {
    grads:    &'a mut GradientsParams,
    scale:    f64,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Rescale<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register::<B::InnerBackend, D>(id, grad.mul_scalar(self.scale));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::LanguageModelConfig;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    /// Gradients of a deliberately inflated loss, so clipping has work to do.
    fn large_grads() -> (crate::ml::model::LanguageModel<TestBackend>, GradientsParams) {
        let device = Default::default();
        let model  = LanguageModelConfig::new(10)
            .with_embedding_dim(4)
            .with_hidden_dim(4)
            .with_dropout(0.0)
            .init::<TestBackend>(&device)
            .unwrap();
        let input  = Tensor::<TestBackend, 1, Int>::from_ints([1, 2, 3, 4, 5, 6].as_slice(), &device).reshape([3, 2]);
        let target = Tensor::<TestBackend, 1, Int>::from_ints([3, 4, 5, 6, 7, 8].as_slice(), &device).reshape([3, 2]);

        let (loss, _) = model.forward_loss(input, target, model.init_state(2)).unwrap();
        let grads = GradientsParams::from_grads(loss.mul_scalar(1000.0).backward(), &model);
        (model, grads)
    }

    #[test]
    fn test_clipped_norm_is_within_ceiling() {
        let (model, mut grads) = large_grads();
        let before = clip_grad_norm::<TestBackend, _>(&model, &mut grads, 0.25);
        assert!(before > 0.25);

        let after = grad_norm::<TestBackend, _>(&model, &grads);
        assert!(after <= 0.25 + 1e-6, "norm after clipping: {after}");
    }

    #[test]
    fn test_clipping_preserves_direction() {
        let (model, mut grads) = large_grads();
        let id = model.embedding_param_id();
        let original: Vec<f32> = grads
            .get::<NdArray, 2>(id)
            .unwrap()
            .into_data()
            .iter::<f32>()
            .collect();

        let before  = clip_grad_norm::<TestBackend, _>(&model, &mut grads, 0.25);
        let scale   = (0.25 / (before + EPS)) as f32;
        let clipped: Vec<f32> = grads
            .get::<NdArray, 2>(id)
            .unwrap()
            .into_data()
            .iter::<f32>()
            .collect();

        for (o, c) in original.iter().zip(&clipped) {
            assert!((o * scale - c).abs() <= 1e-6 + 1e-4 * o.abs(), "{o} * {scale} != {c}");
        }
    }

    #[test]
    fn test_small_gradients_are_left_alone() {
        let (model, mut grads) = large_grads();
        let before = grad_norm::<TestBackend, _>(&model, &grads);
        let ceiling = before * 10.0;
        clip_grad_norm::<TestBackend, _>(&model, &mut grads, ceiling);
        let after = grad_norm::<TestBackend, _>(&model, &grads);
        assert!((before - after).abs() <= 1e-9 * before.max(1.0));
    }
}
