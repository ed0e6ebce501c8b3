use burn::{
    tensor::{backend::Backend, Tensor},
    train::metric::{Adaptor, LossInput},
};
use derive_new::new;

/// The output of heads whose only per-batch metric is the loss
#[derive(new)]
pub struct Output<B: Backend> {
    /// The loss.
    pub loss: Tensor<B, 1>,
}

impl<B: Backend> Adaptor<LossInput<B>> for Output<B> {
    fn adapt(&self) -> LossInput<B> {
        LossInput::new(self.loss.clone())
    }
}
