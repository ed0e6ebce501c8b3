use burn::{
    tensor::backend::{AutodiffBackend, Backend},
    train::{TrainOutput, TrainStep, ValidStep},
};

use crate::pipelines::{batcher::Infer, output::Output};

use super::Model;

/// Define training step
impl<B: AutodiffBackend> TrainStep<Infer<B>, Output<B>> for Model<B>
where
    i64: From<<B as Backend>::IntElem>,
{
    fn step(&self, item: Infer<B>) -> TrainOutput<Output<B>> {
        let output = self.forward(item);
        let grads = output.loss.backward();

        TrainOutput::new(self, grads, output)
    }
}

/// Define validation step
impl<B: Backend> ValidStep<Infer<B>, Output<B>> for Model<B>
where
    i64: From<<B as Backend>::IntElem>,
{
    fn step(&self, item: Infer<B>) -> Output<B> {
        self.forward(item)
    }
}
