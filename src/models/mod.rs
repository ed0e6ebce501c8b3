/// BERT with task heads
pub mod bert;
