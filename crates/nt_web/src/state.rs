use nt_pipeline::SentimentPipeline;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SentimentPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<SentimentPipeline>) -> Self {
        Self { pipeline }
    }
}
