pub mod ledger;
pub mod pipeline;

pub use ledger::UsageLedger;
pub use pipeline::{PipelineConfig, SentimentPipeline};

pub mod prelude {
    pub use super::{PipelineConfig, SentimentPipeline, UsageLedger};
    pub use nt_core::{AnalysisOutcome, AnalysisReport, AnalyzeRequest, QuotaStatus};
    pub use tokio_util::sync::CancellationToken;
}
