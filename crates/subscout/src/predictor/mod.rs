mod growth;
pub mod script;
pub mod validator;

pub use growth::{ModelLoop, ModelOutcome};
pub use script::ScriptPredictor;

use crate::context::ScanContext;
use crate::modules::Module;
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Input of one prediction round. Names are labels relative to `apex`.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRequest {
    pub subdomains: Vec<String>,
    pub apex: String,
    pub num_predictions: usize,
    pub max_tokens: usize,
    pub temperature: f32,
    pub blocked: Vec<String>,
    pub device: String,
}

/// Proposes full hostnames under the apex from the known ones.
#[async_trait]
pub trait Predictor: Module + Send + Sync {
    async fn ensure_available(&self) -> Result<()>;

    /// Up to `request.num_predictions` candidates.
    async fn predict(&self, ctx: &ScanContext, request: &PredictionRequest) -> Result<Vec<String>>;
}
