use super::{PredictionRequest, Predictor};
use crate::context::ScanContext;
use crate::modules::Module;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

// region:        --- Module info

/// Runs an inference script, one process per request.
///
/// The request goes to stdin as JSON, the script answers on stdout with
/// `{"predictions": [...]}` or `{"error": "..."}`.
pub struct ScriptPredictor {
    python: String,
    script: PathBuf,
}

impl ScriptPredictor {
    pub fn new(python: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            script: script.into(),
        }
    }
}

impl Module for ScriptPredictor {
    fn name(&self) -> String {
        "predictor/script".to_string()
    }

    fn description(&self) -> String {
        format!("{} {}", self.python, self.script.display())
    }
}

// endregion:     --- Module info

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PredictionResponse {
    predictions: Vec<String>,
    error: String,
}

pub fn parse_response(stdout: &[u8]) -> Result<Vec<String>> {
    let response: PredictionResponse = serde_json::from_slice(stdout)
        .map_err(|err| Error::Predictor(format!("unreadable response: {err}")))?;
    if !response.error.is_empty() {
        return Err(Error::Predictor(response.error));
    }
    Ok(response.predictions)
}

#[async_trait]
impl Predictor for ScriptPredictor {
    async fn ensure_available(&self) -> Result<()> {
        if which::which(&self.python).is_err() {
            return Err(Error::ToolNotFound(self.python.clone()));
        }
        if !self.script.is_file() {
            return Err(Error::ToolNotFound(self.script.display().to_string()));
        }
        Ok(())
    }

    #[instrument(name = "predict", level = "debug", skip_all)]
    async fn predict(&self, ctx: &ScanContext, request: &PredictionRequest) -> Result<Vec<String>> {
        let payload = serde_json::to_vec(request)?;
        debug!("{:12} - {} seeds, {} blocked", "PREDICT", request.subdomains.len(), request.blocked.len());

        let mut child = Command::new(&self.python)
            .arg(&self.script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| Error::ToolNotFound(format!("{} ({err})", self.python)))?;

        // stdin is closed before waiting so the script sees EOF
        let exchange = async move {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(&payload).await?;
            }
            child.wait_with_output().await
        };

        let output = tokio::select! {
            output = exchange => output?,
            _ = ctx.done() => return Err(Error::Cancelled),
        };
        if !output.status.success() {
            return Err(Error::Predictor(format!(
                "{} exited with {}: {}",
                self.python,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_response(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn responses_are_decoded() {
        assert_eq!(
            parse_response(br#"{"predictions": ["dev.example.com"]}"#).unwrap(),
            vec!["dev.example.com"]
        );
        assert!(matches!(parse_response(br#"{"error": "no model"}"#), Err(Error::Predictor(msg)) if msg == "no model"));
        assert!(parse_response(b"Traceback").is_err());
    }

    #[tokio::test]
    async fn deadline_covers_a_script_that_ignores_stdin() {
        // `sleep 30` never reads its stdin, the payload outgrows the pipe buffer
        let predictor = ScriptPredictor::new("sleep", "30");
        let request = PredictionRequest {
            subdomains: vec!["www".into()],
            apex: "example.com".into(),
            num_predictions: 10,
            max_tokens: 16,
            temperature: 0.0,
            blocked: (0..20_000).map(|i| format!("blocked-{i}.example.com")).collect(),
            device: "cpu".into(),
        };
        let ctx = ScanContext::new(Duration::from_millis(200));

        let res = tokio::time::timeout(Duration::from_secs(5), predictor.predict(&ctx, &request)).await;
        assert!(matches!(res, Ok(Err(Error::Cancelled))));
    }

    #[tokio::test]
    async fn missing_script_is_reported() {
        let predictor = ScriptPredictor::new("python3", "/nonexistent/llm_inference.py");
        assert!(predictor.ensure_available().await.is_err());
    }
}
