use crate::constants::UPSTREAM_REQUEST_TIMEOUT_SECS;
use serde_json::Value;
use std::time::Duration;

// One shared client for every upstream call. The generate timeout is applied
// per request: non-streaming calls get the full 60s ceiling on the exchange;
// streaming calls only bound the time to response headers, after which the
// stream translator's idle timeout takes over.
pub struct UpstreamClient {
    http: reqwest::Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateOp {
    Sync,
    Stream,
}

impl GenerateOp {
    fn endpoint(&self) -> &'static str {
        match self {
            GenerateOp::Sync => "generateContent",
            GenerateOp::Stream => "streamGenerateContent",
        }
    }
}

// `<base>/models/<model>:<op>?key=<key>[&alt=sse]`. The key rides in the
// query string, so this URL must never reach a log line.
pub fn build_generate_url(base_url: &str, model: &str, api_key: &str, op: GenerateOp) -> String {
    let base = base_url.trim_end_matches('/');
    let mut url = format!("{}/models/{}:{}?key={}", base, model, op.endpoint(), api_key);
    if op == GenerateOp::Stream {
        url.push_str("&alt=sse");
    }
    url
}

pub fn resolve_model<'a>(requested: Option<&'a str>, default_model: &'a str) -> &'a str {
    match requested {
        Some(model) if !model.trim().is_empty() => model,
        _ => default_model,
    }
}

impl UpstreamClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    pub async fn generate(
        &self,
        url: &str,
        body: &Value,
        op: GenerateOp,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let request = self.http.post(url).json(body);
        match op {
            GenerateOp::Sync => {
                request
                    .timeout(Duration::from_secs(UPSTREAM_REQUEST_TIMEOUT_SECS))
                    .send()
                    .await
            }
            GenerateOp::Stream => request.send().await,
        }
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}
