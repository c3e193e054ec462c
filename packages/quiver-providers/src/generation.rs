use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};
use quiver_config::GenerationProviderConfig;

/// Single completion round-trip against an OpenAI-compatible chat endpoint.
/// Timeouts and non-2xx statuses surface as typed errors so callers can
/// degrade instead of propagating raw transport failures.
pub async fn generate(cfg: &GenerationProviderConfig, prompt: &str) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"max_tokens": cfg.max_tokens,
		"messages": [
			{ "role": "user", "content": prompt }
		],
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await
		.map_err(|err| {
			if err.is_timeout() {
				Error::Timeout { timeout_ms: cfg.timeout_ms }
			} else {
				Error::Reqwest(err)
			}
		})?;
	let status = res.status();

	if !status.is_success() {
		return Err(Error::Backend { status: status.as_u16() });
	}

	let json: Value = res.json().await?;

	parse_generation_response(json)
}

fn parse_generation_response(json: Value) -> Result<String> {
	if let Some(content) = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
	{
		return Ok(content.to_string());
	}

	// Legacy completion shape.
	if let Some(text) = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("text"))
		.and_then(|t| t.as_str())
	{
		return Ok(text.to_string());
	}

	Err(Error::InvalidResponse {
		message: "Generation response is missing text content.".to_string(),
	})
}
