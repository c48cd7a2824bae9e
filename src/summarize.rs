use crate::config::LlmSettings;
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use serde_json::{json, Value};

const SYSTEM_PROMPT: &str =
    "あなたは優秀な要約アシスタントです。日本語で分かりやすく要約してください。";

const SUMMARY_PROMPT: &str = r#"以下のテキストを要約してください。以下の形式で出力してください：

1. 全体の要約（200字程度）
2. 主要なポイント（箇条書き）
3. 章ごとのまとめ
4. 作者の伝えたいこと
5. 特に学びがある部分
6. 重要事項

テキスト：
"#;

const TRUNCATION_NOTE: &str = "\n\n[テキストが長すぎるため、最初の部分のみを要約しています]";

/// Book summarizer backed by an OpenAI-compatible chat completions API
pub struct Summarizer {
    client: Client,
    settings: LlmSettings,
}

impl Summarizer {
    /// Build a summarizer if an API key is configured
    pub fn from_settings(settings: &LlmSettings) -> Option<Self> {
        settings.api_key.as_ref()?;
        Some(Self {
            client: Client::new(),
            settings: settings.clone(),
        })
    }

    /// Summarize extracted book text
    ///
    /// Input beyond the configured character budget is truncated with a
    /// note, matching what the model can usefully digest in one call.
    pub fn summarize(&self, text: &str) -> Result<String> {
        let budget = self.settings.max_input_chars;
        let prompt = if text.chars().count() > budget {
            let truncated: String = text.chars().take(budget).collect();
            format!("{}{}{}", SUMMARY_PROMPT, truncated, TRUNCATION_NOTE)
        } else {
            format!("{}{}", SUMMARY_PROMPT, text)
        };

        let endpoint = format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );

        let body = json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "max_tokens": 2000,
            "temperature": 0.7
        });

        let mut request = self.client.post(&endpoint).json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send()?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::LlmApiError(format!(
                "summarization API error {}: {}",
                status, error_text
            )));
        }

        let json: Value = response.json()?;

        json.get("choices")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("message"))
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::LlmApiError("Invalid completion response format".to_string()))
    }
}
