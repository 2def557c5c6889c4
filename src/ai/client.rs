//! OpenAI API クライアント (Tony Brain)
//!
//! ペルソナ付きのチャット補完を 1 回ずつ呼び出すバックエンドと、
//! 候補モデル一覧を持ってフォールバック付きで質問する `TonyAI` を提供する。

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_openai::{
    config::{OPENAI_API_BASE, OPENAI_ORGANIZATION_HEADER},
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
        CreateChatCompletionResponse,
    },
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::{debug, info, warn};

use super::fallback::{complete_with_fallback, CompletionOutcome};
use super::prompts::SYSTEM_PROMPT;
use crate::config::OpenAiSettings;

/// 補完呼び出しのタイムアウト
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// 1 回の補完呼び出しのパラメータ
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub temperature: f32,
    /// `None` なら上限を付けない（ボット返信）
    pub max_tokens: Option<u32>,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

/// OpenAI API が 2xx 以外を返したときのエラー。本文は JSON でなくてもそのまま保持する。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("OpenAI API error {status}: {body}")]
pub struct OpenAiApiError {
    pub status: u16,
    pub body: String,
}

/// チャット補完 1 回分の呼び出し口。
///
/// 成功時は応答テキストを、失敗時はプロバイダのエラー文字列を含むエラーを返す。
#[allow(async_fn_in_trait)]
pub trait ChatBackend {
    async fn chat_once(
        &self,
        model: &str,
        system: &str,
        user: &str,
        params: &CompletionParams,
    ) -> Result<String>;
}

/// OpenAI の Chat Completions API を呼ぶバックエンド。
///
/// リクエスト／レスポンスの型は async-openai のものを使い、送受信は reqwest で行う。
/// エラー時はステータスコードと本文をそのまま保持し、自動リトライは行わない。
pub struct OpenAiBackend {
    http: reqwest::Client,
    api_base: String,
}

impl OpenAiBackend {
    /// 設定から OpenAI クライアントを作成する。API キーがなければ即座にエラー。
    pub fn new(settings: &OpenAiSettings) -> Result<Self> {
        let api_key = settings
            .effective_api_key()
            .context("OPENAI_API_KEY is not configured. Set it in the environment or in [openai] api_key")?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .context("invalid OpenAI authorization header")?,
        );
        if let Some(org) = settings.effective_organization() {
            debug!(organization = %org, "Attaching OpenAI organization header");
            headers.insert(
                OPENAI_ORGANIZATION_HEADER,
                HeaderValue::from_str(org).context("invalid OpenAI organization header")?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(COMPLETION_TIMEOUT)
            .build()
            .context("failed to create OpenAI client")?;
        let api_base = settings
            .api_base
            .as_deref()
            .unwrap_or(OPENAI_API_BASE)
            .trim_end_matches('/')
            .to_string();
        Ok(Self { http, api_base })
    }
}

impl ChatBackend for OpenAiBackend {
    async fn chat_once(
        &self,
        model: &str,
        system: &str,
        user: &str,
        params: &CompletionParams,
    ) -> Result<String> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(system.to_string()),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(user.to_string()),
                name: None,
            }),
        ];

        let request = CreateChatCompletionRequest {
            model: model.to_string(),
            messages,
            temperature: Some(params.temperature),
            max_completion_tokens: params.max_tokens,
            ..Default::default()
        };

        debug!(
            model,
            temperature = params.temperature,
            max_tokens = ?params.max_tokens,
            prompt_length = user.len(),
            "Sending API request to OpenAI"
        );

        let started = Instant::now();
        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .json(&request)
            .send()
            .await
            .with_context(|| format!("OpenAI request to {model} failed"))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read OpenAI response")?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            warn!(model, status = status.as_u16(), elapsed_ms, "OpenAI returned an error");
            return Err(OpenAiApiError {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let response: CreateChatCompletionResponse =
            serde_json::from_str(&body).context("failed to decode OpenAI response")?;
        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        debug!(
            model,
            status = status.as_u16(),
            elapsed_ms,
            response_length = text.len(),
            "OpenAI response received"
        );
        Ok(text.trim().to_string())
    }
}

/// Tony AI クライアント。バックエンドと候補モデル一覧をまとめて保持する。
pub struct TonyAI<B = OpenAiBackend> {
    backend: B,
    models: Vec<String>,
    params: CompletionParams,
}

impl TonyAI<OpenAiBackend> {
    /// 設定から初期化する。`max_tokens` を付けるかどうかは呼び出し側が決める。
    pub fn from_settings(settings: &OpenAiSettings, max_tokens: Option<u32>) -> Result<Self> {
        let backend = OpenAiBackend::new(settings)?;
        let models = settings.candidate_models();
        info!(models = ?models, "OpenAI client initialized");
        Ok(Self::with_backend(
            backend,
            models,
            CompletionParams {
                temperature: settings.temperature,
                max_tokens,
            },
        ))
    }
}

impl<B: ChatBackend> TonyAI<B> {
    pub fn with_backend(backend: B, models: Vec<String>, params: CompletionParams) -> Self {
        Self {
            backend,
            models,
            params,
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    /// Tony に質問する。空のプロンプトは境界で弾く。
    pub async fn ask(&self, prompt: &str) -> Result<CompletionOutcome> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            anyhow::bail!("prompt must not be empty");
        }
        Ok(complete_with_fallback(&self.backend, &self.models, SYSTEM_PROMPT, prompt, &self.params).await)
    }
}
