use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use shared::{
    domain::{Level, LevelId, Score, ScoreId, Step, StepId},
    error::ApiError,
    protocol::{
        CreateLevelRequest, CreateScoreRequest, CreateStepRequest, LinkScoreRequest,
        ReorderLevelsRequest, ReorderStepsRequest, UpdateLevelRequest, UpdateStepRequest,
    },
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};
use url::Url;

pub mod auth;
pub mod ordering;

pub use auth::{AccessTokenProvider, StaticTokenProvider};
pub use ordering::{OrderSink, OrderSinkError, Ordered, OrderedCollection, Reorderer};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Transient, user-facing notifications. Subscribers render these as toasts;
/// a lagging or absent subscriber never blocks the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    OrderPersisted {
        collection: String,
    },
    OrderRolledBack {
        collection: String,
        reason: String,
    },
    ScoreUploaded {
        step_id: StepId,
        score_id: ScoreId,
    },
    ScoreDownloaded {
        score_id: ScoreId,
    },
    Error(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid api base url '{0}'")]
    BaseUrl(String),
    #[error("failed to obtain access token: {0}")]
    Token(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server rejected request with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("failed to read score file '{path}': {source}")]
    ScoreFileRead {
        path: String,
        source: std::io::Error,
    },
}

/// Suggested filename for a downloaded score, derived from the step name the
/// way the admin console names downloads: spaces become underscores.
pub fn score_filename(step_name: &str) -> String {
    let base = step_name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{base}.musicxml")
}

/// Authenticated client for the curriculum admin API.
///
/// Owns the HTTP transport, the bearer-token seam, and the notification
/// stream. Reorder state lives in per-collection [`Reorderer`]s created by
/// [`AdminClient::level_reorderer`] and [`AdminClient::step_reorderer`].
pub struct AdminClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn AccessTokenProvider>,
    events: broadcast::Sender<ClientEvent>,
}

impl AdminClient {
    pub fn new(
        base_url: impl AsRef<str>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, ClientError> {
        let raw = base_url.as_ref();
        let parsed =
            Url::parse(raw).map_err(|_| ClientError::BaseUrl(raw.to_string()))?;
        if !parsed.scheme().starts_with("http") {
            return Err(ClientError::BaseUrl(raw.to_string()));
        }
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            http: Client::new(),
            base_url: raw.trim_end_matches('/').to_string(),
            tokens,
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|err| ClientError::Token(err.to_string()))?;
        Ok(self
            .http
            .request(method, format!("{}/{}", self.base_url, path))
            .bearer_auth(token))
    }

    async fn error_from(response: Response) -> ClientError {
        let status = response.status();
        let message = match response.json::<ApiError>().await {
            Ok(envelope) => envelope.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        };
        ClientError::Api {
            status: status.as_u16(),
            message,
        }
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from(response).await)
        }
    }

    pub async fn list_levels(&self) -> Result<Vec<Level>, ClientError> {
        let response = self.request(Method::GET, "levels").await?.send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn get_level(&self, level_id: &LevelId) -> Result<Level, ClientError> {
        let response = self
            .request(Method::GET, &format!("levels/{level_id}"))
            .await?
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn create_level(&self, request: CreateLevelRequest) -> Result<Level, ClientError> {
        let response = self
            .request(Method::POST, "levels")
            .await?
            .json(&request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn update_level(
        &self,
        level_id: &LevelId,
        request: UpdateLevelRequest,
    ) -> Result<Level, ClientError> {
        let response = self
            .request(Method::PUT, &format!("levels/{level_id}"))
            .await?
            .json(&request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn delete_level(&self, level_id: &LevelId) -> Result<(), ClientError> {
        let response = self
            .request(Method::DELETE, &format!("levels/{level_id}"))
            .await?
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn create_step(
        &self,
        level_id: &LevelId,
        request: CreateStepRequest,
    ) -> Result<Step, ClientError> {
        let response = self
            .request(Method::POST, &format!("levels/{level_id}/steps"))
            .await?
            .json(&request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn update_step(
        &self,
        level_id: &LevelId,
        step_id: &StepId,
        request: UpdateStepRequest,
    ) -> Result<Step, ClientError> {
        let response = self
            .request(Method::PUT, &format!("levels/{level_id}/steps/{step_id}"))
            .await?
            .json(&request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn delete_step(
        &self,
        level_id: &LevelId,
        step_id: &StepId,
    ) -> Result<(), ClientError> {
        let response = self
            .request(Method::DELETE, &format!("levels/{level_id}/steps/{step_id}"))
            .await?
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Uploads score bytes and associates the created score with a step.
    /// Two independent requests: `POST /scores` (must answer 201), then
    /// `PUT .../update-score` linking the returned id.
    pub async fn upload_score(
        &self,
        level_id: &LevelId,
        step_id: &StepId,
        bytes: &[u8],
    ) -> Result<ScoreId, ClientError> {
        match self.upload_score_inner(level_id, step_id, bytes).await {
            Ok(score_id) => {
                info!("uploaded score {score_id} for step {step_id}");
                let _ = self.events.send(ClientEvent::ScoreUploaded {
                    step_id: step_id.clone(),
                    score_id: score_id.clone(),
                });
                Ok(score_id)
            }
            Err(err) => {
                warn!("score upload for step {step_id} failed: {err}");
                let _ = self
                    .events
                    .send(ClientEvent::Error(format!("failed to upload score: {err}")));
                Err(err)
            }
        }
    }

    /// Reads a score file to completion and uploads it. The read is a single
    /// suspend point producing the whole byte buffer.
    pub async fn upload_score_file(
        &self,
        level_id: &LevelId,
        step_id: &StepId,
        path: &Path,
    ) -> Result<ScoreId, ClientError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::ScoreFileRead {
                path: path.display().to_string(),
                source,
            })?;
        self.upload_score(level_id, step_id, &bytes).await
    }

    async fn upload_score_inner(
        &self,
        level_id: &LevelId,
        step_id: &StepId,
        bytes: &[u8],
    ) -> Result<ScoreId, ClientError> {
        let payload = CreateScoreRequest {
            data: STANDARD.encode(bytes),
        };
        let response = self
            .request(Method::POST, "scores")
            .await?
            .json(&payload)
            .send()
            .await?;
        if response.status() != StatusCode::CREATED {
            return Err(Self::error_from(response).await);
        }
        let score: Score = response.json().await?;

        let link = LinkScoreRequest {
            score_id: score.id.clone(),
        };
        let response = self
            .request(
                Method::PUT,
                &format!("levels/{level_id}/steps/{step_id}/update-score"),
            )
            .await?
            .json(&link)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(score.id)
    }

    /// Fetches the raw bytes of a score attachment.
    pub async fn download_score(&self, score_id: &ScoreId) -> Result<Vec<u8>, ClientError> {
        let response = self
            .request(Method::GET, &format!("scores/{score_id}"))
            .await?
            .send()
            .await?;
        match Self::check(response).await {
            Ok(response) => {
                let bytes = response.bytes().await?.to_vec();
                let _ = self.events.send(ClientEvent::ScoreDownloaded {
                    score_id: score_id.clone(),
                });
                Ok(bytes)
            }
            Err(err) => {
                warn!("score download for {score_id} failed: {err}");
                let _ = self.events.send(ClientEvent::Error(format!(
                    "failed to download score: {err}"
                )));
                Err(err)
            }
        }
    }

    /// Reconciler for the top-level levels collection.
    pub fn level_reorderer(&self) -> Reorderer<Level, HttpLevelOrderSink> {
        Reorderer::new(
            HttpLevelOrderSink {
                http: self.http.clone(),
                url: format!("{}/levels/order", self.base_url),
                tokens: Arc::clone(&self.tokens),
            },
            "levels",
            self.events.clone(),
        )
    }

    /// Reconciler for the steps of one level.
    pub fn step_reorderer(&self, level_id: &LevelId) -> Reorderer<Step, HttpStepOrderSink> {
        Reorderer::new(
            HttpStepOrderSink {
                http: self.http.clone(),
                url: format!("{}/levels/{level_id}/steps/order", self.base_url),
                tokens: Arc::clone(&self.tokens),
            },
            format!("steps of level {level_id}"),
            self.events.clone(),
        )
    }
}

async fn submit_json_order<B: serde::Serialize>(
    http: &Client,
    url: &str,
    tokens: &Arc<dyn AccessTokenProvider>,
    body: &B,
) -> Result<(), OrderSinkError> {
    let token = tokens
        .access_token()
        .await
        .map_err(|err| OrderSinkError::Token(err.to_string()))?;
    let response = http
        .post(url)
        .bearer_auth(token)
        .json(body)
        .send()
        .await
        .map_err(|err| OrderSinkError::Transport(err.to_string()))?;
    if response.status().is_success() {
        Ok(())
    } else {
        Err(OrderSinkError::Rejected(response.status().as_u16()))
    }
}

/// `POST /levels/order` with the entire level id sequence.
pub struct HttpLevelOrderSink {
    http: Client,
    url: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

#[async_trait]
impl OrderSink<LevelId> for HttpLevelOrderSink {
    async fn submit_order(&self, order: &[LevelId]) -> Result<(), OrderSinkError> {
        let body = ReorderLevelsRequest {
            level_order: order.to_vec(),
        };
        submit_json_order(&self.http, &self.url, &self.tokens, &body).await
    }
}

/// `POST /levels/{levelId}/steps/order` with the entire step id sequence.
pub struct HttpStepOrderSink {
    http: Client,
    url: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

#[async_trait]
impl OrderSink<StepId> for HttpStepOrderSink {
    async fn submit_order(&self, order: &[StepId]) -> Result<(), OrderSinkError> {
        let body = ReorderStepsRequest {
            steps_order: order.to_vec(),
        };
        submit_json_order(&self.http, &self.url, &self.tokens, &body).await
    }
}

#[cfg(test)]
mod tests;
