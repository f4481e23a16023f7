//! Record fetcher: interviewee search and per-candidate detail retrieval
//! against the records backend.
//!
//! Every authorized call gets exactly one silent refresh-and-retry on 401.
//! Detail fetches fan out with bounded concurrency; results are reassembled
//! in search-result order.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::models::interviewee::{raw_summary, SearchResponse};
use crate::models::{ExtractedQuery, InterviewDetail, IntervieweeCandidate, SessionToken};
use crate::session::{SessionError, SessionManager};

const INTERVIEWEES_PATH: [&str; 2] = ["interview", "interviewees"];

/// Upper bound the backend accepts for one search page.
pub const MAX_SEARCH_LIMIT: u32 = 50;

#[derive(Error, Debug)]
pub enum RecordsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Session refresh failed: {0}")]
    Session(#[from] SessionError),

    #[error("Backend rejected the refreshed session token")]
    Unauthorized,

    #[error("Backend error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Invalid backend base URL: {0}")]
    InvalidBaseUrl(String),
}

impl RecordsError {
    pub fn is_timeout(&self) -> bool {
        match self {
            RecordsError::Http(e) => e.is_timeout(),
            RecordsError::Session(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Authorization problems are systemic, never a per-candidate failure.
    pub fn is_auth(&self) -> bool {
        matches!(self, RecordsError::Session(_) | RecordsError::Unauthorized)
    }
}

pub struct RecordFetcher {
    client: Client,
    base_url: Url,
    sessions: Arc<SessionManager>,
    search_limit: u32,
    detail_concurrency: usize,
}

impl RecordFetcher {
    pub fn new(config: &BackendConfig, sessions: Arc<SessionManager>) -> Result<Self, RecordsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| RecordsError::InvalidBaseUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RecordsError::InvalidBaseUrl(config.base_url.clone()));
        }

        if config.search_limit > MAX_SEARCH_LIMIT {
            tracing::warn!(
                configured = config.search_limit,
                max = MAX_SEARCH_LIMIT,
                "search_limit above backend maximum, clamping"
            );
        }

        Ok(Self {
            client,
            base_url,
            sessions,
            search_limit: config.search_limit.clamp(1, MAX_SEARCH_LIMIT),
            detail_concurrency: config.detail_concurrency.max(1),
        })
    }

    /// Single page (offset 0) of interviewees matching the extracted filters.
    /// An empty result is not an error.
    pub async fn search(
        &self,
        token: &SessionToken,
        query: &ExtractedQuery,
    ) -> Result<Vec<IntervieweeCandidate>, RecordsError> {
        let mut params = vec![
            ("limit", self.search_limit.to_string()),
            ("offset", "0".to_string()),
            ("nameSearch", query.name.clone()),
            ("companySearch", query.company.clone()),
        ];
        if let Some(date) = &query.date {
            params.push(("dateSearch", date.clone()));
        }

        tracing::debug!(
            company = %query.company,
            name = %query.name,
            date = ?query.date,
            "Searching interviewees"
        );

        let url = self.endpoint(&[])?;
        let response: SearchResponse = self.authorized_get(token, url, &params).await?;
        Ok(response.interviewees)
    }

    pub async fn fetch_detail(
        &self,
        token: &SessionToken,
        candidate_id: &str,
    ) -> Result<InterviewDetail, RecordsError> {
        let url = self.endpoint(&[candidate_id])?;
        self.authorized_get(token, url, &[]).await
    }

    /// Latest-log summary for each candidate, in candidate order.
    ///
    /// Candidates whose detail fetch fails or who have no logs are skipped.
    /// Authorization failures abort the whole batch.
    pub async fn collect_summaries(
        &self,
        token: &SessionToken,
        candidates: &[IntervieweeCandidate],
    ) -> Result<Vec<String>, RecordsError> {
        let fetches: Vec<_> = candidates
            .iter()
            .map(|candidate| self.fetch_one(token, candidate))
            .collect();
        let fetched: Vec<_> = stream::iter(fetches)
            .buffered(self.detail_concurrency)
            .collect()
            .await;

        let mut summaries = Vec::with_capacity(fetched.len());
        for (candidate, detail) in fetched {
            match detail {
                Ok(detail) => match detail.latest_log() {
                    Some(log) => summaries.push(raw_summary(candidate, log)),
                    None => {
                        tracing::info!(candidate = %candidate.id, "Interviewee has no logs, skipping");
                    }
                },
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        candidate = %candidate.id,
                        error = %e,
                        "Interview detail fetch failed, skipping candidate"
                    );
                }
            }
        }

        Ok(summaries)
    }

    /// Detail fetch for one candidate of a batch, using whichever token the
    /// session manager currently holds so one refresh serves the whole batch.
    async fn fetch_one<'a>(
        &'a self,
        token: &'a SessionToken,
        candidate: &'a IntervieweeCandidate,
    ) -> (&'a IntervieweeCandidate, Result<InterviewDetail, RecordsError>) {
        let token = self.sessions.freshest(token).await;
        let detail = self.fetch_detail(&token, &candidate.id).await;
        (candidate, detail)
    }

    /// `{base}/interview/interviewees[/segment..]`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RecordsError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RecordsError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(INTERVIEWEES_PATH)
            .extend(segments);
        Ok(url)
    }

    async fn authorized_get<T: DeserializeOwned>(
        &self,
        token: &SessionToken,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<T, RecordsError> {
        let mut response = self.send_get(token, url.clone(), params).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let fresh = self.sessions.refresh_rejected(token).await?;
            response = self.send_get(&fresh, url.clone(), params).await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                tracing::error!(path = url.path(), "Backend rejected freshly issued token");
                return Err(RecordsError::Unauthorized);
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(path = url.path(), status = status.as_u16(), "Records backend error");
            return Err(RecordsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    async fn send_get(
        &self,
        token: &SessionToken,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<Response, reqwest::Error> {
        self.client
            .get(url)
            .query(params)
            .bearer_auth(token.value())
            .send()
            .await
    }
}
