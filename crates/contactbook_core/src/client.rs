//! Remote directory client.
//!
//! # Responsibility
//! - Issue the four directory requests against the REST service.
//! - Race every request against a fixed timeout.
//! - Map every failure into `DirectoryError` before it leaves this module.
//!
//! # Invariants
//! - One request per call; no retries.
//! - When the timer wins, the request future is dropped and its late
//!   response can never reach the caller.
//! - A 2xx write response with an empty body yields `None`, not a parse
//!   failure. An empty directory fetch body is a failure, never `[]`.
//! - Ids are sent as single percent-encoded path segments.

use crate::error::{DirectoryError, DirectoryResult, RemoteOperation};
use crate::model::contact::{ContactId, RawContact};
use crate::model::draft::ContactPayload;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const CONTACTS_SEGMENT: &str = "contacts";

/// Request/response contract of the remote contact service.
///
/// The core only talks to the service through this trait, so tests and
/// alternative transports can stand in for HTTP.
#[async_trait]
pub trait ContactsApi: Send + Sync {
    /// `GET /contacts`.
    async fn fetch_all(&self) -> DirectoryResult<Vec<RawContact>>;
    /// `POST /contacts`; returns the created record when the body has one.
    async fn create(&self, payload: &ContactPayload) -> DirectoryResult<Option<RawContact>>;
    /// `PUT /contacts/{id}`; returns the updated record when the body has one.
    async fn update(
        &self,
        id: &ContactId,
        payload: &ContactPayload,
    ) -> DirectoryResult<Option<RawContact>>;
    /// `DELETE /contacts/{id}`.
    async fn delete(&self, id: &ContactId) -> DirectoryResult<()>;
}

/// `reqwest`-backed implementation of [`ContactsApi`].
#[derive(Clone, Debug)]
pub struct HttpContactsClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpContactsClient {
    /// Creates a client for `base_url` (e.g. `http://localhost:3000/api`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, timeout)
    }

    /// Creates a client reusing an existing connection pool.
    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds `<base>/contacts` or `<base>/contacts/<id>`.
    ///
    /// The id is pushed as one percent-encoded path segment, so reserved
    /// characters in textual ids stay inside the id.
    fn endpoint(
        &self,
        operation: RemoteOperation,
        id: Option<&ContactId>,
    ) -> DirectoryResult<Url> {
        let mut url =
            Url::parse(&self.base_url).map_err(|err| DirectoryError::unknown(operation, err))?;
        {
            let mut segments = url.path_segments_mut().map_err(|()| DirectoryError::Unknown {
                operation,
                detail: format!("base url `{}` cannot carry a path", self.base_url),
                source: None,
            })?;
            segments.pop_if_empty().push(CONTACTS_SEGMENT);
            if let Some(id) = id {
                segments.push(&id.to_string());
            }
        }
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: RemoteOperation,
        request: RequestBuilder,
    ) -> DirectoryResult<Option<T>> {
        let body = self.exchange(operation, request).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice::<T>(&body)
            .map(Some)
            .map_err(|err| DirectoryError::unknown(operation, err))
    }

    /// Sends `request` and reads the success body inside the timeout window.
    async fn exchange(
        &self,
        operation: RemoteOperation,
        request: RequestBuilder,
    ) -> DirectoryResult<Vec<u8>> {
        let started = Instant::now();
        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|err| DirectoryError::unknown(operation, err))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(DirectoryError::Http {
                    operation,
                    status: status.as_u16(),
                    status_text: status.canonical_reason().unwrap_or_default().to_string(),
                    body: body.trim().to_string(),
                });
            }

            response
                .bytes()
                .await
                .map(|bytes| bytes.to_vec())
                .map_err(|err| DirectoryError::unknown(operation, err))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => {
                debug!(
                    "event=remote_request module=client status={} operation={} elapsed_ms={}",
                    if result.is_ok() { "ok" } else { "error" },
                    operation,
                    started.elapsed().as_millis()
                );
                result
            }
            Err(_) => {
                warn!(
                    "event=remote_request module=client status=timeout operation={} timeout_ms={}",
                    operation,
                    self.timeout.as_millis()
                );
                Err(DirectoryError::Timeout {
                    operation,
                    after: self.timeout,
                })
            }
        }
    }
}

#[async_trait]
impl ContactsApi for HttpContactsClient {
    async fn fetch_all(&self) -> DirectoryResult<Vec<RawContact>> {
        let operation = RemoteOperation::FetchAll;
        let request = self.http.get(self.endpoint(operation, None)?);
        // An empty 2xx body is not an empty directory; replacing the cache
        // with nothing would drop every contact.
        self.execute::<Vec<RawContact>>(operation, request)
            .await?
            .ok_or_else(|| DirectoryError::Unknown {
                operation,
                detail: "empty directory body".to_string(),
                source: None,
            })
    }

    async fn create(&self, payload: &ContactPayload) -> DirectoryResult<Option<RawContact>> {
        let operation = RemoteOperation::Create;
        let request = self.http.post(self.endpoint(operation, None)?).json(payload);
        self.execute(operation, request).await
    }

    async fn update(
        &self,
        id: &ContactId,
        payload: &ContactPayload,
    ) -> DirectoryResult<Option<RawContact>> {
        let operation = RemoteOperation::Update;
        let request = self.http.put(self.endpoint(operation, Some(id))?).json(payload);
        self.execute(operation, request).await
    }

    async fn delete(&self, id: &ContactId) -> DirectoryResult<()> {
        // Success carries no meaningful body.
        let operation = RemoteOperation::Delete;
        let request = self.http.delete(self.endpoint(operation, Some(id))?);
        self.exchange(operation, request).await.map(|_| ())
    }
}

/// Runs `fut` until it settles or `token` is cancelled.
///
/// Cancellation drops `fut` and resolves with `DirectoryError::Aborted`.
pub async fn run_abortable<F, T>(
    token: &CancellationToken,
    operation: RemoteOperation,
    fut: F,
) -> DirectoryResult<T>
where
    F: Future<Output = DirectoryResult<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(DirectoryError::Aborted { operation }),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::{run_abortable, HttpContactsClient};
    use crate::error::{DirectoryError, ErrorKind, RemoteOperation};
    use crate::model::contact::ContactId;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn client(base_url: &str) -> HttpContactsClient {
        HttpContactsClient::new(base_url, Duration::from_secs(1))
    }

    #[test]
    fn urls_ignore_trailing_slash() {
        let api = client("http://localhost:3000/api/");
        assert_eq!(api.base_url(), "http://localhost:3000/api");
        let url = api
            .endpoint(RemoteOperation::Update, Some(&ContactId::Number(4)))
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/contacts/4");

        let bare = client("http://localhost:3000");
        let url = bare.endpoint(RemoteOperation::FetchAll, None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/contacts");
    }

    #[test]
    fn textual_id_stays_one_path_segment() {
        let url = client("http://localhost:3000/api")
            .endpoint(
                RemoteOperation::Delete,
                Some(&ContactId::Text("7#x/y?z".to_string())),
            )
            .unwrap();
        assert_eq!(url.path(), "/api/contacts/7%23x%2Fy%3Fz");
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), None);
    }

    #[test]
    fn unparseable_base_url_is_unknown() {
        let err = client("not a url")
            .endpoint(RemoteOperation::FetchAll, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn cancelled_token_aborts_pending_future() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<(), DirectoryError> =
            run_abortable(&token, RemoteOperation::Create, std::future::pending()).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Aborted);
    }

    #[tokio::test]
    async fn settled_future_wins_over_live_token() {
        let token = CancellationToken::new();
        let result = run_abortable(&token, RemoteOperation::Delete, async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
