use super::{CollectionStream, DocumentStore, DocumentStream, WriteBatch};
use crate::connection::auth::{Credentials, LOGIN_HINT, TokenSource};
use crate::connection::config::StoreConfig;
use crate::core::{CollectionRef, DocumentRef, PurgeError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{Level, event};

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListCollectionIdsRequest<'a> {
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCollectionIdsResponse {
    #[serde(default)]
    collection_ids: Vec<String>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentName {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<DocumentName>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteWrite<'a> {
    delete: &'a str,
}

#[derive(Debug, Serialize)]
struct CommitRequest<'a> {
    writes: Vec<DeleteWrite<'a>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    #[serde(default)]
    write_results: Vec<serde_json::Value>,
    #[serde(default)]
    commit_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

// ============================================================================
// Request errors
// ============================================================================

/// Failure of a single REST call, before it is attributed to an operation
#[derive(Debug, thiserror::Error)]
enum RequestError {
    #[error(transparent)]
    Credentials(PurgeError),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("{status} {code}: {message}")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("malformed response: {0}")]
    Decode(String),
}

impl RequestError {
    fn from_body(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => RequestError::Api {
                status,
                code: envelope.error.status,
                message: envelope.error.message,
            },
            Err(_) => RequestError::Api {
                status,
                code: String::new(),
                message: body.trim().to_string(),
            },
        }
    }

    /// Attribute the failure to the operation that issued the request.
    ///
    /// Credential problems stay authentication errors whatever the
    /// operation was.
    fn attribute(self, wrap: impl FnOnce(String) -> PurgeError) -> PurgeError {
        match self {
            RequestError::Credentials(err) => err,
            RequestError::Api { status, message, .. } if status == StatusCode::UNAUTHORIZED => {
                PurgeError::AuthenticationError(format!("{} {}", message, LOGIN_HINT))
            }
            other => wrap(other.to_string()),
        }
    }
}

/// Position in a paginated listing
enum PageCursor {
    First,
    Next(String),
    Exhausted,
}

impl PageCursor {
    fn after(next_page_token: Option<String>) -> Self {
        match next_page_token {
            Some(token) if !token.is_empty() => PageCursor::Next(token),
            _ => PageCursor::Exhausted,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Firestore REST client bound to one project and database
pub struct FirestoreClient {
    http: reqwest::Client,
    config: StoreConfig,
    tokens: TokenSource,
}

impl FirestoreClient {
    /// Resolve default credentials and build a client for the configured
    /// project.
    ///
    /// One access token is fetched up front so rejected credentials fail
    /// here, before anything is listed or deleted.
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        config.validate().map_err(PurgeError::ConfigError)?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PurgeError::ConfigError(format!("Cannot build HTTP client: {}", e)))?;

        let credentials = Credentials::discover(&config, &http).await?;
        event!(
            Level::INFO,
            project = %config.project_id,
            database = %config.database_id,
            source = %credentials.describe(),
            "default credentials resolved"
        );

        let tokens = TokenSource::new(http.clone(), credentials);
        tokens.bearer().await?;

        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url(), path)
    }

    /// Listing URL of one collection, its id pushed as a single encoded segment
    fn collection_url(&self, collection: &CollectionRef) -> std::result::Result<Url, String> {
        let mut url = Url::parse(&self.url(&self.config.documents_root()))
            .map_err(|e| format!("invalid base URL: {}", e))?;
        url.path_segments_mut()
            .map_err(|_| "base URL cannot carry a path".to_string())?
            .push(collection.id());
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<T, RequestError> {
        let bearer = self.tokens.bearer().await.map_err(RequestError::Credentials)?;
        let mut request = request.bearer_auth(bearer);
        if let Some(project) = self.tokens.quota_project() {
            request = request.header("x-goog-user-project", project);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RequestError::from_body(status, &body));
        }

        if body.trim().is_empty() {
            return serde_json::from_str("{}").map_err(|e| RequestError::Decode(e.to_string()));
        }

        serde_json::from_str(&body).map_err(|e| RequestError::Decode(e.to_string()))
    }

    async fn next_collection_page(
        &self,
        cursor: PageCursor,
    ) -> Result<Option<(Vec<CollectionRef>, PageCursor)>> {
        let page_token = match &cursor {
            PageCursor::First => None,
            PageCursor::Next(token) => Some(token.as_str()),
            PageCursor::Exhausted => return Ok(None),
        };

        let request = self
            .http
            .post(self.url(&format!("{}:listCollectionIds", self.config.documents_root())))
            .json(&ListCollectionIdsRequest {
                page_size: self.config.page_size,
                page_token,
            });

        let page: ListCollectionIdsResponse = self
            .send(request)
            .await
            .map_err(|e| e.attribute(PurgeError::EnumerationError))?;

        event!(Level::DEBUG, count = page.collection_ids.len(), "collection page fetched");

        let collections = page
            .collection_ids
            .into_iter()
            .map(CollectionRef::new)
            .collect();
        Ok(Some((collections, PageCursor::after(page.next_page_token))))
    }

    async fn next_document_page(
        &self,
        collection: &CollectionRef,
        cursor: PageCursor,
    ) -> Result<Option<(Vec<DocumentRef>, PageCursor)>> {
        let page_token = match &cursor {
            PageCursor::First => None,
            PageCursor::Next(token) => Some(token.as_str()),
            PageCursor::Exhausted => return Ok(None),
        };

        let page_size = self.config.page_size.to_string();
        let mut query = vec![
            ("pageSize", page_size.as_str()),
            ("mask.fieldPaths", "__name__"),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let url = self
            .collection_url(collection)
            .map_err(|message| PurgeError::StreamingError(collection.id().to_string(), message))?;
        let request = self.http.get(url).query(&query);

        let page: ListDocumentsResponse = self.send(request).await.map_err(|e| {
            e.attribute(|message| PurgeError::StreamingError(collection.id().to_string(), message))
        })?;

        event!(
            Level::DEBUG,
            collection = %collection,
            count = page.documents.len(),
            "document page fetched"
        );

        let documents = page
            .documents
            .into_iter()
            .map(|doc| DocumentRef::new(doc.name))
            .collect();
        Ok(Some((documents, PageCursor::after(page.next_page_token))))
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    fn list_collections(&self) -> CollectionStream<'_> {
        stream::try_unfold(PageCursor::First, move |cursor| {
            self.next_collection_page(cursor)
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, PurgeError>)))
        .try_flatten()
        .boxed()
    }

    fn stream_documents<'a>(&'a self, collection: &'a CollectionRef) -> DocumentStream<'a> {
        stream::try_unfold(PageCursor::First, move |cursor| {
            self.next_document_page(collection, cursor)
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, PurgeError>)))
        .try_flatten()
        .boxed()
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let body = CommitRequest {
            writes: batch
                .documents()
                .iter()
                .map(|doc| DeleteWrite { delete: doc.name() })
                .collect(),
        };

        let request = self
            .http
            .post(self.url(&format!("{}/documents:commit", self.config.database_path())))
            .json(&body);

        let response: CommitResponse = self.send(request).await.map_err(|e| {
            e.attribute(|message| PurgeError::BatchCommitError(batch.collection().to_string(), message))
        })?;

        event!(
            Level::DEBUG,
            collection = %batch.collection(),
            writes = response.write_results.len(),
            commit_time = response.commit_time.as_deref().unwrap_or(""),
            "batch committed"
        );

        Ok(())
    }
}
