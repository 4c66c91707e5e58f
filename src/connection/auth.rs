use super::config::StoreConfig;
use crate::core::{PurgeError, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{Level, event};

/// OAuth scope granting read/write access to Firestore
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Appended to credential failures so the operator knows how to fix them
pub const LOGIN_HINT: &str =
    "Please ensure you're authenticated with gcloud: gcloud auth application-default login";

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const EMULATOR_TOKEN: &str = "owner";
const REFRESH_MARGIN_SECS: i64 = 60;
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const METADATA_PROBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

// ============================================================================
// Key files
// ============================================================================

/// Credential key file, as written by gcloud or downloaded from IAM
#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyFile {
    AuthorizedUser(AuthorizedUserKey),
    ServiceAccount(ServiceAccountKey),
}

/// User credentials created by `gcloud auth application-default login`
#[derive(Clone, Deserialize)]
pub struct AuthorizedUserKey {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub quota_project_id: Option<String>,
}

/// Service account JSON key
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl fmt::Debug for KeyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFile::AuthorizedUser(key) => f
                .debug_struct("AuthorizedUser")
                .field("client_id", &key.client_id)
                .field("client_secret", &"***")
                .field("refresh_token", &"***")
                .field("quota_project_id", &key.quota_project_id)
                .finish(),
            KeyFile::ServiceAccount(key) => f
                .debug_struct("ServiceAccount")
                .field("client_email", &key.client_email)
                .field("private_key", &"***")
                .field("private_key_id", &key.private_key_id)
                .field("token_uri", &key.token_uri)
                .finish(),
        }
    }
}

impl KeyFile {
    /// Parse a key file body
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            PurgeError::AuthenticationError(format!("Unsupported or malformed credentials: {}", e))
        })
    }

    /// Read and parse a key file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path).map_err(|e| {
            PurgeError::AuthenticationError(format!(
                "Cannot read credentials file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&body)
    }

    /// Project billed for quota, when the key names one
    pub fn quota_project(&self) -> Option<&str> {
        match self {
            KeyFile::AuthorizedUser(key) => key.quota_project_id.as_deref(),
            KeyFile::ServiceAccount(_) => None,
        }
    }
}

// ============================================================================
// Default credentials discovery
// ============================================================================

/// Where the access tokens come from
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Local emulator, no real authentication
    Emulator,
    /// Key file found on disk
    KeyFile { source: PathBuf, key: KeyFile },
    /// Compute metadata server of the instance we run on
    Metadata { host: String },
}

impl Credentials {
    /// Resolve application default credentials.
    ///
    /// Lookup order: emulator, explicit key file, gcloud well-known file,
    /// metadata server. The first source present wins; a present but
    /// unreadable source is an error rather than a fallthrough.
    pub async fn discover(config: &StoreConfig, http: &reqwest::Client) -> Result<Self> {
        if config.is_emulator() {
            return Ok(Credentials::Emulator);
        }

        if let Some(path) = &config.credentials_file {
            let key = KeyFile::load(path)?;
            return Ok(Credentials::KeyFile { source: path.clone(), key });
        }

        if let Some(path) = config.well_known_credentials_path() {
            if path.is_file() {
                let key = KeyFile::load(&path)?;
                return Ok(Credentials::KeyFile { source: path, key });
            }
        }

        if probe_metadata_server(http, &config.metadata_host).await {
            return Ok(Credentials::Metadata {
                host: config.metadata_host.clone(),
            });
        }

        Err(PurgeError::AuthenticationError(format!(
            "Could not find default credentials. {}",
            LOGIN_HINT
        )))
    }

    /// Human-readable description of the source, for logs
    pub fn describe(&self) -> String {
        match self {
            Credentials::Emulator => "emulator".to_string(),
            Credentials::KeyFile { source, key } => {
                let kind = match key {
                    KeyFile::AuthorizedUser(_) => "authorized_user",
                    KeyFile::ServiceAccount(_) => "service_account",
                };
                format!("{} key at {}", kind, source.display())
            }
            Credentials::Metadata { host } => format!("metadata server {}", host),
        }
    }
}

async fn probe_metadata_server(http: &reqwest::Client, host: &str) -> bool {
    let response = http
        .get(format!("http://{}", host))
        .header("Metadata-Flavor", "Google")
        .timeout(METADATA_PROBE_TIMEOUT)
        .send()
        .await;

    match response {
        Ok(resp) => resp
            .headers()
            .get("Metadata-Flavor")
            .is_some_and(|value| value == "Google"),
        Err(err) => {
            event!(Level::DEBUG, error = %err, host = %host, "metadata server not reachable");
            false
        }
    }
}

// ============================================================================
// Access tokens
// ============================================================================

/// A bearer token and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Usable for at least the refresh margin from `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Claims of the self-signed assertion exchanged for a service account token
#[derive(Debug, Serialize, PartialEq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(key: &ServiceAccountKey, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            iss: key.client_email.clone(),
            scope: DATASTORE_SCOPE.to_string(),
            aud: key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }
}

fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
        PurgeError::AuthenticationError(format!("Invalid service account private key: {}", e))
    })?;

    jsonwebtoken::encode(&header, &AssertionClaims::new(key, now), &signing_key).map_err(|e| {
        PurgeError::AuthenticationError(format!("Cannot sign token assertion: {}", e))
    })
}

/// Hands out bearer tokens for the resolved credentials, refreshing them
/// shortly before they expire.
pub struct TokenSource {
    http: reqwest::Client,
    credentials: Credentials,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenSource {
    pub fn new(http: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            http,
            credentials,
            cached: Mutex::new(None),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Project to send in `x-goog-user-project`, if any
    pub fn quota_project(&self) -> Option<&str> {
        match &self.credentials {
            Credentials::KeyFile { key, .. } => key.quota_project(),
            _ => None,
        }
    }

    /// Current bearer token, fetching a new one when needed
    pub async fn bearer(&self) -> Result<String> {
        if matches!(self.credentials, Credentials::Emulator) {
            return Ok(EMULATOR_TOKEN.to_string());
        }

        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let token = self.fetch(now).await?;
        event!(
            Level::DEBUG,
            source = %self.credentials.describe(),
            expires_at = %token.expires_at,
            "access token refreshed"
        );
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch(&self, now: DateTime<Utc>) -> Result<AccessToken> {
        let request = match &self.credentials {
            Credentials::Emulator => {
                return Ok(AccessToken {
                    value: EMULATOR_TOKEN.to_string(),
                    expires_at: now + Duration::days(1),
                });
            }
            Credentials::KeyFile { key: KeyFile::AuthorizedUser(key), .. } => self
                .http
                .post(GOOGLE_TOKEN_URI)
                .form(&[
                    ("grant_type", "refresh_token"),
                    ("client_id", key.client_id.as_str()),
                    ("client_secret", key.client_secret.as_str()),
                    ("refresh_token", key.refresh_token.as_str()),
                ]),
            Credentials::KeyFile { key: KeyFile::ServiceAccount(key), .. } => {
                let assertion = sign_assertion(key, now)?;
                self.http
                    .post(&key.token_uri)
                    .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            }
            Credentials::Metadata { host } => self
                .http
                .get(format!(
                    "http://{}/computeMetadata/v1/instance/service-accounts/default/token",
                    host
                ))
                .query(&[("scopes", DATASTORE_SCOPE)])
                .header("Metadata-Flavor", "Google"),
        };

        let response = request.send().await.map_err(|e| {
            PurgeError::AuthenticationError(format!("Token request failed: {}", e))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            PurgeError::AuthenticationError(format!("Token response unreadable: {}", e))
        })?;

        if !status.is_success() {
            return Err(PurgeError::AuthenticationError(describe_token_failure(status, &body)));
        }

        parse_token_response(&body, now)
    }
}

fn describe_token_failure(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(err) => format!(
            "Credentials rejected ({}): {}{}",
            status,
            err.error,
            err.error_description
                .map(|d| format!(" ({})", d))
                .unwrap_or_default()
        ),
        Err(_) => format!("Credentials rejected ({})", status),
    }
}

fn parse_token_response(body: &str, now: DateTime<Utc>) -> Result<AccessToken> {
    let token: TokenResponse = serde_json::from_str(body).map_err(|e| {
        PurgeError::AuthenticationError(format!("Malformed token response: {}", e))
    })?;

    Ok(AccessToken {
        value: token.access_token,
        expires_at: now + Duration::seconds(token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS)),
    })
}
