use std::path::PathBuf;
use std::time::Duration;

/// Project the tool targets when nothing overrides it
pub const DEFAULT_PROJECT_ID: &str = "juno-financial-assistant";

/// Firestore's name for the database every project gets
pub const DEFAULT_DATABASE_ID: &str = "(default)";

pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com/v1";
const WELL_KNOWN_CREDENTIALS_FILE: &str = "application_default_credentials.json";

/// Remote store configuration
///
/// Names the database to clear and where the ambient credentials live.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Google Cloud project that owns the database
    pub project_id: String,

    /// Firestore database id inside the project
    pub database_id: String,

    /// `host:port` of a Firestore emulator; disables credential lookup
    pub emulator_host: Option<String>,

    /// Explicit key file (`GOOGLE_APPLICATION_CREDENTIALS`)
    pub credentials_file: Option<PathBuf>,

    /// gcloud configuration directory holding the well-known credentials file
    pub gcloud_config_dir: Option<PathBuf>,

    /// Host of the compute metadata server
    pub metadata_host: String,

    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,

    /// Page size used when listing collections and documents
    pub page_size: u32,
}

impl StoreConfig {
    /// Create a configuration for the given project with default settings
    pub fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            database_id: DEFAULT_DATABASE_ID.to_string(),
            emulator_host: None,
            credentials_file: None,
            gcloud_config_dir: None,
            metadata_host: DEFAULT_METADATA_HOST.to_string(),
            request_timeout: Duration::from_secs(30),
            page_size: 300,
        }
    }

    /// Build a configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // only a tool-specific variable may retarget; GOOGLE_CLOUD_PROJECT is ignored
        let project_id =
            var("FIRESTORE_PROJECT_ID").unwrap_or_else(|| DEFAULT_PROJECT_ID.to_string());

        let mut config = Self::new(&project_id);

        if let Some(database) = var("FIRESTORE_DATABASE") {
            config.database_id = database;
        }
        config.emulator_host = var("FIRESTORE_EMULATOR_HOST");
        config.credentials_file = var("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from);
        config.gcloud_config_dir = var("CLOUDSDK_CONFIG")
            .map(PathBuf::from)
            .or_else(|| default_gcloud_dir(&var));
        if let Some(host) = var("GCE_METADATA_HOST") {
            config.metadata_host = host;
        }

        config
    }

    /// Set the project id
    pub fn project_id(mut self, project_id: &str) -> Self {
        self.project_id = project_id.to_string();
        self
    }

    /// Set the database id
    pub fn database(mut self, database_id: &str) -> Self {
        self.database_id = database_id.to_string();
        self
    }

    /// Point the client at an emulator instead of the production endpoint
    pub fn emulator_host(mut self, host: &str) -> Self {
        self.emulator_host = Some(host.to_string());
        self
    }

    /// Use an explicit credentials key file
    pub fn credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    /// Set the gcloud configuration directory
    pub fn gcloud_config_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.gcloud_config_dir = Some(path.into());
        self
    }

    /// Set the metadata server host
    pub fn metadata_host(mut self, host: &str) -> Self {
        self.metadata_host = host.to_string();
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the listing page size
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Root URL of the REST API
    pub fn base_url(&self) -> String {
        match &self.emulator_host {
            Some(host) => format!("http://{}/v1", host.trim_end_matches('/')),
            None => FIRESTORE_ENDPOINT.to_string(),
        }
    }

    /// `projects/{project}/databases/{database}`
    pub fn database_path(&self) -> String {
        format!("projects/{}/databases/{}", self.project_id, self.database_id)
    }

    /// Parent resource of all top-level collections
    pub fn documents_root(&self) -> String {
        format!("{}/documents", self.database_path())
    }

    /// Location of the file written by `gcloud auth application-default login`
    pub fn well_known_credentials_path(&self) -> Option<PathBuf> {
        self.gcloud_config_dir
            .as_ref()
            .map(|dir| dir.join(WELL_KNOWN_CREDENTIALS_FILE))
    }

    pub fn is_emulator(&self) -> bool {
        self.emulator_host.is_some()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.project_id.trim().is_empty() {
            return Err("project_id cannot be empty".to_string());
        }

        if self.project_id.contains('/') {
            return Err(format!("project_id '{}' must not contain '/'", self.project_id));
        }

        if self.database_id.trim().is_empty() {
            return Err("database_id cannot be empty".to_string());
        }

        if self.page_size == 0 {
            return Err("page_size must be > 0".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("request_timeout must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT_ID)
    }
}

fn default_gcloud_dir<F>(var: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if cfg!(windows) {
        var("APPDATA").map(|dir| PathBuf::from(dir).join("gcloud"))
    } else {
        var("HOME").map(|home| PathBuf::from(home).join(".config").join("gcloud"))
    }
}
