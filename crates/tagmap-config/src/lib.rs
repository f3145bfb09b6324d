use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tagmap_core::{validate_batch_size, TagMatching, EMAIL_BATCH_LIMIT};
use thiserror::Error;
use url::Url;

const APP_DIR: &str = "tagmap";
const CONFIG_FILENAME: &str = "config.toml";

pub const BEARER_ENV: &str = "SMARTLEAD_BEARER";
pub const API_KEY_ENV: &str = "SMARTLEAD_API_KEY";

pub const DEFAULT_GRAPHQL_URL: &str = "https://fe-gql.smartlead.ai/v1/graphql";
pub const DEFAULT_TAG_MAPPING_URL: &str =
    "https://server.smartlead.ai/api/v1/email-accounts/tag-mapping";
pub const DEFAULT_REST_ACCOUNTS_URL: &str = "https://server.smartlead.ai/api/v1/email-accounts";
pub const DEFAULT_REST_TAGS_URL: &str = "https://server.smartlead.ai/api/v1/tags";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const MAX_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    pub lookup: LookupConfig,
    pub apply: ApplyConfig,
}

#[derive(Clone, Default)]
pub struct Credentials {
    pub bearer: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn require_bearer(&self) -> Result<&str> {
        self.bearer
            .as_deref()
            .ok_or(ConfigError::MissingCredential(BEARER_ENV))
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential(API_KEY_ENV))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub graphql_url: String,
    pub tag_mapping_url: String,
    pub rest_accounts_url: String,
    pub rest_tags_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            tag_mapping_url: DEFAULT_TAG_MAPPING_URL.to_string(),
            rest_accounts_url: DEFAULT_REST_ACCOUNTS_URL.to_string(),
            rest_tags_url: DEFAULT_REST_TAGS_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupSourceKind {
    Graphql,
    Rest,
}

impl LookupSourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LookupSourceKind::Graphql => "graphql",
            LookupSourceKind::Rest => "rest",
        }
    }
}

/// What to do when two remote records normalize to the same key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Log every collision and keep the last record.
    #[default]
    Warn,
    /// Refuse to produce a mapping.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupConfig {
    pub sources: Vec<LookupSourceKind>,
    pub cache_ttl_secs: u64,
    pub collisions: CollisionPolicy,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            sources: vec![LookupSourceKind::Graphql],
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            collisions: CollisionPolicy::Warn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyConfig {
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub dry_run: bool,
    pub tag_matching: TagMatching,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            batch_size: EMAIL_BATCH_LIMIT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            dry_run: true,
            tag_matching: TagMatching::Exact,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing home directory")]
    MissingHomeDir,
    #[error("invalid config path: {0}")]
    InvalidConfigPath(PathBuf),
    #[error("config file not found: {0}")]
    MissingConfigFile(PathBuf),
    #[error("config file permissions too permissive: {0}")]
    InsecurePermissions(PathBuf),
    #[error("invalid apply.batch_size value: {0} (expected 1..={max})", max = EMAIL_BATCH_LIMIT)]
    InvalidBatchSize(usize),
    #[error("invalid apply.timeout_secs value: {0}")]
    InvalidTimeout(u64),
    #[error("invalid endpoints.{field}: {value}")]
    InvalidEndpoint { field: &'static str, value: String },
    #[error("lookup.sources must name at least one source")]
    EmptyLookupSources,
    #[error("duplicate lookup source: {0}")]
    DuplicateLookupSource(&'static str),
    #[error("missing credential: set {0} or the matching [credentials] key")]
    MissingCredential(&'static str),
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    credentials: Option<CredentialsFile>,
    endpoints: Option<EndpointsFile>,
    lookup: Option<LookupFile>,
    apply: Option<ApplyFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CredentialsFile {
    bearer: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EndpointsFile {
    graphql_url: Option<String>,
    tag_mapping_url: Option<String>,
    rest_accounts_url: Option<String>,
    rest_tags_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LookupFile {
    sources: Option<Vec<LookupSourceKind>>,
    cache_ttl_secs: Option<u64>,
    collisions: Option<CollisionPolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApplyFile {
    batch_size: Option<usize>,
    timeout_secs: Option<u64>,
    dry_run: Option<bool>,
    case_insensitive_tags: Option<bool>,
}

/// Loads the config file (if any) and layers credential environment
/// variables on top of it.
pub fn load(config_path: Option<PathBuf>) -> Result<AppConfig> {
    let mut config = load_file(config_path)?;
    apply_env_overrides(&mut config, |name| env::var(name).ok());
    Ok(config)
}

fn load_file(config_path: Option<PathBuf>) -> Result<AppConfig> {
    let required = config_path.is_some();
    let path = match resolve_config_path(config_path) {
        Ok(path) => path,
        Err(ConfigError::MissingHomeDir) if !required => return Ok(AppConfig::default()),
        Err(ConfigError::InvalidConfigPath(_)) if !required => return Ok(AppConfig::default()),
        Err(err) => return Err(err),
    };
    match load_at_path(&path, required)? {
        Some(config) => Ok(config),
        None => Ok(AppConfig::default()),
    }
}

pub fn resolve_config_path(custom: Option<PathBuf>) -> Result<PathBuf> {
    match custom {
        Some(path) => {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidConfigPath(path));
            }
            Ok(path)
        }
        None => {
            let base = if let Some(dir) = env::var_os("XDG_CONFIG_HOME") {
                let path = PathBuf::from(dir);
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidConfigPath(path));
                }
                path
            } else {
                let home = dirs::home_dir().ok_or(ConfigError::MissingHomeDir)?;
                home.join(".config")
            };
            Ok(base.join(APP_DIR).join(CONFIG_FILENAME))
        }
    }
}

fn load_at_path(path: &Path, required: bool) -> Result<Option<AppConfig>> {
    if !path.exists() {
        if required {
            return Err(ConfigError::MissingConfigFile(path.to_path_buf()));
        }
        return Ok(None);
    }

    ensure_permissions(path)?;
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: ConfigFile = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(merge_config(parsed)?))
}

fn merge_config(parsed: ConfigFile) -> Result<AppConfig> {
    let mut config = AppConfig::default();

    if let Some(credentials) = parsed.credentials {
        config.credentials.bearer = non_empty(credentials.bearer);
        config.credentials.api_key = non_empty(credentials.api_key);
    }

    if let Some(endpoints) = parsed.endpoints {
        let target = &mut config.endpoints;
        for (field, value, slot) in [
            ("graphql_url", endpoints.graphql_url, &mut target.graphql_url),
            (
                "tag_mapping_url",
                endpoints.tag_mapping_url,
                &mut target.tag_mapping_url,
            ),
            (
                "rest_accounts_url",
                endpoints.rest_accounts_url,
                &mut target.rest_accounts_url,
            ),
            ("rest_tags_url", endpoints.rest_tags_url, &mut target.rest_tags_url),
        ] {
            if let Some(value) = value {
                *slot = validate_endpoint(field, &value)?;
            }
        }
    }

    if let Some(lookup) = parsed.lookup {
        if let Some(sources) = lookup.sources {
            config.lookup.sources = validate_sources(sources)?;
        }
        if let Some(ttl) = lookup.cache_ttl_secs {
            config.lookup.cache_ttl_secs = ttl;
        }
        if let Some(policy) = lookup.collisions {
            config.lookup.collisions = policy;
        }
    }

    if let Some(apply) = parsed.apply {
        if let Some(batch_size) = apply.batch_size {
            config.apply.batch_size = validate_batch_size(batch_size)
                .map_err(|_| ConfigError::InvalidBatchSize(batch_size))?;
        }
        if let Some(timeout) = apply.timeout_secs {
            if timeout == 0 || timeout > MAX_TIMEOUT_SECS {
                return Err(ConfigError::InvalidTimeout(timeout));
            }
            config.apply.timeout_secs = timeout;
        }
        if let Some(dry_run) = apply.dry_run {
            config.apply.dry_run = dry_run;
        }
        if let Some(case_insensitive) = apply.case_insensitive_tags {
            config.apply.tag_matching = if case_insensitive {
                TagMatching::CaseInsensitive
            } else {
                TagMatching::Exact
            };
        }
    }

    Ok(config)
}

fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(bearer) = non_empty(lookup(BEARER_ENV)) {
        config.credentials.bearer = Some(bearer);
    }
    if let Some(api_key) = non_empty(lookup(API_KEY_ENV)) {
        config.credentials.api_key = Some(api_key);
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn validate_sources(sources: Vec<LookupSourceKind>) -> Result<Vec<LookupSourceKind>> {
    if sources.is_empty() {
        return Err(ConfigError::EmptyLookupSources);
    }
    let mut seen = Vec::with_capacity(sources.len());
    for source in sources {
        if seen.contains(&source) {
            return Err(ConfigError::DuplicateLookupSource(source.as_str()));
        }
        seen.push(source);
    }
    Ok(seen)
}

/// Endpoints carry credentials, so plain http is only allowed to loopback.
pub fn validate_endpoint(field: &'static str, raw: &str) -> Result<String> {
    let invalid = || ConfigError::InvalidEndpoint {
        field,
        value: raw.to_string(),
    };
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|_| invalid())?;
    match url.scheme() {
        "https" => {}
        "http" if matches!(url.host_str(), Some("127.0.0.1" | "localhost" | "[::1]")) => {}
        _ => return Err(invalid()),
    }
    Ok(trimmed.to_string())
}

#[cfg(unix)]
fn ensure_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mode = metadata.permissions().mode();
    if mode & 0o077 != 0 {
        return Err(ConfigError::InsecurePermissions(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
