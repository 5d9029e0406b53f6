//! Repository configuration loaded from environment variables.

use std::str::FromStr;

use common::Category;
use stream_store::ExpectedVersion;

/// Events requested by the single forward read behind `get_by_id`.
///
/// Histories longer than the page size are not replayed past it.
pub const DEFAULT_READ_PAGE_SIZE: usize = 4096;

/// What `save` does when the store rejects an append because the stream
/// moved past the expected version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Retry once with `ExpectedVersion::Any` and swallow the conflict.
    ///
    /// The write always lands, but concurrent writers may interleave
    /// without either of them noticing.
    #[default]
    BestEffortRetry,

    /// Surface the conflict to the caller and leave the aggregate untouched.
    Strict,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" | "retry" => Ok(ConflictPolicy::BestEffortRetry),
            "strict" => Ok(ConflictPolicy::Strict),
            other => Err(format!("unknown conflict policy '{other}'")),
        }
    }
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictPolicy::BestEffortRetry => f.write_str("best-effort"),
            ConflictPolicy::Strict => f.write_str("strict"),
        }
    }
}

/// Repository configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `REPOSITORY_CATEGORY`: stream category (default: `"domain"`)
/// - `REPOSITORY_CONFLICT_POLICY`: `best-effort` or `strict` (default: `best-effort`)
/// - `REPOSITORY_READ_PAGE_SIZE`: events per `get_by_id` read (default: `4096`)
/// - `REPOSITORY_METASTREAM_VERSION`: expected metadata stream version:
///   a position, `no-stream`, or `any` (default: `any`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub category: Category,
    pub conflict_policy: ConflictPolicy,
    pub read_page_size: usize,
    pub metastream_expected_version: ExpectedVersion,
}

impl RepositoryConfig {
    /// Default configuration for `category`.
    pub fn new(category: impl Into<Category>) -> Self {
        Self {
            category: category.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let conflict_policy = match std::env::var("REPOSITORY_CONFLICT_POLICY") {
            Ok(value) => value.parse().unwrap_or_else(|error| {
                tracing::warn!(%error, "ignoring REPOSITORY_CONFLICT_POLICY");
                defaults.conflict_policy
            }),
            Err(_) => defaults.conflict_policy,
        };

        Self {
            category: std::env::var("REPOSITORY_CATEGORY")
                .map(Category::from)
                .unwrap_or(defaults.category),
            conflict_policy,
            read_page_size: std::env::var("REPOSITORY_READ_PAGE_SIZE")
                .ok()
                .and_then(|size| size.parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.read_page_size),
            metastream_expected_version: std::env::var("REPOSITORY_METASTREAM_VERSION")
                .ok()
                .and_then(|value| parse_expected_version(&value))
                .unwrap_or(defaults.metastream_expected_version),
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            category: Category::from("domain"),
            conflict_policy: ConflictPolicy::default(),
            read_page_size: DEFAULT_READ_PAGE_SIZE,
            metastream_expected_version: ExpectedVersion::Any,
        }
    }
}

fn parse_expected_version(value: &str) -> Option<ExpectedVersion> {
    match value.trim().to_ascii_lowercase().as_str() {
        "any" => Some(ExpectedVersion::Any),
        "no-stream" | "no_stream" => Some(ExpectedVersion::NoStream),
        position => position.parse().ok().map(ExpectedVersion::Exact),
    }
}
