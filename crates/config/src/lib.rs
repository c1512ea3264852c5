//! Layered configuration for tome.
//!
//! Values are merged, later layers winning, from:
//! 1. built-in defaults,
//! 2. `tome.toml`, `tome.yaml` and `tome.json` in the user's configuration
//!    directory, or a single explicitly given file,
//! 3. `TOME_`-prefixed environment variables, with `__` separating nested
//!    keys (`TOME_SOLVER__URL`, `TOME_RATE_LIMIT__MAX_RETRIES`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tome_fetch::{CancellationToken, DirectClient, FetchHandle, ProxyClient, RateLimiter, RateLimits};
use tome_source::{ForumLayout, ForumSource, NextSource, SourceProvider, SourceRegistry};
use tracing::{debug, instrument};

const APPLICATION: &str = "tome";
const ENV_PREFIX: &str = "TOME_";
const DATABASE_FILE: &str = "tome.sqlite";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub solver: SolverConfig,
    pub http: HttpConfig,
    pub rate_limit: RateLimits,
    pub sources: BTreeMap<String, SourceConfig>,
    pub database: DatabaseConfig,
}

/// The anti-bot proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub url: String,
    pub version: String,
    /// Longest the proxy may spend rendering a single page.
    pub max_timeout_ms: u64,
    /// Upstream proxy for the proxy's browser to connect through.
    pub proxy: Option<String>,
}
impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8191".to_string(),
            version: "v1".to_string(),
            max_timeout_ms: 60_000,
            proxy: None,
        }
    }
}

/// Plain HTTP, for sources that don't need the anti-bot proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_ms: u64,
}
impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Forum,
    Next,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub base_url: String,
    /// Next.js build id; discovered from the site when unset.
    pub build_id: Option<String>,
    pub api_key: Option<String>,
    /// Fetch through the anti-bot proxy. Defaults to on for forum sources.
    pub solver: Option<bool>,
    /// Selectors for forum sources.
    pub layout: ForumLayout,
}
impl SourceConfig {
    pub fn uses_solver(&self) -> bool {
        self.solver.unwrap_or(self.kind == SourceKind::Forum)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Defaults to `tome.sqlite` in the user's data directory.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load from the default locations and the environment.
    pub fn load() -> Result<Self> {
        let dirs = project_dirs()?;
        let dir = dirs.config_dir();
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(dir.join("tome.toml")))
            .merge(Yaml::file(dir.join("tome.yaml")))
            .merge(Json::file(dir.join("tome.json")));
        Self::extract(figment)
    }

    /// Load from an explicit file (TOML, YAML or JSON, by extension) and the
    /// environment. Unlike the default locations, the file must exist.
    #[instrument]
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.is_file() {
            exn::bail!(ErrorKind::Invalid(format!("config file {}", path.display())));
        }
        let defaults = Figment::from(Serialized::defaults(Config::default()));
        let figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => defaults.merge(Toml::file_exact(path)),
            Some("yaml" | "yml") => defaults.merge(Yaml::file_exact(path)),
            Some("json") => defaults.merge(Json::file_exact(path)),
            _ => exn::bail!(ErrorKind::Invalid(format!("config file format {}", path.display()))),
        };
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        debug!(sources = config.sources.len(), "loaded configuration");
        Ok(config)
    }

    /// Reject values that would only fail later, mid-ingestion.
    pub fn validate(&self) -> Result<()> {
        if self.solver.url.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("solver.url".to_string()));
        }
        if self.solver.max_timeout_ms == 0 {
            exn::bail!(ErrorKind::Invalid("solver.max_timeout_ms".to_string()));
        }
        if !self.rate_limit.is_valid() {
            exn::bail!(ErrorKind::Invalid("rate_limit".to_string()));
        }
        for (name, source) in &self.sources {
            if source.base_url.trim().is_empty() {
                exn::bail!(ErrorKind::Invalid(format!("sources.{name}.base_url")));
            }
        }
        Ok(())
    }

    /// A fresh limiter; every source needs its own.
    pub fn limiter(&self) -> RateLimiter {
        RateLimiter::new(self.rate_limit)
    }

    pub fn proxy_client(&self) -> Result<ProxyClient> {
        let client = ProxyClient::new(&self.solver.url, &self.solver.version)
            .or_raise(|| ErrorKind::Invalid("solver.url".to_string()))?
            .with_max_timeout(Duration::from_millis(self.solver.max_timeout_ms));
        Ok(match &self.solver.proxy {
            Some(proxy) => client.with_proxy(proxy),
            None => client,
        })
    }

    pub fn direct_client(&self) -> Result<DirectClient> {
        DirectClient::new(Duration::from_millis(self.http.timeout_ms)).or_raise(|| ErrorKind::Invalid("http".to_string()))
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join(DATABASE_FILE)),
        }
    }

    /// Build every configured source, each paced by its own limiter that
    /// stops when `token` is cancelled.
    pub fn registry(&self, direct: FetchHandle, solver: FetchHandle, token: &CancellationToken) -> Result<SourceRegistry> {
        let mut registry = SourceRegistry::new();
        for (name, source) in &self.sources {
            let fetch = if source.uses_solver() { solver.clone() } else { direct.clone() };
            let limiter = self.limiter().with_cancellation(token.clone());
            let invalid = || ErrorKind::Invalid(format!("sources.{name}"));
            let provider: Arc<dyn SourceProvider> = match source.kind {
                SourceKind::Forum => {
                    Arc::new(ForumSource::new(name, &source.base_url, &source.layout, fetch, limiter).or_raise(invalid)?)
                },
                SourceKind::Next => {
                    let mut next = NextSource::new(name, &source.base_url, fetch, limiter).or_raise(invalid)?;
                    if let Some(build_id) = &source.build_id {
                        next = next.with_build_id(build_id);
                    }
                    if let Some(api_key) = &source.api_key {
                        next = next.with_api_key(api_key);
                    }
                    Arc::new(next)
                },
            };
            registry.register(provider);
        }
        Ok(registry)
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", APPLICATION).ok_or_raise(|| ErrorKind::NoProjectDirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;
    use tome_fetch::MockFetch;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.rate_limit, RateLimits::default());
        assert_eq!(config.solver.url, "http://localhost:8191");
    }

    #[rstest]
    #[case::toml("tome.toml", "[solver]\nurl = \"http://solver:8191\"\n\n[rate_limit]\nlimit = [2, 2]\nmax_retries = 5\n\n[sources.site]\nbase_url = \"https://site.com\"\n")]
    #[case::yaml("tome.yaml", "solver:\n  url: http://solver:8191\nrate_limit:\n  limit: [2, 2]\n  max_retries: 5\nsources:\n  site:\n    base_url: https://site.com\n")]
    #[case::json("tome.json", r#"{"solver": {"url": "http://solver:8191"}, "rate_limit": {"limit": [2, 2], "max_retries": 5}, "sources": {"site": {"base_url": "https://site.com"}}}"#)]
    fn loads_explicit_files(#[case] name: &str, #[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.create_file(name, contents)?;
            let config = Config::load_from(Path::new(name)).unwrap();
            assert_eq!(config.solver.url, "http://solver:8191");
            // Unset keys keep their defaults.
            assert_eq!(config.solver.version, "v1");
            assert_eq!(config.rate_limit.limit, (2, 2));
            assert_eq!(config.rate_limit.max_retries, 5);
            assert_eq!(config.rate_limit.backoff, RateLimits::default().backoff);
            let site = &config.sources["site"];
            assert_eq!(site.kind, SourceKind::Forum);
            assert!(site.uses_solver());
            assert_eq!(site.layout, ForumLayout::default());
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_files() {
        Jail::expect_with(|jail| {
            jail.create_file("tome.toml", "[solver]\nurl = \"http://file:8191\"\nmax_timeout_ms = 1000\n")?;
            jail.set_env("TOME_SOLVER__URL", "http://env:8191");
            jail.set_env("TOME_DATABASE__PATH", "/var/lib/tome/db.sqlite");
            let config = Config::load_from(Path::new("tome.toml")).unwrap();
            assert_eq!(config.solver.url, "http://env:8191");
            assert_eq!(config.solver.max_timeout_ms, 1000);
            assert_eq!(config.database_path().unwrap(), PathBuf::from("/var/lib/tome/db.sqlite"));
            Ok(())
        });
    }

    #[rstest]
    #[case::inverted_limits("[rate_limit]\nlimit = [10, 5]\n", "rate_limit")]
    #[case::inverted_duration("[rate_limit]\nduration = [30, 10]\n", "rate_limit")]
    #[case::empty_solver("[solver]\nurl = \"  \"\n", "solver.url")]
    #[case::source_without_url("[sources.site]\nkind = \"next\"\n", "sources.site.base_url")]
    fn rejects_invalid_values(#[case] contents: &str, #[case] key: &str) {
        Jail::expect_with(|jail| {
            jail.create_file("tome.toml", contents)?;
            let error = Config::load_from(Path::new("tome.toml")).unwrap_err();
            assert_eq!(&*error, &ErrorKind::Invalid(key.to_string()));
            Ok(())
        });
    }

    #[test]
    fn missing_or_unknown_files_are_rejected() {
        Jail::expect_with(|jail| {
            assert!(Config::load_from(Path::new("missing.toml")).is_err());
            jail.create_file("tome.ini", "x = 1")?;
            let error = Config::load_from(Path::new("tome.ini")).unwrap_err();
            assert!(matches!(&*error, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn builds_clients_and_sources() {
        let mut config = Config::default();
        config.solver.url = "http://solver:8191/".to_string();
        config.solver.max_timeout_ms = 5_000;
        assert_eq!(config.proxy_client().unwrap().endpoint().as_str(), "http://solver:8191/v1");
        config.sources.insert(
            "forum".to_string(),
            SourceConfig { base_url: "https://forum.site".to_string(), ..Default::default() },
        );
        config.sources.insert(
            "next".to_string(),
            SourceConfig {
                kind: SourceKind::Next,
                base_url: "https://novels.site".to_string(),
                build_id: Some("b1".to_string()),
                ..Default::default()
            },
        );
        assert!(!config.sources["next"].uses_solver());
        let fetch: FetchHandle = Arc::new(MockFetch::default());
        let registry = config.registry(fetch.clone(), fetch, &CancellationToken::new()).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["forum", "next"]);
        assert_eq!(registry.resolve("https://novels.site/novel").unwrap().name(), "next");
    }

    #[test]
    fn invalid_layouts_fail_to_build() {
        let mut config = Config::default();
        let layout = ForumLayout { content: "div[".to_string(), ..Default::default() };
        config.sources.insert(
            "forum".to_string(),
            SourceConfig { base_url: "https://forum.site".to_string(), layout, ..Default::default() },
        );
        let fetch: FetchHandle = Arc::new(MockFetch::default());
        let error = config.registry(fetch.clone(), fetch, &CancellationToken::new()).err().unwrap();
        assert_eq!(&*error, &ErrorKind::Invalid("sources.forum".to_string()));
    }
}
