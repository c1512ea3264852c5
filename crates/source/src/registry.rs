use crate::SourceProvider;
use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Routes series URLs to the adapter for their site.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn SourceProvider>>,
}
impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source. Earlier registrations win when several match a URL.
    pub fn register(&mut self, source: Arc<dyn SourceProvider>) -> &mut Self {
        self.sources.push(source);
        self
    }

    pub fn with(mut self, source: Arc<dyn SourceProvider>) -> Self {
        self.register(source);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceProvider>> {
        self.sources.iter().find(|source| source.name() == name).cloned()
    }

    /// The source handling `url`.
    pub fn resolve(&self, url: &str) -> Result<Arc<dyn SourceProvider>> {
        let parsed = Url::parse(url).ok().ok_or_raise(|| ErrorKind::InvalidUrl(url.to_string()))?;
        let source = self
            .sources
            .iter()
            .find(|source| source.matches(&parsed))
            .cloned()
            .ok_or_raise(|| ErrorKind::UnknownSource(url.to_string()))?;
        debug!(url, source = source.name(), "resolved source");
        Ok(source)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|source| source.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ForumLayout, ForumSource, NextSource};
    use tome_fetch::{FetchHandle, MockFetch, RateLimiter, RateLimits};

    fn registry() -> SourceRegistry {
        let fetch: FetchHandle = Arc::new(MockFetch::default());
        let limiter = || RateLimiter::new(RateLimits::default());
        SourceRegistry::new()
            .with(Arc::new(
                ForumSource::new("forum", "https://forum.site", &ForumLayout::default(), fetch.clone(), limiter())
                    .unwrap(),
            ))
            .with(Arc::new(NextSource::new("next", "https://novels.site", fetch, limiter()).unwrap()))
    }

    #[test]
    fn routes_by_host() {
        let registry = registry();
        assert_eq!(registry.resolve("https://forum.site/novel").unwrap().name(), "forum");
        assert_eq!(registry.resolve("https://www.novels.site/novel").unwrap().name(), "next");
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["forum", "next"]);
        assert!(registry.get("next").is_some());
        assert!(registry.get("other").is_none());
    }

    #[test]
    fn unknown_hosts_are_errors() {
        let registry = registry();
        let error = registry.resolve("https://elsewhere.site/novel").err().unwrap();
        assert_eq!(&*error, &ErrorKind::UnknownSource("https://elsewhere.site/novel".to_string()));
        let error = registry.resolve("not a url").err().unwrap();
        assert_eq!(&*error, &ErrorKind::InvalidUrl("not a url".to_string()));
    }
}
