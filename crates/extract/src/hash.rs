use url::Url;

/// Normalize an identifier so that trivially different spellings of the same
/// resource compare equal.
///
/// URLs lose their fragment and any trailing slash on the path (scheme and
/// host are already lowercased by parsing). Anything that isn't an absolute
/// URL is treated as free text: whitespace is collapsed and it is lowercased.
pub fn canonicalize(identifier: &str) -> String {
    let identifier = identifier.trim();
    match Url::parse(identifier) {
        Ok(mut url) if url.has_host() || url.scheme() == "file" => {
            url.set_fragment(None);
            let path = url.path().to_string();
            if path.len() > 1 && path.ends_with('/') {
                url.set_path(path.trim_end_matches('/'));
            }
            url.to_string()
        },
        _ => identifier
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase(),
    }
}

/// Hex-encoded BLAKE3 hash of the canonical form of an identifier.
///
/// This is the identity key for series, chapters and pages: the same
/// canonical URL or title always hashes identically.
pub fn canonical_hash(identifier: &str) -> String {
    blake3::hash(canonicalize(identifier).as_bytes()).to_string()
}
