//! Placing fetched chapters into volumes using the source's table of contents.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tome_extract::canonical_hash;
use tome_source::SourceVolume;

// "Chapter 12", "chapter 12.5: The Road"...
static CHAPTER_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bchapter\s+(\d+(?:\.\d+)?)").unwrap());

/// The volume a chapter belongs to, and where in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placement {
    pub volume: i64,
    pub title: String,
    pub covers: Vec<String>,
    /// 1-based position within the volume, when the table of contents lists it.
    pub position: Option<usize>,
}
impl Placement {
    pub fn untitled(volume: i64) -> Self {
        Self {
            volume,
            title: volume_title(volume, ""),
            covers: Vec::new(),
            position: None,
        }
    }

    /// Same volume, unknown position.
    fn inherited(&self) -> Self {
        Self { position: None, ..self.clone() }
    }
}

#[derive(Debug, Default)]
pub(crate) struct TableOfContents {
    /// Keyed by the canonical hash of the chapter URL.
    entries: HashMap<String, Placement>,
    first: Option<String>,
}
impl TableOfContents {
    pub fn new(volumes: &[SourceVolume]) -> Self {
        let mut entries = HashMap::new();
        for volume in volumes {
            for (index, chapter) in volume.chapters.iter().enumerate() {
                entries.entry(canonical_hash(&chapter.url)).or_insert_with(|| Placement {
                    volume: volume.ordinal,
                    title: volume_title(volume.ordinal, &volume.title),
                    covers: volume.covers.clone(),
                    position: Some(index + 1),
                });
            }
        }
        let first = volumes.iter().flat_map(|volume| volume.chapters.first()).next().map(|chapter| chapter.url.clone());
        Self { entries, first }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The first chapter listed, in reading order.
    pub fn first_chapter(&self) -> Option<&str> {
        self.first.as_deref()
    }

    /// Chapters missing from the table of contents stay in the previous
    /// chapter's volume, or the first one.
    pub fn place(&self, url_hash: &str, previous: Option<&Placement>) -> Placement {
        match (self.entries.get(url_hash), previous) {
            (Some(placement), _) => placement.clone(),
            (None, Some(previous)) => previous.inherited(),
            (None, None) => Placement::untitled(1),
        }
    }
}

fn volume_title(ordinal: i64, title: &str) -> String {
    match title.trim() {
        "" => format!("Volume {ordinal}"),
        title => title.to_string(),
    }
}

/// The number in a "Chapter N" or "Chapter N.M" title.
pub(crate) fn chapter_number(title: &str) -> Option<f64> {
    CHAPTER_NUMBER_REGEX.captures(title)?.get(1)?.as_str().parse().ok()
}
