use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

selector!(TITLE_SELECTOR, "title");
selector!(ANCHOR_SELECTOR, "a[href]");
selector!(IMAGE_SELECTOR, "img");
selector!(NEXT_DATA_SELECTOR, "script#__NEXT_DATA__");

// "Volume 3", "Vol. 3", "Book 3"...
regex!(VOLUME_NUMBER_REGEX, r"(?i)\b(?:volume|vol\.?|book)\s*(\d+)");
// Navigation anchors without a usable class or rel attribute.
regex!(NEXT_TEXT_REGEX, r"(?i)^next(?:\s+chapter)?\s*(?:>>|»|→|>)?$");
