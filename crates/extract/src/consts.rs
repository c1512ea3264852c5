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

// Title candidates, in order of preference.
selector!(OG_TITLE_SELECTOR, "meta[property='og:title']");
selector!(H1_SELECTOR, "h1");
selector!(TITLE_SELECTOR, "title");
// Elements whose text contributes to the score of their ancestors.
selector!(SCORABLE_SELECTOR, "p, pre, td, blockquote");
selector!(ANCHOR_SELECTOR, "a");

// Class/ID hints used when scoring candidate containers.
regex!(
    POSITIVE_HINT_REGEX,
    r"(?i)article|body|content|entry|chapter|main|page|post|text|blog|story|reader"
);
regex!(
    NEGATIVE_HINT_REGEX,
    r"(?i)hidden|banner|combx|comment|contact|foot|footer|footnote|meta|outbrain|promo|related|scroll|share|shoutbox|sidebar|skyscraper|sponsor|shopping|tags|widget|social|advert"
);
regex!(
    UNLIKELY_REGEX,
    r"(?i)-ad-|ai2html|banner|breadcrumbs|combx|comment|community|cover-wrap|disqus|extra|footer|gdpr|header|legends|menu|related|remark|replies|rss|shoutbox|sidebar|skyscraper|social|sponsor|supplemental|ad-break|agegate|pagination|pager|popup|yom-remote|navigation|sharedaddy"
);
regex!(MAYBE_CANDIDATE_REGEX, r"(?i)and|article|body|column|content|main|shadow|entry|chapter");

// Sanitizer anchor rules.
regex!(
    DONATION_HREF_REGEX,
    r"(?i)^(?:https?:)?//(?:[a-z0-9-]+\.)*(?:patreon\.com|ko-fi\.com|paypal\.(?:com|me)|strawpoll\.(?:me|com))(?:[/:?#]|$)"
);
// Anchor text of chapter navigation: "Next", "<< Previous", "next chapter »"...
regex!(
    NAVIGATION_TEXT_REGEX,
    r"(?i)^(?:(?:(?:<<|«|‹|<|←)\s*)?(?:next|prev(?:ious)?)(?:\s+chapter)?(?:\s*(?:>>|»|›|>|→))?|table\s+of\s+contents)$"
);
// Markdown image syntax with a root- or protocol-relative destination.
regex!(
    MARKDOWN_IMAGE_REGEX,
    r#"!\[(?P<alt>[^\]]*)\]\(\s*(?P<src>/[^)\s]*)(?P<title>\s+"[^"]*")?\s*\)"#
);
