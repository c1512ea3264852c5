use crate::consts;
use scraper::{ElementRef, Html};

/// Paragraphs shorter than this don't vote for their ancestors.
const MIN_PARAGRAPH_LENGTH: usize = 25;
const TAGS_NEVER_CANDIDATES: [&str; 4] = ["nav", "header", "footer", "aside"];

/// Highest-scoring container, with its link-density-adjusted score.
pub(super) fn best_candidate(document: &Html) -> Option<(ElementRef<'_>, f64)> {
    // Document order, so that ties resolve deterministically.
    let mut candidates: Vec<(ElementRef<'_>, f64)> = Vec::new();

    for paragraph in document.select(&consts::SCORABLE_SELECTOR) {
        if is_unlikely(paragraph) {
            continue;
        }
        let text = paragraph.text().collect::<String>();
        let length = text.trim().chars().count();
        if length < MIN_PARAGRAPH_LENGTH {
            continue;
        }
        let score = 1.0 + text.matches(',').count() as f64 + (length / 100).min(3) as f64;
        let Some(parent) = parent_element(paragraph) else {
            continue;
        };
        vote(&mut candidates, parent, score);
        if let Some(grandparent) = parent_element(parent) {
            vote(&mut candidates, grandparent, score / 2.0);
        }
    }

    candidates
        .into_iter()
        .map(|(element, score)| (element, score * (1.0 - link_density(element))))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

fn vote<'a>(candidates: &mut Vec<(ElementRef<'a>, f64)>, element: ElementRef<'a>, score: f64) {
    match candidates.iter_mut().find(|(seen, _)| *seen == element) {
        Some((_, total)) => *total += score,
        None => candidates.push((element, initial_score(element) + score)),
    }
}

pub(super) fn text_length(element: ElementRef<'_>) -> usize {
    element.text().map(|text| text.trim().chars().count()).sum()
}

fn parent_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.parent().and_then(ElementRef::wrap)
}

fn hints(element: ElementRef<'_>) -> String {
    let value = element.value();
    format!("{} {}", value.attr("class").unwrap_or_default(), value.id().unwrap_or_default())
}

fn initial_score(element: ElementRef<'_>) -> f64 {
    let tag = match element.value().name() {
        "div" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    };
    let hints = hints(element);
    let mut weight = 0.0;
    if consts::NEGATIVE_HINT_REGEX.is_match(&hints) {
        weight -= 25.0;
    }
    if consts::POSITIVE_HINT_REGEX.is_match(&hints) {
        weight += 25.0;
    }
    tag + weight
}

/// Whether the element sits inside page chrome (navigation, comments, menus).
fn is_unlikely(element: ElementRef<'_>) -> bool {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .any(|ancestor| {
            if TAGS_NEVER_CANDIDATES.contains(&ancestor.value().name()) {
                return true;
            }
            let hints = hints(ancestor);
            consts::UNLIKELY_REGEX.is_match(&hints) && !consts::MAYBE_CANDIDATE_REGEX.is_match(&hints)
        })
}

fn link_density(element: ElementRef<'_>) -> f64 {
    let total = text_length(element);
    if total == 0 {
        return 0.0;
    }
    let linked: usize = element.select(&consts::ANCHOR_SELECTOR).map(text_length).sum();
    linked as f64 / total as f64
}
