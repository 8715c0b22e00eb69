// src/extract/locator.rs

//! Field locator: finds the nodes carrying a field's label.

use crate::extract::document::{NodeFilter, TextDocument};
use crate::extract::keywords::{Field, KeywordTable};

/// A node whose text contains one of the field's labels.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'k, N> {
    pub node: N,
    /// Label that matched, as written in the keyword table
    pub keyword: &'k str,
}

/// Locate candidate label nodes for `field`.
///
/// A label only matches as a whole word, so `Condition` skips "Air
/// Conditioning". Nodes that start with a label are preferred over nodes that
/// merely mention one: the first label (in table order) found at the start of
/// a node wins, and only when no node starts with any label does the first
/// label found anywhere win. Nodes come back in document order; the vector is
/// empty when nothing matches.
pub fn locate<'a, 'k, D: TextDocument>(
    document: &'a D,
    table: &'k KeywordTable,
    field: Field,
    filter: &NodeFilter<'_>,
) -> Vec<Candidate<'k, D::Node<'a>>> {
    let found: Vec<(&'k str, Vec<(D::Node<'a>, bool)>)> = table
        .keywords(field)
        .iter()
        .map(|keyword| {
            let nodes = document
                .find_containing(keyword, filter)
                .into_iter()
                .filter_map(|node| {
                    let text = document.node_text(node);
                    find_word(&text, keyword).map(|at| (node, at == 0))
                })
                .collect();
            (keyword.as_str(), nodes)
        })
        .collect();

    let label_first = found.iter().find_map(|(keyword, nodes)| {
        let leading: Vec<_> = nodes
            .iter()
            .filter(|(_, leads)| *leads)
            .map(|(node, _)| Candidate {
                node: *node,
                keyword: *keyword,
            })
            .collect();
        (!leading.is_empty()).then_some(leading)
    });
    if let Some(candidates) = label_first {
        return candidates;
    }

    found
        .into_iter()
        .find(|(_, nodes)| !nodes.is_empty())
        .map(|(keyword, nodes)| {
            nodes
                .into_iter()
                .map(|(node, _)| Candidate { node, keyword })
                .collect()
        })
        .unwrap_or_default()
}

/// Byte offset of `word` in `text` where it is not part of a longer word.
///
/// ASCII case-insensitive. A boundary is only required on a side where the
/// word itself ends in a letter or digit, so `Stock #` still matches `Stock #12`.
pub fn find_word(text: &str, word: &str) -> Option<usize> {
    let word = word.trim();
    if word.is_empty() {
        return None;
    }
    let haystack = text.trim_start().to_ascii_lowercase();
    let offset = text.len() - text.trim_start().len();
    let needle = word.to_ascii_lowercase();
    let open_start = needle.starts_with(|c: char| c.is_alphanumeric());
    let open_end = needle.ends_with(|c: char| c.is_alphanumeric());

    haystack
        .match_indices(&needle)
        .map(|(at, _)| at)
        .find(|&at| {
            let before = !open_start || !haystack[..at].ends_with(|c: char| c.is_alphanumeric());
            let after = !open_end
                || !haystack[at + needle.len()..].starts_with(|c: char| c.is_alphanumeric());
            before && after
        })
        .map(|at| at + offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::document::HtmlPage;

    fn page(body: &str) -> HtmlPage {
        HtmlPage::parse(&format!("<html><body>{body}</body></html>"), "https://d.test/v/1")
    }

    #[test]
    fn test_first_matching_keyword_wins() {
        let page = page(
            "<p>Odometer: 40,000</p><p>Mileage: 12 mi</p><p>Mileage (city): 30 mpg</p>",
        );
        let table = KeywordTable::builtin();
        let found = locate(&page, &table, Field::Mileage, &NodeFilter::default());

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].keyword, "Mileage");
        assert_eq!(page.node_text(found[0].node), "Mileage: 12 mi");
        assert_eq!(page.node_text(found[1].node), "Mileage (city): 30 mpg");
    }

    #[test]
    fn test_falls_through_to_later_keywords() {
        let page = page("<p>Odometer: 40,000</p>");
        let table = KeywordTable::builtin();
        let found = locate(&page, &table, Field::Mileage, &NodeFilter::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].keyword, "Odometer");
    }

    #[test]
    fn test_no_match_is_empty() {
        let page = page("<p>Nothing here</p>");
        let table = KeywordTable::builtin();
        assert!(locate(&page, &table, Field::Vin, &NodeFilter::default()).is_empty());
    }

    #[test]
    fn test_label_at_start_beats_earlier_keyword_mid_text() {
        let page = page("<li>Fuel Mileage: 32 MPG</li><p>Odometer: 45,000 mi</p>");
        let table = KeywordTable::builtin();
        let found = locate(&page, &table, Field::Mileage, &NodeFilter::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].keyword, "Odometer");
        assert_eq!(page.node_text(found[0].node), "Odometer: 45,000 mi");
    }

    #[test]
    fn test_mid_text_match_when_no_label_leads() {
        let page = page("<li>Est. Mileage: 5 mi</li>");
        let table = KeywordTable::builtin();
        let found = locate(&page, &table, Field::Mileage, &NodeFilter::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].keyword, "Mileage");
    }

    #[test]
    fn test_labels_match_whole_words_only() {
        let page = page("<li>Air Conditioning</li><li>Statuses unavailable</li>");
        let table = KeywordTable::builtin();
        assert!(locate(&page, &table, Field::Condition, &NodeFilter::default()).is_empty());
        assert!(locate(&page, &table, Field::Availability, &NodeFilter::default()).is_empty());

        let page = self::page("<li>Driving Assist</li><p>VIN: 5YJ3E1EA1KF123456</p>");
        let found = locate(&page, &table, Field::Vin, &NodeFilter::default());
        assert_eq!(found.len(), 1);
        assert_eq!(page.node_text(found[0].node), "VIN: 5YJ3E1EA1KF123456");
    }

    #[test]
    fn test_find_word() {
        assert_eq!(find_word("Mileage: 12 mi", "mileage"), Some(0));
        assert_eq!(find_word("  VIN 123", "VIN"), Some(2));
        assert_eq!(find_word("Fuel Mileage", "Mileage"), Some(5));
        assert_eq!(find_word("Air Conditioning", "Condition"), None);
        assert_eq!(find_word("Stock #A12", "Stock #"), Some(0));
        assert_eq!(find_word("anything", " "), None);
    }

    #[test]
    fn test_tag_filter() {
        let page = page("<span>VIN 1</span><table><tr><td>VIN</td></tr></table>");
        let table = KeywordTable::builtin();
        let found = locate(&page, &table, Field::Vin, &NodeFilter::tag("td"));
        assert_eq!(found.len(), 1);
        assert_eq!(page.node_text(found[0].node), "VIN");
    }
}
