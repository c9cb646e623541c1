//! File-link discovery on the vendor listing page.
//!
//! The page lists one file per `<li>` inside a `<ul>`; anchors anywhere else
//! are navigation. The markup convention lives behind [`DiscoveryRule`] so
//! another portal layout only needs a new rule.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::domain::FileReference;

pub trait DiscoveryRule {
    /// Raw link targets in document order, before URL resolution.
    fn link_targets(&self, document: &Html) -> Vec<String>;
}

/// Anchors nested in list items nested in an unordered list (`ul li a`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ListAnchorRule;

static LIST_ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul li a").expect("list anchor selector"));

impl DiscoveryRule for ListAnchorRule {
    fn link_targets(&self, document: &Html) -> Vec<String> {
        document
            .select(&LIST_ANCHORS)
            .filter_map(|anchor| anchor.value().attr("href"))
            .map(|href| href.trim().to_string())
            .collect()
    }
}

pub fn collect(document_text: &str, base_url: &Url) -> Vec<FileReference> {
    collect_with(&ListAnchorRule, document_text, base_url)
}

/// Malformed targets, non-http(s) schemes and directory links are skipped;
/// duplicates are kept.
pub fn collect_with(
    rule: &dyn DiscoveryRule,
    document_text: &str,
    base_url: &Url,
) -> Vec<FileReference> {
    let document = Html::parse_document(document_text);
    let mut references = Vec::new();

    for target in rule.link_targets(&document) {
        if target.is_empty() {
            continue;
        }
        let resolved = match base_url.join(&target) {
            Ok(url) => url,
            Err(err) => {
                debug!(target = %target, error = %err, "skipping unresolvable link");
                continue;
            }
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            debug!(url = %resolved, "skipping non-http link");
            continue;
        }
        match FileReference::from_url(&resolved) {
            Some(reference) => references.push(reference),
            None => debug!(url = %resolved, "skipping link without a filename"),
        }
    }

    references
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://site/files/").unwrap()
    }

    #[test]
    fn resolves_relative_links_in_list_items() {
        let html = r#"<html><body><ul>
            <li><a href="TB7217_S3_R1.fastq.gz">TB7217_S3_R1.fastq.gz</a></li>
            <li><a href="/other/readme.txt">readme</a></li>
            <li><a href="https://cdn.example/x/TB1_S1.bam">abs</a></li>
        </ul></body></html>"#;

        let refs = collect(html, &base());
        let urls = refs.iter().map(|r| r.source_url.as_str()).collect::<Vec<_>>();
        assert_eq!(
            urls,
            vec![
                "https://site/files/TB7217_S3_R1.fastq.gz",
                "https://site/other/readme.txt",
                "https://cdn.example/x/TB1_S1.bam",
            ]
        );
        assert_eq!(refs[1].filename, "readme.txt");
    }

    #[test]
    fn ignores_anchors_outside_list_items() {
        let html = r#"<a href="top.txt">top</a>
            <ol><li><a href="ordered.txt">o</a></li></ol>
            <ul><li><a href="kept.txt">k</a></li></ul>
            <div><a href="footer.txt">f</a></div>"#;

        let refs = collect(html, &base());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].filename, "kept.txt");
    }

    #[test]
    fn skips_noise_and_keeps_duplicates() {
        let html = r#"<ul>
            <li><a>no href</a></li>
            <li><a href="">empty</a></li>
            <li><a href="mailto:ops@site">mail</a></li>
            <li><a href="subdir/">dir</a></li>
            <li><a href="a.txt">a</a></li>
            <li><a href="a.txt">a again</a></li>
        </ul>"#;

        let refs = collect(html, &base());
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], refs[1]);
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(collect("", &base()).is_empty());
    }

    struct AllAnchors;

    impl DiscoveryRule for AllAnchors {
        fn link_targets(&self, document: &Html) -> Vec<String> {
            let selector = Selector::parse("a").unwrap();
            document
                .select(&selector)
                .filter_map(|a| a.value().attr("href").map(str::to_string))
                .collect()
        }
    }

    #[test]
    fn custom_rule_replaces_markup_convention() {
        let html = r#"<div><a href="loose.txt">x</a></div>"#;
        let refs = collect_with(&AllAnchors, html, &base());
        assert_eq!(refs[0].source_url, "https://site/files/loose.txt");
    }
}
