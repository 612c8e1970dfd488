use chrono::{DateTime, Utc};

/// One What If article, persisted as a row keyed by number.
///
/// The offline flag is only ever set after the article's HTML file and all
/// discoverable illustrations have been attempted; see `fetch::ArticleFetcher`.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub number: u32,
    pub title: String,
    pub thumbnail: String,
    pub favorite: bool,
    pub read: bool,
    pub offline: bool,
}

impl Article {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            title: String::new(),
            thumbnail: String::new(),
            favorite: false,
            read: false,
            offline: false,
        }
    }
}

/// A comic as shown in the overview grid. Consumed read-only by the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct Comic {
    pub number: u32,
    pub title: String,
    pub url: String,
}

/// An article row together with when it was last opened.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub article: Article,
    pub last_read: DateTime<Utc>,
}

/// Output of the document rewriter: the transformed HTML plus the extracted
/// reference fragments, in footnote order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RewrittenDocument {
    pub html: String,
    pub refs: Vec<String>,
}

/// A resolved grid thumbnail. Dimensions come from the image header without
/// decoding pixels; `has_color` is a bounded sample over the decoded pixels
/// used to decide whether invert theming should leave the cell undimmed.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub dimensions: Option<(u32, u32)>,
    pub bytes: Vec<u8>,
    pub has_color: bool,
}

/// Posted by the thumbnail loader to the UI thread, once per cell,
/// on success or failure alike.
#[derive(Debug)]
pub struct ThumbnailEvent {
    pub number: u32,
    pub result: Result<Thumbnail, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Overview,
    Article,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_new() {
        let article = Article::new(50);
        assert_eq!(article.number, 50);
        assert_eq!(article.title, "");
        assert_eq!(article.thumbnail, "");
        assert!(!article.favorite);
        assert!(!article.read);
        assert!(!article.offline);
    }

    #[test]
    fn test_screen_default() {
        assert_eq!(Screen::default(), Screen::Overview);
    }

    #[test]
    fn test_rewritten_document_default() {
        let doc = RewrittenDocument::default();
        assert!(doc.html.is_empty());
        assert!(doc.refs.is_empty());
    }

    #[test]
    fn test_thumbnail_event_failure_carries_number() {
        let event = ThumbnailEvent {
            number: 42,
            result: Err("connection refused".to_string()),
        };
        assert_eq!(event.number, 42);
        assert!(event.result.is_err());
    }
}
