use crate::document::{RewriteOptions, rewrite_document};
use crate::models::RewrittenDocument;
use eyre::Result;
use html2text::config;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use regex::Regex;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

/// Everything a background thread needs to produce a rendered article.
#[derive(Debug, Clone)]
pub struct ArticleRequest {
    pub number: u32,
    pub title: String,
    pub offline: bool,
    pub html_path: PathBuf,
    pub base_url: String,
    pub options: RewriteOptions,
}

/// Fetch (or read) and rewrite an article off the UI thread. The single
/// receiver gets the result once; errors are not retried.
pub fn spawn_load(request: ArticleRequest) -> mpsc::Receiver<Result<RewrittenDocument>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = (|| -> Result<RewrittenDocument> {
            let html = if request.offline {
                std::fs::read_to_string(&request.html_path)?
            } else {
                let url = format!("{}/{}", request.base_url, request.number);
                reqwest::blocking::get(url)?.error_for_status()?.text()?
            };
            rewrite_document(&html, &request.options)
        })();
        let _ = tx.send(result);
    });
    rx
}

/// The article reading screen: the rewritten document rendered as wrapped
/// text, with the extracted references reachable through an indexed popup.
pub struct ArticleScreen {
    pub number: u32,
    pub title: String,
    doc: RewrittenDocument,
    lines: Vec<String>,
    scroll: usize,
    open_ref: Option<(usize, Vec<String>)>,
    marker_re: Regex,
}

impl ArticleScreen {
    pub fn new(number: u32, title: String, doc: RewrittenDocument, width: usize) -> Result<Self> {
        let lines = render_text(&doc.html, width)?;
        Ok(Self {
            number,
            title,
            doc,
            lines,
            scroll: 0,
            open_ref: None,
            marker_re: Regex::new(r"\[\d+\]").unwrap(),
        })
    }

    pub fn rewrap(&mut self, width: usize) -> Result<()> {
        self.lines = render_text(&self.doc.html, width)?;
        self.scroll = self.scroll.min(self.max_scroll());
        Ok(())
    }

    pub fn refs_len(&self) -> usize {
        self.doc.refs.len()
    }

    pub fn has_open_ref(&self) -> bool {
        self.open_ref.is_some()
    }

    /// Open reference `index` (0-based, matching the rewritten markers'
    /// click handlers) rendered at popup width.
    pub fn open_ref(&mut self, index: usize, width: usize) -> Result<()> {
        if let Some(fragment) = self.doc.refs.get(index) {
            let lines = render_text(fragment, width.max(20))?;
            self.open_ref = Some((index, lines));
        }
        Ok(())
    }

    pub fn close_ref(&mut self) {
        self.open_ref = None;
    }

    fn max_scroll(&self) -> usize {
        self.lines.len().saturating_sub(1)
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll = (self.scroll + rows).min(self.max_scroll());
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll = self.scroll.saturating_sub(rows);
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let title = if self.title.is_empty() {
            format!("What If #{}", self.number)
        } else {
            format!("What If #{}: {}", self.number, self.title)
        };
        let block = Block::default().borders(Borders::ALL).title(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let end = (self.scroll + inner.height as usize).min(self.lines.len());
        let visible: Vec<Line> = self.lines[self.scroll..end]
            .iter()
            .map(|line| self.highlight_markers(line))
            .collect();
        frame.render_widget(Paragraph::new(visible), inner);

        if let Some((index, lines)) = &self.open_ref {
            self.render_ref_popup(frame, area, *index, lines);
        }
    }

    /// Footnote markers like `[2]` get their own style so they read as
    /// something actionable.
    fn highlight_markers(&self, line: &str) -> Line<'_> {
        let mut spans = Vec::new();
        let mut last = 0;
        for m in self.marker_re.find_iter(line) {
            if m.start() > last {
                spans.push(Span::raw(line[last..m.start()].to_string()));
            }
            spans.push(Span::styled(
                m.as_str().to_string(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ));
            last = m.end();
        }
        if last < line.len() {
            spans.push(Span::raw(line[last..].to_string()));
        }
        Line::from(spans)
    }

    fn render_ref_popup(&self, frame: &mut Frame, area: Rect, index: usize, lines: &[String]) {
        let popup = Rect::new(
            area.x + area.width / 6,
            area.y + area.height / 4,
            area.width * 2 / 3,
            (lines.len() as u16 + 2).min(area.height / 2).max(3),
        );
        frame.render_widget(Clear, popup);

        let text: Vec<Line> = lines.iter().map(|l| Line::from(l.clone())).collect();
        let paragraph = Paragraph::new(text)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Reference [{}]", index + 1)),
            );
        frame.render_widget(paragraph, popup);
    }
}

fn render_text(html: &str, width: usize) -> Result<Vec<String>> {
    let text = config::plain()
        .link_footnotes(false)
        .string_from_read(html.as_bytes(), width.max(20))?;
    Ok(text.lines().map(|s| s.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Theme;

    fn sample_doc() -> RewrittenDocument {
        RewrittenDocument {
            html: "<p>Prose with a marker [1] inline.</p><p>Second paragraph.</p>".to_string(),
            refs: vec![
                "Assuming a vacuum.".to_string(),
                "See <em>the appendix</em>.".to_string(),
            ],
        }
    }

    #[test]
    fn test_screen_renders_lines() {
        let screen = ArticleScreen::new(1, "Test".to_string(), sample_doc(), 80).unwrap();
        assert!(!screen.lines.is_empty());
        assert!(screen.lines.iter().any(|l| l.contains("marker [1] inline")));
    }

    #[test]
    fn test_ref_popup_renders_fragment() {
        let mut screen = ArticleScreen::new(1, "Test".to_string(), sample_doc(), 80).unwrap();
        assert_eq!(screen.refs_len(), 2);
        assert!(!screen.has_open_ref());

        screen.open_ref(1, 60).unwrap();
        assert!(screen.has_open_ref());
        let (index, lines) = screen.open_ref.as_ref().unwrap();
        assert_eq!(*index, 1);
        assert!(lines.iter().any(|l| l.contains("the appendix")));

        screen.close_ref();
        assert!(!screen.has_open_ref());
    }

    #[test]
    fn test_open_ref_out_of_range_is_ignored() {
        let mut screen = ArticleScreen::new(1, "Test".to_string(), sample_doc(), 80).unwrap();
        screen.open_ref(5, 60).unwrap();
        assert!(!screen.has_open_ref());
    }

    #[test]
    fn test_scroll_clamps() {
        let mut screen = ArticleScreen::new(1, "Test".to_string(), sample_doc(), 80).unwrap();
        screen.scroll_up(10);
        assert_eq!(screen.scroll, 0);
        screen.scroll_down(1000);
        assert_eq!(screen.scroll, screen.max_scroll());
    }

    #[test]
    fn test_rewrap_keeps_scroll_in_bounds() {
        let mut screen = ArticleScreen::new(1, "Test".to_string(), sample_doc(), 24).unwrap();
        screen.scroll_down(1000);
        screen.rewrap(200).unwrap();
        assert!(screen.scroll <= screen.max_scroll());
    }

    #[test]
    fn test_marker_highlighting_splits_spans() {
        let screen = ArticleScreen::new(1, "Test".to_string(), sample_doc(), 80).unwrap();
        let line = screen.highlight_markers("before [2] after");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "[2]");
    }

    #[test]
    fn test_request_clone() {
        let request = ArticleRequest {
            number: 50,
            title: String::new(),
            offline: true,
            html_path: PathBuf::from("/tmp/50.html"),
            base_url: "https://what-if.xkcd.com".to_string(),
            options: RewriteOptions {
                number: 50,
                offline: true,
                offline_root: PathBuf::from("/tmp"),
                theme: Theme::Standard,
            },
        };
        let clone = request.clone();
        assert_eq!(clone.number, 50);
    }
}
