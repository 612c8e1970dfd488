use crate::models::RewrittenDocument;
use crate::settings::Theme;
use eyre::Result;
use scraper::{ElementRef, Html, Selector};
use std::fmt::Write as _;
use std::path::PathBuf;

pub const ARTICLE_BASE_URL: &str = "https://what-if.xkcd.com";
const MATHJAX_CDN: &str = "https://cdn.mathjax.org/mathjax/latest/MathJax.js";
const MATHJAX_LOCAL: &str = "MathJax.js";

#[derive(Debug, Clone)]
pub struct RewriteOptions {
    pub number: u32,
    pub offline: bool,
    pub offline_root: PathBuf,
    pub theme: Theme,
}

impl RewriteOptions {
    fn illustration_src(&self, src: &str, index: usize) -> String {
        if self.offline {
            format!(
                "file://{}/what if/{}/{}.png",
                self.offline_root.display(),
                self.number,
                index
            )
        } else if src.starts_with("http") {
            src.to_string()
        } else {
            format!("{ARTICLE_BASE_URL}{src}")
        }
    }

    fn script_src(&self) -> &'static str {
        if self.offline { MATHJAX_LOCAL } else { MATHJAX_CDN }
    }
}

/// Transform a scraped article page for local rendering.
///
/// scraper's DOM is read-only, so the document is rewritten at the string
/// level: the parse is serialized once, and every edit replaces an element's
/// own serialization inside that string. Both sides come from the same
/// serializer, so the substrings line up.
pub fn rewrite_document(html_src: &str, opts: &RewriteOptions) -> Result<RewrittenDocument> {
    let doc = Html::parse_document(html_src);
    let mut out = doc.root_element().html();

    let refs = extract_refs(&doc, &mut out);
    rewrite_illustrations(&doc, &mut out, opts);
    strip_chrome(&doc, &mut out);
    inject_stylesheet(&doc, &mut out, opts.theme);
    rewrite_script(&doc, &mut out, opts);

    Ok(RewrittenDocument { html: out, refs })
}

/// Pull every `.ref` footnote body out into an ordered list and leave behind
/// a marker whose click handler indexes into that list.
fn extract_refs(doc: &Html, out: &mut String) -> Vec<String> {
    let ref_sel = Selector::parse(".ref").unwrap();
    let refnum_sel = Selector::parse(".refnum").unwrap();
    let refbody_sel = Selector::parse(".refbody").unwrap();

    let mut refs = Vec::new();
    for element in doc.select(&ref_sel) {
        let body = match element.select(&refbody_sel).next() {
            Some(body) => body.inner_html(),
            None => continue,
        };
        let index = refs.len();
        refs.push(body);

        let mut inner = String::new();
        for child in element.children() {
            if let Some(child_el) = ElementRef::wrap(child) {
                if child_el.value().classes().any(|c| c == "refbody") {
                    continue;
                }
                if child_el.value().classes().any(|c| c == "refnum") {
                    let onclick = format!("ref.performClick(\"{index}\")");
                    let _ = write!(
                        inner,
                        "{}{}</{}>",
                        start_tag(child_el, &[("onclick", &onclick)]),
                        child_el.inner_html(),
                        child_el.value().name()
                    );
                } else {
                    inner.push_str(&child_el.html());
                }
            } else if let Some(text) = child.value().as_text() {
                inner.push_str(&escape_text(text));
            }
        }

        let rebuilt = format!(
            "{}{}</{}>",
            start_tag(element, &[]),
            inner,
            element.value().name()
        );
        *out = out.replacen(&element.html(), &rebuilt, 1);
    }
    refs
}

/// Renumber every illustration by encounter order, pointing at either the
/// remote site or the offline store.
fn rewrite_illustrations(doc: &Html, out: &mut String, opts: &RewriteOptions) {
    let illustration = Selector::parse(".illustration").unwrap();

    let mut count = 1;
    for element in doc.select(&illustration) {
        let src = element.value().attr("src").unwrap_or("");
        let new_src = opts.illustration_src(src, count);
        let rebuilt = start_tag(
            element,
            &[
                ("src", &new_src),
                ("onclick", "img.performClick(title);"),
            ],
        );
        *out = out.replacen(&element.html(), &rebuilt, 1);
        count += 1;
    }
}

/// Remove header, footer, navigation, and the page title.
fn strip_chrome(doc: &Html, out: &mut String) {
    for css in ["#header-wrapper", "nav", "#footer-wrapper", "h1"] {
        let selector = Selector::parse(css).unwrap();
        for element in doc.select(&selector) {
            *out = out.replacen(&element.html(), "", 1);
        }
    }
}

/// Drop every stylesheet link and inject the one matching the theme.
fn inject_stylesheet(doc: &Html, out: &mut String, theme: Theme) {
    let link_sel = Selector::parse("head link").unwrap();
    for element in doc.select(&link_sel) {
        *out = out.replacen(&element.html(), "", 1);
    }

    let link = format!(
        "<link rel=\"stylesheet\" type=\"text/css\" href=\"{}\">",
        theme.stylesheet()
    );
    if out.contains("</head>") {
        *out = out.replacen("</head>", &format!("{link}</head>"), 1);
    } else {
        out.insert_str(0, &link);
    }
}

/// Point the first script at the CDN or the bundled copy.
fn rewrite_script(doc: &Html, out: &mut String, opts: &RewriteOptions) {
    let script_sel = Selector::parse("script[src]").unwrap();
    if let Some(element) = doc.select(&script_sel).next() {
        let rebuilt = format!(
            "{}{}</script>",
            start_tag(element, &[("src", opts.script_src())]),
            element.inner_html()
        );
        *out = out.replacen(&element.html(), &rebuilt, 1);
    }
}

/// Serialize an element's start tag, overriding or appending the given
/// attributes. Void elements like `img` have no end tag, so for those this
/// is the whole serialization.
fn start_tag(element: ElementRef, overrides: &[(&str, &str)]) -> String {
    let value = element.value();
    let mut tag = format!("<{}", value.name());
    let mut written = Vec::new();
    for (name, attr_value) in value.attrs() {
        let attr_value = overrides
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
            .unwrap_or(attr_value);
        written.push(name);
        let _ = write!(tag, " {}=\"{}\"", name, escape_attr(attr_value));
    }
    for (name, attr_value) in overrides {
        if !written.contains(name) {
            let _ = write!(tag, " {}=\"{}\"", name, escape_attr(attr_value));
        }
    }
    tag.push('>');
    tag
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
