use crate::document::ARTICLE_BASE_URL;
use crate::models::Article;
use crate::store::Store;
use eyre::Result;
use log::{debug, warn};
use scraper::{Html, Selector};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

const WHAT_IF_DIR: &str = "what if";
const OVERVIEW_DIR: &str = "overview";

/// Downloads What If articles into the offline store.
///
/// One article is fetched per call; its illustrations are downloaded one at
/// a time, in document order. There is no retry and no cancellation of an
/// in-flight download.
pub struct ArticleFetcher {
    client: reqwest::blocking::Client,
    base_url: String,
    offline_root: PathBuf,
}

impl ArticleFetcher {
    pub fn new(offline_root: PathBuf) -> Self {
        Self::with_base_url(ARTICLE_BASE_URL, offline_root)
    }

    pub fn with_base_url(base_url: impl Into<String>, offline_root: PathBuf) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.into(),
            offline_root,
        }
    }

    pub fn offline_root(&self) -> &Path {
        &self.offline_root
    }

    pub fn article_dir(&self, number: u32) -> PathBuf {
        self.offline_root.join(WHAT_IF_DIR).join(number.to_string())
    }

    pub fn html_path(&self, number: u32) -> PathBuf {
        self.article_dir(number).join(format!("{number}.html"))
    }

    pub fn thumbnail_path(&self, number: u32) -> PathBuf {
        self.offline_root
            .join(WHAT_IF_DIR)
            .join(OVERVIEW_DIR)
            .join(format!("{number}.png"))
    }

    /// The offline flag is true exactly when this holds.
    pub fn has_offline_files(&self, number: u32) -> bool {
        self.html_path(number).exists()
    }

    /// Make the article available offline and return its number.
    ///
    /// Idempotent: when the HTML file already exists this returns without
    /// touching the network. A failure fetching the page itself propagates
    /// with nothing written; per-image failures are logged and skipped, and
    /// do not prevent the offline flag from being set.
    pub fn download_article(&self, store: &Store, article: &Article) -> Result<u32> {
        if self.has_offline_files(article.number) {
            debug!("already has files for article {}", article.number);
            return Ok(article.number);
        }

        let url = format!("{}/{}", self.base_url, article.number);
        let body = self
            .client
            .get(&url)
            .send()?
            .error_for_status()?
            .text()?;
        let doc = Html::parse_document(&body);

        let dir = self.article_dir(article.number);
        fs::create_dir_all(&dir)?;
        fs::write(self.html_path(article.number), doc.root_element().html())?;

        let illustration = Selector::parse(".illustration").unwrap();
        let mut count = 1;
        for element in doc.select(&illustration) {
            let src = match element.value().attr("src") {
                Some(src) if !src.is_empty() => src,
                _ => continue,
            };
            let image_url = if src.starts_with("http") {
                src.to_string()
            } else {
                format!("{}{}", self.base_url, src)
            };
            match self.fetch_bytes(&image_url) {
                Ok(bytes) => {
                    fs::write(dir.join(format!("{count}.png")), &bytes)?;
                    count += 1;
                }
                Err(err) => {
                    warn!(
                        "article {}: failed to cache illustration {}: {}",
                        article.number, image_url, err
                    );
                }
            }
        }

        self.download_thumbnail(article);

        let mut row = article.clone();
        if row.title.is_empty() {
            if let Some(title) = page_title(&doc) {
                row.title = title;
            }
        }
        store.insert_article_if_missing(&row)?;
        store.set_offline(article.number, true)?;

        debug!("successfully downloaded article {}", article.number);
        Ok(article.number)
    }

    fn download_thumbnail(&self, article: &Article) {
        if article.thumbnail.is_empty() {
            debug!("article {} has no thumbnail url", article.number);
            return;
        }
        let dir = self.offline_root.join(WHAT_IF_DIR).join(OVERVIEW_DIR);
        if let Err(err) = fs::create_dir_all(&dir) {
            warn!("article {}: {}", article.number, err);
            return;
        }
        match self.fetch_bytes(&article.thumbnail) {
            Ok(bytes) => {
                if let Err(err) = fs::write(self.thumbnail_path(article.number), &bytes) {
                    warn!("article {}: {}", article.number, err);
                }
            }
            Err(err) => {
                warn!(
                    "article {}: failed to cache thumbnail {}: {}",
                    article.number, article.thumbnail, err
                );
            }
        }
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self
            .client
            .get(url)
            .send()?
            .error_for_status()?
            .bytes()?
            .to_vec())
    }
}

fn page_title(doc: &Html) -> Option<String> {
    let title_sel = Selector::parse("title").unwrap();
    let title = doc
        .select(&title_sel)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    if title.is_empty() { None } else { Some(title) }
}

/// Run a download on a background thread; the single receiver gets the
/// result once. Errors are not retried.
pub fn spawn_download(
    fetcher: ArticleFetcher,
    db_path: PathBuf,
    article: Article,
) -> mpsc::Receiver<Result<u32>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = Store::open_at(&db_path)
            .and_then(|store| fetcher.download_article(&store, &article));
        let _ = tx.send(result);
    });
    rx
}
