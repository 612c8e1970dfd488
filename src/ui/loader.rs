use crate::models::{Comic, Thumbnail, ThumbnailEvent};
use eyre::Result;
use log::debug;
use sha1::{Digest, Sha1};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

/// Directory under the offline root holding comic images, named `<number>.png`.
pub const COMIC_DIR: &str = "easy xkcd";

/// Resolves grid thumbnails off the UI thread.
///
/// Online mode goes through a sha1-keyed write-through cache; offline mode
/// reads the offline store and falls back to the legacy internal store
/// (bare-number files) before giving up.
#[derive(Debug, Clone)]
pub struct ThumbnailLoader {
    cache_dir: PathBuf,
    offline_root: PathBuf,
    legacy_dir: PathBuf,
    offline: bool,
}

impl ThumbnailLoader {
    pub fn new(cache_dir: PathBuf, offline_root: PathBuf, legacy_dir: PathBuf, offline: bool) -> Self {
        Self {
            cache_dir,
            offline_root,
            legacy_dir,
            offline,
        }
    }

    pub fn cache_path(&self, url: &str) -> PathBuf {
        let mut hasher = Sha1::new();
        hasher.update(url.as_bytes());
        let hash = hex::encode(hasher.finalize());
        self.cache_dir.join(format!("{}.png", &hash[..10]))
    }

    pub fn resolve(&self, comic: &Comic) -> Result<Thumbnail> {
        if self.offline {
            self.resolve_offline(comic.number)
        } else {
            self.resolve_online(comic)
        }
    }

    fn resolve_online(&self, comic: &Comic) -> Result<Thumbnail> {
        let path = self.cache_path(&comic.url);
        let bytes = if path.exists() {
            fs::read(&path)?
        } else {
            let bytes = reqwest::blocking::get(comic.url.as_str())?
                .error_for_status()?
                .bytes()?
                .to_vec();
            fs::create_dir_all(&self.cache_dir)?;
            fs::write(&path, &bytes)?;
            bytes
        };
        Ok(thumbnail_from_bytes(bytes))
    }

    fn resolve_offline(&self, number: u32) -> Result<Thumbnail> {
        let file = self
            .offline_root
            .join(COMIC_DIR)
            .join(format!("{number}.png"));
        match self.load_local(&file) {
            Ok(thumbnail) => Ok(thumbnail),
            Err(err) => {
                debug!("loading {} from offline store failed: {err}", file.display());
                self.load_local(&self.legacy_dir.join(number.to_string()))
            }
        }
    }

    fn load_local(&self, path: &Path) -> Result<Thumbnail> {
        // Header-only read for placeholder sizing; pixels stay undecoded
        // until the bytes are loaded below.
        let dimensions = image::image_dimensions(path).ok();
        let bytes = fs::read(path)?;
        let has_color = bytes_contain_color(&bytes);
        Ok(Thumbnail {
            dimensions: dimensions.or_else(|| dimensions_from_bytes(&bytes)),
            bytes,
            has_color,
        })
    }

    /// Resolve every comic on one worker thread, in order, posting one event
    /// per cell. Dropping the receiver stops the worker.
    pub fn spawn(&self, comics: Vec<Comic>) -> mpsc::Receiver<ThumbnailEvent> {
        let (tx, rx) = mpsc::channel();
        let loader = self.clone();
        thread::spawn(move || {
            for comic in comics {
                let result = loader.resolve(&comic).map_err(|err| err.to_string());
                if tx
                    .send(ThumbnailEvent {
                        number: comic.number,
                        result,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });
        rx
    }
}

fn thumbnail_from_bytes(bytes: Vec<u8>) -> Thumbnail {
    let dimensions = dimensions_from_bytes(&bytes);
    let has_color = bytes_contain_color(&bytes);
    Thumbnail {
        dimensions,
        bytes,
        has_color,
    }
}

fn dimensions_from_bytes(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Bounded sample over the decoded pixels: true when any sampled pixel has
/// unequal channels. Most xkcd strips are grayscale; the odd color panel is
/// what invert theming needs to leave alone.
pub fn bytes_contain_color(bytes: &[u8]) -> bool {
    let Ok(img) = image::load_from_memory(bytes) else {
        return false;
    };
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let total = width as usize * height as usize;
    let step = (total / 4096).max(1);
    rgb.pixels()
        .step_by(step)
        .any(|p| p[0] != p[1] || p[1] != p[2])
}
