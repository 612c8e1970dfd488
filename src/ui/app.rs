use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use eyre::Result;
use log::{debug, warn};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::config::Config;
use crate::document::{ARTICLE_BASE_URL, RewriteOptions};
use crate::fetch::{ArticleFetcher, spawn_download};
use crate::models::{Article, RewrittenDocument, Screen, ThumbnailEvent};
use crate::store::Store;
use crate::ui::article::{ArticleRequest, ArticleScreen, spawn_load};
use crate::ui::grid::StaggeredGrid;
use crate::ui::loader::ThumbnailLoader;

/// The postponed entry transition: primed with the remembered last-viewed
/// number, released at most once by the first matching completion event,
/// loaded or failed alike.
#[derive(Debug, Default)]
pub struct PendingTransition(Option<u32>);

impl PendingTransition {
    pub fn postpone(number: Option<u32>) -> Self {
        Self(number)
    }

    pub fn is_pending(&self) -> bool {
        self.0.is_some()
    }

    /// True exactly once, for the first event matching the primed number.
    pub fn release_on(&mut self, number: u32) -> bool {
        if self.0 == Some(number) {
            self.0 = None;
            true
        } else {
            false
        }
    }
}

pub struct App {
    config: Config,
    store: Store,
    db_path: PathBuf,
    grid: StaggeredGrid,
    screen: Screen,
    article: Option<ArticleScreen>,
    pending_article: Option<(u32, String)>,
    article_rx: Option<mpsc::Receiver<Result<RewrittenDocument>>>,
    thumb_rx: Option<mpsc::Receiver<ThumbnailEvent>>,
    fetch_rx: Option<mpsc::Receiver<Result<u32>>>,
    transition: PendingTransition,
    show_help: bool,
    message: Option<String>,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config, initial_article: Option<u32>) -> Result<Self> {
        let store = Store::new()?;
        let db_path = Store::default_path()?;
        Self::with_store(config, store, db_path, initial_article)
    }

    fn with_store(
        config: Config,
        store: Store,
        db_path: PathBuf,
        initial_article: Option<u32>,
    ) -> Result<Self> {
        let comics = store.comics()?;
        let grid = StaggeredGrid::new(&comics);

        let last_viewed = store.last_viewed()?;
        if let Some(number) = last_viewed {
            debug!("postponing entry transition for comic {number}");
        }

        let thumb_rx = if comics.is_empty() {
            None
        } else {
            let loader = ThumbnailLoader::new(
                config.cache_dir()?,
                config.offline_root()?,
                config.legacy_store_dir()?,
                config.settings.offline_mode,
            );
            Some(loader.spawn(comics))
        };

        let mut app = Self {
            config,
            store,
            db_path,
            grid,
            screen: Screen::Overview,
            article: None,
            pending_article: None,
            article_rx: None,
            thumb_rx,
            fetch_rx: None,
            transition: PendingTransition::postpone(last_viewed),
            show_help: false,
            message: None,
            should_quit: false,
        };

        if let Some(number) = initial_article {
            app.open_article(number)?;
        }

        Ok(app)
    }

    /// Run the main application loop
    pub fn run(&mut self) -> Result<()> {
        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
        if self.config.settings.mouse_support {
            crossterm::execute!(io::stdout(), crossterm::event::EnableMouseCapture)?;
        }

        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        terminal.hide_cursor()?;

        loop {
            if self.should_quit {
                break;
            }

            self.drain_channels()?;

            terminal.draw(|frame| self.draw(frame))?;

            if !crossterm::event::poll(Duration::from_millis(150))? {
                continue;
            }
            if let Ok(event) = crossterm::event::read() {
                match event {
                    Event::Key(key) => {
                        if key.kind == KeyEventKind::Press {
                            self.handle_key_event(key)?;
                        }
                    }
                    Event::Resize(_, _) => {
                        if let Some(article) = &mut self.article {
                            article.rewrap(text_width())?;
                        }
                    }
                    _ => {}
                }
            }
        }

        terminal.clear()?;
        terminal.show_cursor()?;
        if self.config.settings.mouse_support {
            crossterm::execute!(io::stdout(), crossterm::event::DisableMouseCapture)?;
        }
        crossterm::execute!(io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
        crossterm::terminal::disable_raw_mode()?;

        Ok(())
    }

    fn drain_channels(&mut self) -> Result<()> {
        // Thumbnail completions from the loader worker.
        loop {
            let drained = match &self.thumb_rx {
                Some(rx) => match rx.try_recv() {
                    Ok(event) => Some(Some(event)),
                    Err(mpsc::TryRecvError::Empty) => None,
                    Err(mpsc::TryRecvError::Disconnected) => Some(None),
                },
                None => None,
            };
            match drained {
                Some(Some(event)) => self.handle_thumbnail_event(event),
                Some(None) => {
                    self.thumb_rx = None;
                    break;
                }
                None => break,
            }
        }

        // A finished article download.
        let fetched = match &self.fetch_rx {
            Some(rx) => match rx.try_recv() {
                Ok(result) => Some(Some(result)),
                Err(mpsc::TryRecvError::Empty) => None,
                Err(mpsc::TryRecvError::Disconnected) => Some(None),
            },
            None => None,
        };
        if let Some(outcome) = fetched {
            self.fetch_rx = None;
            match outcome {
                Some(Ok(number)) => {
                    self.message = Some(format!("article {number} available offline"));
                }
                Some(Err(err)) => {
                    self.message = Some(format!("download failed: {err}"));
                }
                None => {}
            }
        }

        // A loaded article document.
        let loaded = match &self.article_rx {
            Some(rx) => match rx.try_recv() {
                Ok(result) => Some(Some(result)),
                Err(mpsc::TryRecvError::Empty) => None,
                Err(mpsc::TryRecvError::Disconnected) => Some(None),
            },
            None => None,
        };
        if let Some(outcome) = loaded {
            self.article_rx = None;
            match outcome {
                Some(Ok(doc)) => {
                    if let Some((number, title)) = self.pending_article.take() {
                        self.store.insert_article_if_missing(&Article::new(number))?;
                        self.store.set_read(number)?;
                        self.article =
                            Some(ArticleScreen::new(number, title, doc, text_width())?);
                        self.screen = Screen::Article;
                    }
                }
                Some(Err(err)) => {
                    self.pending_article = None;
                    self.message = Some(format!("could not load article: {err}"));
                }
                None => {
                    self.pending_article = None;
                }
            }
        }

        Ok(())
    }

    /// One event per cell; the transition check runs before the result is
    /// inspected so a failed load releases it just the same.
    fn handle_thumbnail_event(&mut self, event: ThumbnailEvent) {
        if self.transition.release_on(event.number) {
            debug!("releasing postponed entry transition for comic {}", event.number);
        }
        match event.result {
            Ok(thumbnail) => self.grid.set_thumbnail(event.number, &thumbnail),
            Err(err) => {
                debug!("thumbnail for comic {} unavailable: {err}", event.number);
                self.grid.set_failed(event.number);
            }
        }
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        if self.show_help {
            self.show_help = false;
            return Ok(());
        }
        self.message = None;

        match self.screen {
            Screen::Overview => self.handle_overview_key(key),
            Screen::Article => self.handle_article_key(key),
        }
    }

    fn handle_overview_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.grid.select_down(),
            KeyCode::Char('k') | KeyCode::Up => self.grid.select_up(),
            KeyCode::Char('h') | KeyCode::Left => self.grid.select_prev(),
            KeyCode::Char('l') | KeyCode::Right => self.grid.select_next(),
            KeyCode::Enter => self.open_selected()?,
            KeyCode::Char('f') => self.fetch_selected()?,
            KeyCode::Char('o') => self.toggle_offline_mode()?,
            KeyCode::Char('?') => self.show_help = true,
            _ => {}
        }
        Ok(())
    }

    fn handle_article_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(article) = &mut self.article else {
            self.screen = Screen::Overview;
            return Ok(());
        };

        match key.code {
            KeyCode::Esc => {
                if article.has_open_ref() {
                    article.close_ref();
                } else {
                    self.screen = Screen::Overview;
                }
            }
            KeyCode::Char('q') => self.screen = Screen::Overview,
            KeyCode::Char('j') | KeyCode::Down => article.scroll_down(1),
            KeyCode::Char('k') | KeyCode::Up => article.scroll_up(1),
            KeyCode::Char(' ') | KeyCode::PageDown => article.scroll_down(20),
            KeyCode::Char('b') | KeyCode::PageUp => article.scroll_up(20),
            KeyCode::Char('m') => {
                let number = article.number;
                if let Some(row) = self.store.get_article(number)? {
                    self.store.set_favorite(number, !row.favorite)?;
                    self.message = Some(if row.favorite {
                        format!("article {number} unfavorited")
                    } else {
                        format!("article {number} favorited")
                    });
                }
            }
            KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
                let index = c as usize - '1' as usize;
                article.open_ref(index, text_width().saturating_sub(10))?;
            }
            _ => {}
        }
        Ok(())
    }

    fn open_selected(&mut self) -> Result<()> {
        let Some(number) = self.grid.selected_number() else {
            return Ok(());
        };
        self.store.set_last_viewed(number)?;
        self.open_article(number)
    }

    fn open_article(&mut self, number: u32) -> Result<()> {
        if self.article_rx.is_some() {
            return Ok(());
        }
        let title = self
            .store
            .get_article(number)?
            .map(|a| a.title)
            .unwrap_or_default();
        let offline_root = self.config.offline_root()?;
        let fetcher = ArticleFetcher::new(offline_root.clone());
        let offline = self.config.settings.offline_mode;

        if offline && !fetcher.has_offline_files(number) {
            self.message = Some(format!("article {number} is not available offline"));
            return Ok(());
        }

        let request = ArticleRequest {
            number,
            title: title.clone(),
            offline,
            html_path: fetcher.html_path(number),
            base_url: ARTICLE_BASE_URL.to_string(),
            options: RewriteOptions {
                number,
                offline,
                offline_root,
                theme: self.config.settings.theme(),
            },
        };
        self.pending_article = Some((number, title));
        self.article_rx = Some(spawn_load(request));
        Ok(())
    }

    fn fetch_selected(&mut self) -> Result<()> {
        if self.fetch_rx.is_some() {
            self.message = Some("a download is already running".to_string());
            return Ok(());
        }
        let Some(number) = self.grid.selected_number() else {
            return Ok(());
        };
        let article = self
            .store
            .get_article(number)?
            .unwrap_or_else(|| Article::new(number));
        let fetcher = ArticleFetcher::new(self.config.offline_root()?);
        self.fetch_rx = Some(spawn_download(fetcher, self.db_path.clone(), article));
        self.message = Some(format!("downloading article {number}…"));
        Ok(())
    }

    /// Flipping the switch restarts thumbnail resolution for every cell.
    fn toggle_offline_mode(&mut self) -> Result<()> {
        self.config.settings.offline_mode = !self.config.settings.offline_mode;
        if let Err(err) = self.config.save() {
            warn!("could not persist configuration: {err}");
        }

        let comics = self.store.comics()?;
        self.grid = StaggeredGrid::new(&comics);
        self.thumb_rx = if comics.is_empty() {
            None
        } else {
            let loader = ThumbnailLoader::new(
                self.config.cache_dir()?,
                self.config.offline_root()?,
                self.config.legacy_store_dir()?,
                self.config.settings.offline_mode,
            );
            Some(loader.spawn(comics))
        };
        self.message = Some(if self.config.settings.offline_mode {
            "offline mode on".to_string()
        } else {
            "offline mode off".to_string()
        });
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let [main, status] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(area);

        match self.screen {
            Screen::Overview => {
                let dim = self.config.settings.invert_colors;
                self.grid.render(frame, main, dim);
            }
            Screen::Article => {
                if let Some(article) = &self.article {
                    article.render(frame, main);
                }
            }
        }

        self.draw_status(frame, status);

        if self.show_help {
            self.draw_help(frame, area);
        }
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let mode = if self.config.settings.offline_mode {
            Span::styled("OFFLINE", Style::default().fg(Color::Yellow))
        } else {
            Span::styled("ONLINE", Style::default().fg(Color::Green))
        };
        let mut spans = vec![mode, Span::raw("  ")];
        if self.article_rx.is_some() {
            spans.push(Span::raw("loading article…  "));
        }
        if self.fetch_rx.is_some() {
            spans.push(Span::raw("downloading…  "));
        }
        if let Some(message) = &self.message {
            spans.push(Span::raw(message.clone()));
        } else if self.screen == Screen::Overview {
            spans.push(Span::styled(
                "Enter: read  f: save offline  o: offline mode  ?: help  q: quit",
                Style::default().fg(Color::DarkGray),
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_help(&self, frame: &mut Frame, area: Rect) {
        let popup = Rect::new(
            area.x + area.width / 4,
            area.y + area.height / 4,
            area.width / 2,
            (area.height / 2).max(12),
        );
        frame.render_widget(Clear, popup);

        let lines = vec![
            Line::from(Span::styled("Overview", Style::default().add_modifier(Modifier::BOLD))),
            Line::from("  h j k l / arrows   move"),
            Line::from("  Enter              open article"),
            Line::from("  f                  save article offline"),
            Line::from("  o                  toggle offline mode"),
            Line::from("  q                  quit"),
            Line::from(""),
            Line::from(Span::styled("Article", Style::default().add_modifier(Modifier::BOLD))),
            Line::from("  j k / arrows       scroll"),
            Line::from("  space / b          page down / up"),
            Line::from("  1-9                open reference"),
            Line::from("  m                  toggle favorite"),
            Line::from("  Esc / q            back"),
        ];
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Help"));
        frame.render_widget(paragraph, popup);
    }
}

fn text_width() -> usize {
    match crossterm::terminal::size() {
        Ok((w, _)) => (w as usize).saturating_sub(4).max(20),
        Err(_) => 80,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_releases_exactly_once() {
        let mut transition = PendingTransition::postpone(Some(50));
        assert!(transition.is_pending());

        assert!(!transition.release_on(49));
        assert!(transition.is_pending());

        assert!(transition.release_on(50));
        assert!(!transition.is_pending());

        // A second event for the same cell must not release again.
        assert!(!transition.release_on(50));
    }

    #[test]
    fn test_transition_without_last_viewed_never_fires() {
        let mut transition = PendingTransition::postpone(None);
        assert!(!transition.is_pending());
        for number in 1..=100 {
            assert!(!transition.release_on(number));
        }
    }

    #[test]
    fn test_transition_release_is_result_agnostic() {
        // The caller checks the transition before looking at the result, so
        // the same release path covers both outcomes; this pins the
        // number-matching half of that contract.
        let mut ok_path = PendingTransition::postpone(Some(7));
        let mut err_path = PendingTransition::postpone(Some(7));
        assert!(ok_path.release_on(7));
        assert!(err_path.release_on(7));
    }
}
