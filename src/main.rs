use rxkcd::{
    cli::Cli,
    config::Config,
    fetch::ArticleFetcher,
    models::Article,
    store::Store,
    ui::app::App,
};

use clap::Parser;
use eyre::Result;
use log::info;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path.clone())?,
        None => match Config::new() {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Warning: Could not load configuration: {}", err);
                eprintln!("Starting with default settings");
                Config::with_settings(Default::default())?
            }
        },
    };
    if cli.offline {
        config.settings.offline_mode = true;
    }

    if !cli.fetch.is_empty() {
        return fetch_articles(&config, &cli.fetch);
    }
    if cli.history {
        return print_history();
    }

    let mut app = App::new(config, cli.article)?;
    app.run()
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn fetch_articles(config: &Config, numbers: &[u32]) -> Result<()> {
    let store = Store::new()?;
    let fetcher = ArticleFetcher::new(config.offline_root()?);

    for &number in numbers {
        let article = store
            .get_article(number)?
            .unwrap_or_else(|| Article::new(number));
        match fetcher.download_article(&store, &article) {
            Ok(number) => {
                info!("article {number} available offline");
                println!("article {number} saved to {}", fetcher.article_dir(number).display());
            }
            Err(err) => {
                eprintln!("failed to fetch article {number}: {err}");
            }
        }
    }
    Ok(())
}

fn print_history() -> Result<()> {
    let store = Store::new()?;
    let history = store.history()?;
    if history.is_empty() {
        println!("No articles read yet");
        return Ok(());
    }
    for entry in history {
        println!(
            "{:>5}  {}  {}",
            entry.article.number,
            entry.last_read.format("%Y-%m-%d %H:%M"),
            entry.article.title,
        );
    }
    Ok(())
}
