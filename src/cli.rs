use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "rxkcd",
    version,
    about = "Terminal reader for xkcd and the What If article series, with an offline store.",
    long_about = None
)]
pub struct Cli {
    /// Download articles into the offline store and exit
    #[clap(short, long, value_name = "NUMBER", num_args = 1..)]
    pub fetch: Vec<u32>,

    /// Print reading history
    #[clap(short = 'r', long)]
    pub history: bool,

    /// Read from the offline store instead of the network
    #[clap(short, long)]
    pub offline: bool,

    /// Use a specific configuration file
    #[clap(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Article number to open
    #[clap(name = "ARTICLE")]
    pub article: Option<u32>,
}
