#[macro_use]
mod tree_path;

mod backends;
mod candidate;
mod config;
mod error;
mod http;
mod logging;
mod query;
mod ranking;
mod task_queue;
mod text;
mod youtube;
mod ytmusic;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use serde::Serialize;

use crate::{
    backends::{Fallback, SearchBackend, search_with},
    candidate::{Candidate, FeedInfo, WatchPageResolver, format_duration},
    config::Config,
    http::{HttpTransport, ReqwestTransport},
    logging::setup_logging,
    query::SearchArgs,
    youtube::{YouTubeScraper, YouTubeSearch},
    ytmusic::{ContinuationToken, ExpansionDescriptor, YtMusic},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "TRACK_FINDER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Console log level (default: warn)
    #[arg(long, default_value = "warn", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "TRACK_FINDER_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum BackendChoice {
    /// YouTube Music
    Ytmusic,
    /// Plain YouTube keyword search
    Youtube,
    /// YouTube Music first, YouTube if it finds nothing
    All,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search for the best matching sources of a track
    Search {
        /// Title of the track
        track: Option<String>,

        /// Artist of the track (repeat for several)
        #[arg(short, long = "artist")]
        artists: Vec<String>,

        /// Album of the track
        #[arg(long)]
        album: Option<String>,

        /// Expected duration in milliseconds
        #[arg(short, long)]
        duration: Option<f64>,

        #[arg(short, long, value_enum, default_value = "all")]
        backend: BackendChoice,

        /// Only print the best N candidates
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print candidates as JSON
        #[arg(long)]
        json: bool,

        /// Also resolve the feed of each printed candidate
        #[arg(long)]
        feeds: bool,

        /// Re-derive the YouTube Music session before searching
        #[arg(long)]
        refresh_config: bool,
    },
    /// Print the raw YouTube Music shelves of a query as JSON
    Shelves {
        /// Free-text search query
        query: Option<String>,

        /// Fetch the next page of a shelf (a `continuation` object printed earlier)
        #[arg(long = "continue", value_name = "JSON", conflicts_with_all = ["query", "expand"])]
        continuation: Option<String>,

        /// Fetch the full listing of a shelf (an `expansion` object printed earlier)
        #[arg(long, value_name = "JSON", conflicts_with = "query")]
        expand: Option<String>,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[derive(Serialize)]
struct CandidateOutput<'a> {
    #[serde(flatten)]
    candidate: &'a Candidate,
    #[serde(skip_serializing_if = "Option::is_none")]
    feed: Option<FeedInfo>,
}

// Command line values are always text. Durations only come from `--duration`.
fn search_args(
    track: Option<String>,
    mut artists: Vec<String>,
    album: Option<String>,
    duration: Option<f64>,
) -> SearchArgs {
    let mut args = match artists.len() {
        0 => SearchArgs::new(),
        1 => SearchArgs::new().artist(artists.remove(0)),
        _ => SearchArgs::new().artists(artists),
    };
    if let Some(track) = track {
        args = args.track(track);
    }
    if let Some(album) = album {
        args = args.album(album);
    }
    if let Some(duration) = duration {
        args = args.duration(duration);
    }
    args
}

async fn print_candidates(candidates: &[Candidate], json: bool, feeds: bool) -> Result<()> {
    let mut outputs = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let feed = if feeds {
            let feed = candidate.get_feeds().await.wrap_err_with(|| {
                format!("Failed to resolve feeds for {}", candidate.source_id)
            })?;
            Some(feed)
        } else {
            None
        };
        outputs.push(CandidateOutput { candidate, feed });
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outputs).wrap_err("Failed to serialize candidates")?
        );
        return Ok(());
    }

    if outputs.is_empty() {
        println!("No matches found");
    }
    for CandidateOutput { candidate, feed } in &outputs {
        let duration = if candidate.duration.is_empty() {
            format_duration(candidate.duration_ms)
        } else {
            candidate.duration.clone()
        };
        println!(
            "{:>6.2}  {:<8} {:>8}  {} - {}  [{}]",
            candidate.accuracy,
            candidate.kind.to_string(),
            duration,
            candidate.title,
            candidate.author,
            candidate.source_id
        );
        if let Some(feed) = feed {
            println!("        {}", feed.url);
        }
    }
    Ok(())
}

fn build_transport(config: &Config) -> Result<Arc<dyn HttpTransport>> {
    let transport = ReqwestTransport::new(&config.http.user_agent, config.http.timeout)
        .wrap_err("Failed to build HTTP client")?;
    Ok(Arc::new(transport))
}

fn build_ytmusic(config: &Config, transport: Arc<dyn HttpTransport>) -> YtMusic {
    YtMusic::new(
        transport,
        config.ytmusic.base_url.as_str(),
        config.ytmusic.locale(),
        Arc::new(WatchPageResolver::new(config.ytmusic.base_url.as_str())),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    log::debug!("Track finder starting");
    let config =
        Config::load(args.config.as_deref()).wrap_err("Failed to load track-finder config")?;

    match args.command {
        Commands::Search {
            track,
            artists,
            album,
            duration,
            backend,
            limit,
            json,
            feeds,
            refresh_config,
        } => {
            let args = search_args(track, artists, album, duration);
            log::debug!("Search arguments: {:?}", args);

            let transport = build_transport(&config)?;

            let ytmusic = Arc::new(build_ytmusic(&config, transport.clone()));
            let youtube = Arc::new(YouTubeSearch::new(
                Arc::new(YouTubeScraper::new(
                    transport,
                    config.youtube.base_url.as_str(),
                )),
                config.youtube.settings(),
                Arc::new(WatchPageResolver::new(config.youtube.base_url.as_str())),
            ));

            if refresh_config && backend != BackendChoice::Youtube {
                // Nothing is fetched for arguments that cannot make a query.
                args.clone().normalize()?;
                ytmusic
                    .force_refresh_config()
                    .await
                    .wrap_err("Failed to refresh YouTube Music config")?;
            }

            let ytmusic: Arc<dyn SearchBackend> = ytmusic;
            let youtube: Arc<dyn SearchBackend> = youtube;
            let backends = match backend {
                BackendChoice::Ytmusic => vec![ytmusic],
                BackendChoice::Youtube => vec![youtube],
                BackendChoice::All => vec![ytmusic, youtube],
            };
            let mut candidates = search_with(&Fallback::new(backends), args)
                .await
                .wrap_err("Search failed")?;

            if let Some(limit) = limit {
                candidates.truncate(limit);
            }
            print_candidates(&candidates, json, feeds).await?;
        }
        Commands::Shelves {
            query,
            continuation,
            expand,
        } => {
            let ytmusic = build_ytmusic(&config, build_transport(&config)?);
            let output = if let Some(token) = continuation {
                let token: ContinuationToken =
                    serde_json::from_str(&token).wrap_err("Invalid continuation token")?;
                serde_json::to_string_pretty(&ytmusic.continue_shelf(&token).await?)
            } else if let Some(descriptor) = expand {
                let descriptor: ExpansionDescriptor =
                    serde_json::from_str(&descriptor).wrap_err("Invalid expansion descriptor")?;
                serde_json::to_string_pretty(&ytmusic.expand_shelf(&descriptor).await?)
            } else {
                let query =
                    query.ok_or_else(|| eyre!("Pass a query, --continue or --expand"))?;
                serde_json::to_string_pretty(&ytmusic.search_shelves(&query).await?)
            };
            println!("{}", output.wrap_err("Failed to serialize shelves")?);
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                let path = match args.config {
                    Some(path) => path,
                    None => Config::config_path()
                        .ok_or_else(|| eyre!("No default config path found"))?,
                };
                log::debug!("Creating default config at {}", path.display());
                Config::create_default(&path)?;
                println!("Created {}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_cli_parses_search() {
        let args = Args::try_parse_from([
            "track-finder",
            "search",
            "One More Time",
            "--artist",
            "Daft Punk",
            "--duration",
            "320000",
            "--backend",
            "ytmusic",
        ])
        .unwrap();
        let Commands::Search {
            track,
            artists,
            backend,
            ..
        } = args.command
        else {
            panic!("expected search command");
        };
        assert_eq!(track.as_deref(), Some("One More Time"));
        assert_eq!(artists, vec!["Daft Punk"]);
        assert_eq!(backend, BackendChoice::Ytmusic);
    }

    #[test]
    fn test_shelves_query_conflicts_with_continuation() {
        let result = Args::try_parse_from([
            "track-finder",
            "shelves",
            "daft punk",
            "--continue",
            "{}",
        ]);
        assert!(result.is_err());

        let args = Args::try_parse_from(["track-finder", "shelves", "--expand", "{}"]).unwrap();
        assert!(matches!(
            args.command,
            Commands::Shelves { expand: Some(_), .. }
        ));
    }

    #[test]
    fn test_single_artist_without_track_becomes_track() {
        let query = search_args(None, vec!["Around the World".to_string()], None, None)
            .normalize()
            .unwrap();
        assert_eq!(query.track, "Around the World");
        assert!(query.artists.is_empty());
    }

    #[test]
    fn test_numeric_title_stays_a_title() {
        let query = search_args(
            Some("1999".to_string()),
            vec!["Prince".to_string()],
            Some("1989".to_string()),
            None,
        )
        .normalize()
        .unwrap();
        assert_eq!(query.track, "1999");
        assert_eq!(query.artists, vec!["Prince"]);
        assert_eq!(query.album, "1989");
        assert_eq!(query.duration_ms, None);
    }

    #[test]
    fn test_duration_flag_and_missing_track() {
        let args = search_args(None, Vec::new(), Some("Discovery".to_string()), Some(320_000.0));
        assert_eq!(args.duration, Some(320_000.0));
        assert_eq!(args.normalize(), Err(ValidationError::MissingTrack));
    }
}
