use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use soundraw_browser::api::SoundrawHttpClient;
use soundraw_browser::app::App;
use soundraw_browser::automation::{Clipboard, OsaScriptRunner};
use soundraw_browser::browser::{BrowserAutomation, Shortcut};
use soundraw_browser::config::{ConfigStore, SoundrawConfig};
use soundraw_browser::domain::{Sample, SearchQuery};
use soundraw_browser::download::HttpFetcher;
use soundraw_browser::error::SoundrawError;
use soundraw_browser::fingerprint::url_hash;
use soundraw_browser::output::{JsonOutput, OutputMode};
use soundraw_browser::player::QuickTimePlayer;
use soundraw_browser::store::Store;
use soundraw_browser::tui;

type HttpApp = App<SoundrawHttpClient, HttpFetcher>;

#[derive(Parser)]
#[command(name = "soundraw")]
#[command(about = "Browse, preview and export Soundraw samples")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Store the API token and base URL")]
    Setup(SetupArgs),
    #[command(about = "Delete the stored credential")]
    Reset,
    #[command(about = "Show the stored credential (token masked)")]
    Config,
    #[command(about = "List available genres")]
    Genres,
    #[command(about = "Search samples")]
    Search(SearchArgs),
    #[command(about = "Copy a sample into the export directory")]
    Export(ExportArgs),
    #[command(about = "Download a sample into the scratch cache for drag and quick look")]
    Prepare(SampleArgs),
    #[command(about = "Loop a sample in QuickTime Player until Enter is pressed")]
    Preview(SampleArgs),
    #[command(about = "Copy a sample's share URL to the clipboard")]
    Share(ShareArgs),
    #[command(about = "Remove files from the scratch cache")]
    ClearCache,
    #[command(about = "Drive a browser through System Events")]
    Browser(BrowserArgs),
}

#[derive(Args)]
struct SetupArgs {
    #[arg(long)]
    token: String,

    #[arg(long)]
    base_url: String,
}

#[derive(Args)]
struct SearchArgs {
    #[arg(long = "genre")]
    genres: Vec<String>,

    #[arg(long, default_value_t = 1)]
    page: u32,

    #[arg(long, default_value_t = soundraw_browser::domain::DEFAULT_PAGE_SIZE)]
    limit: u32,
}

#[derive(Args)]
struct SampleArgs {
    url: String,

    name: String,

    #[arg(long)]
    id: Option<String>,
}

impl SampleArgs {
    fn into_sample(self) -> Sample {
        let id = self.id.unwrap_or_else(|| url_hash(&self.url));
        Sample::new(id, self.name, self.url)
    }
}

#[derive(Args)]
struct ExportArgs {
    #[command(flatten)]
    sample: SampleArgs,

    #[arg(long, help = "Put a reference to the exported file on the clipboard")]
    copy: bool,
}

#[derive(Args)]
struct ShareArgs {
    url: String,
}

#[derive(Args)]
struct BrowserArgs {
    #[arg(long, default_value = "Google Chrome")]
    app: String,

    #[command(subcommand)]
    command: BrowserCommand,
}

#[derive(Subcommand)]
enum BrowserCommand {
    #[command(about = "Bring the browser to the foreground")]
    Focus,
    #[command(about = "Send a shortcut such as cmd+shift+t")]
    Shortcut { shortcut: String },
    #[command(about = "Open a URL in a new tab")]
    OpenTab { url: String },
}

#[derive(Serialize)]
struct ConfigView {
    path: String,
    configured: bool,
    token: Option<String>,
    api_base_url: Option<String>,
    created_at: Option<String>,
}

#[derive(Serialize)]
struct Done<'a> {
    ok: bool,
    action: &'a str,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<SoundrawError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SoundrawError) -> u8 {
    if error.is_configuration() {
        return 2;
    }
    match error {
        SoundrawError::Network(_)
        | SoundrawError::Api { .. }
        | SoundrawError::Download { .. }
        | SoundrawError::EmptyDownload(_) => 3,
        SoundrawError::Automation(_) | SoundrawError::FocusTimeout { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let config = ConfigStore::new()?;

    match cli.command {
        Some(Commands::Setup(args)) => run_setup(args, &config, output_mode),
        Some(Commands::Reset) => {
            let removed = config.reset()?;
            report_done(output_mode, "reset", || {
                if removed {
                    println!("Removed stored credential at {}", config.path());
                } else {
                    println!("No stored credential at {}", config.path());
                }
            })
        }
        Some(Commands::Config) => run_config(&config, output_mode),
        Some(Commands::Genres) => run_genres(&build_app(config)?, output_mode),
        Some(Commands::Search(args)) => run_search(args, &build_app(config)?, output_mode),
        Some(Commands::Export(args)) => {
            let app = build_app(config)?;
            let sample = args.sample.into_sample();
            let result = if args.copy {
                app.export_to_clipboard(&sample, &Clipboard::new(OsaScriptRunner::new()))?
            } else {
                app.export_sample(&sample)?
            };
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_file(&result).into_diagnostic(),
                OutputMode::Interactive => {
                    println!("Exported {} → {}", result.name, result.path);
                    Ok(())
                }
            }
        }
        Some(Commands::Prepare(args)) => {
            let app = build_app(config)?;
            let result = app.prepare_sample(&args.into_sample())?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_file(&result).into_diagnostic(),
                OutputMode::Interactive => {
                    println!("{} ({}, {})", result.path, result.content_type, result.action);
                    Ok(())
                }
            }
        }
        Some(Commands::Preview(args)) => run_preview(args, &build_app(config)?),
        Some(Commands::Share(args)) => {
            Clipboard::new(OsaScriptRunner::new()).copy_text(&args.url)?;
            report_done(output_mode, "share", || {
                println!("Copied {} to the clipboard", args.url)
            })
        }
        Some(Commands::ClearCache) => {
            let app = build_app(config)?;
            let result = app.clear_cache()?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_clear(&result).into_diagnostic(),
                OutputMode::Interactive => {
                    println!(
                        "Removed {} cached files ({} bytes)",
                        result.removed_files, result.removed_bytes
                    );
                    Ok(())
                }
            }
        }
        Some(Commands::Browser(args)) => run_browser_command(args, output_mode),
        None => match output_mode {
            OutputMode::Interactive => {
                config.require()?;
                let app = build_app(config)?;
                let playback = app.playback(QuickTimePlayer::new(OsaScriptRunner::new()))?;
                let clipboard = Clipboard::new(OsaScriptRunner::new());
                let outcome = tui::run_browser(&app, &playback, &clipboard, SearchQuery::new());
                playback.shutdown();
                outcome
            }
            OutputMode::NonInteractive => Err(miette::Report::msg(
                "command required (try `soundraw --help`)",
            )),
        },
    }
}

fn build_app(config: ConfigStore) -> miette::Result<HttpApp> {
    let store = Store::new()?;
    let api = SoundrawHttpClient::new(config)?;
    let fetcher = HttpFetcher::new()?;
    Ok(App::new(store, api, fetcher))
}

fn report_done(
    output_mode: OutputMode,
    action: &str,
    interactive: impl FnOnce(),
) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => {
            JsonOutput::print_json(&Done { ok: true, action }).into_diagnostic()
        }
        OutputMode::Interactive => {
            interactive();
            Ok(())
        }
    }
}

fn run_setup(args: SetupArgs, config: &ConfigStore, output_mode: OutputMode) -> miette::Result<()> {
    let record = SoundrawConfig::new(args.token, args.base_url);
    config.save(&record)?;
    report_done(output_mode, "setup", || {
        println!("Saved credential to {}", config.path())
    })
}

fn run_config(config: &ConfigStore, output_mode: OutputMode) -> miette::Result<()> {
    let record = config.load()?;
    let view = ConfigView {
        path: config.path().to_string(),
        configured: record
            .as_ref()
            .map(|record| record.validate().is_ok())
            .unwrap_or(false),
        token: record.as_ref().map(|record| mask_token(&record.token)),
        api_base_url: record.as_ref().map(|record| record.api_base_url.clone()),
        created_at: record.as_ref().map(|record| record.created_at.to_rfc3339()),
    };
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_json(&view).into_diagnostic(),
        OutputMode::Interactive => {
            println!("config: {}", view.path);
            match (&view.token, &view.api_base_url, &view.created_at) {
                (Some(token), Some(base), Some(created)) => {
                    println!("token:    {token}");
                    println!("base url: {base}");
                    println!("created:  {created}");
                }
                _ => println!("not configured (run `soundraw setup`)"),
            }
            Ok(())
        }
    }
}

fn mask_token(token: &str) -> String {
    let visible = token.chars().rev().take(4).collect::<Vec<_>>();
    if token.chars().count() <= 4 {
        return "****".to_string();
    }
    format!("****{}", visible.into_iter().rev().collect::<String>())
}

fn run_genres(app: &HttpApp, output_mode: OutputMode) -> miette::Result<()> {
    let genres = app.genres()?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_genres(&genres).into_diagnostic(),
        OutputMode::Interactive => {
            for genre in &genres.genres {
                println!("{:<24} {}", genre.key, genre.name);
            }
            Ok(())
        }
    }
}

fn run_search(args: SearchArgs, app: &HttpApp, output_mode: OutputMode) -> miette::Result<()> {
    let query = args
        .genres
        .into_iter()
        .fold(SearchQuery::new(), |query, genre| query.genre(genre))
        .page(args.page)
        .limit(args.limit);
    let result = app.search(query)?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_search(&result).into_diagnostic(),
        OutputMode::Interactive => {
            for sample in &result.samples {
                let bpm = sample.bpm_label().unwrap_or_default();
                println!("{:<12} {:<40} {:>8}  {}", sample.id, sample.name, bpm, sample.url);
            }
            println!("page {} · {} samples", result.page, result.samples.len());
            Ok(())
        }
    }
}

fn run_preview(args: SampleArgs, app: &HttpApp) -> miette::Result<()> {
    let sample = args.into_sample();
    let playback = app.playback(QuickTimePlayer::new(OsaScriptRunner::new()))?;
    let started = playback.play(&sample).wait();
    if let Err(err) = started {
        playback.shutdown();
        return Err(err.into());
    }

    print!("Playing {} (press Enter to stop) ", sample.name);
    io::stdout().flush().into_diagnostic()?;
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line);
    playback.shutdown();
    read.into_diagnostic()?;
    Ok(())
}

fn run_browser_command(args: BrowserArgs, output_mode: OutputMode) -> miette::Result<()> {
    let browser = BrowserAutomation::new(OsaScriptRunner::new(), args.app);
    let action = match args.command {
        BrowserCommand::Focus => {
            browser.focus()?;
            "focus"
        }
        BrowserCommand::Shortcut { shortcut } => {
            let shortcut: Shortcut = shortcut.parse()?;
            browser.send_shortcut(&shortcut)?;
            "shortcut"
        }
        BrowserCommand::OpenTab { url } => {
            browser.open_tab(&url)?;
            "open-tab"
        }
    };
    report_done(output_mode, action, || {
        println!("{action}: done in {}", browser.app())
    })
}
