use std::fs::File;
use std::io::{self, BufRead, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use serde::{Deserialize, Serialize};
use sograph_crawler::auth::{authorize_url, token_from_redirect, AuthConfig};
use sograph_crawler::{crawl_site, CrawlerConfig, OnError, ThresholdScope, UserId};
use sograph_export::{export_graph, CsvWriterConfig, FileMode};
use tokio::runtime;

/// Stack Overflow answer graph crawler
#[derive(Debug, Parser)]
#[clap(version)]
pub struct Args {
    #[clap(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[clap(name = "crawl")]
    Crawl(CrawlArgs),
    #[clap(name = "auth")]
    Auth(AuthArgs),
    #[clap(hide = true)]
    Completion,
}

/// Everything a yaml configuration file may define
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub csv: CsvWriterConfig,
}

impl Settings {
    fn load(path: Option<&PathBuf>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let file = File::open(path).map_err(|e| {
                    anyhow::anyhow!("Couldn't open config {} got: {e}", path.display())
                })?;
                Ok(serde_yaml::from_reader(file)?)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Crawl the answer graph from seed users and write it as nodes and edges CSV files
#[derive(Debug, clap::Args)]
pub struct CrawlArgs {
    /// User the crawl starts from, may be repeated
    #[clap(long = "seed", default_value = "4357115")]
    pub seeds: Vec<UserId>,
    /// Path to the output file that will contain graph nodes
    #[clap(parse(from_os_str), long, default_value = "nodes.csv")]
    pub nodes_file: PathBuf,
    /// Path to the output file that will contain graph edges
    #[clap(parse(from_os_str), long, default_value = "edges.csv")]
    pub edges_file: PathBuf,
    /// Optional yaml configuration file
    #[clap(env = "SOGRAPH_CONFIG", parse(from_os_str), long)]
    pub config: Option<PathBuf>,
    /// API access token, the OAuth flow is started when missing
    #[clap(env = "SOGRAPH_ACCESS_TOKEN", hide_env_values = true, long)]
    pub token: Option<String>,
    /// Override crawler's maximum depth
    #[clap(long)]
    pub max_depth: Option<usize>,
    /// Override crawler's number of top questions looked up per user
    #[clap(long)]
    pub num_questions: Option<usize>,
    /// Override crawler's minimum reputation for a user to be expanded
    #[clap(long)]
    pub reputation_threshold: Option<u64>,
    /// Override where the reputation threshold applies
    #[clap(arg_enum, long)]
    pub threshold_scope: Option<ThresholdScope>,
    /// Override crawler's request rate limit
    #[clap(long)]
    pub max_requests_per_second: Option<NonZeroUsize>,
    /// Override crawler's user error handling strategy
    #[clap(arg_enum, long)]
    pub on_user_error: Option<OnError>,
    /// Overwrite existing output files
    #[clap(long, short)]
    pub force: bool,
    /// When quiet no logs are outputted
    #[clap(long, short)]
    pub quiet: bool,
}

impl TryFrom<&CrawlArgs> for Settings {
    type Error = anyhow::Error;

    fn try_from(args: &CrawlArgs) -> Result<Self, Self::Error> {
        let mut settings = Settings::load(args.config.as_ref())?;
        let conf = &mut settings.crawler;
        if let Some(max_depth) = args.max_depth {
            conf.max_depth = max_depth;
        }
        if let Some(num_questions) = args.num_questions {
            conf.num_questions = num_questions;
        }
        if let Some(reputation_threshold) = args.reputation_threshold {
            conf.reputation_threshold = reputation_threshold;
        }
        if let Some(threshold_scope) = args.threshold_scope {
            conf.threshold_scope = threshold_scope;
        }
        if let Some(max_requests_per_second) = args.max_requests_per_second {
            conf.api.max_requests_per_second = max_requests_per_second;
        }
        if let Some(on_user_error) = args.on_user_error {
            conf.on_user_error = on_user_error;
        }
        conf.api.validate()?;
        Ok(settings)
    }
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let settings = Settings::try_from(&args)?;

    let mode = if args.force {
        FileMode::Truncate
    } else {
        for path in [&args.nodes_file, &args.edges_file] {
            if path.exists() {
                anyhow::bail!(
                    "File already exists: {} (use --force to overwrite)",
                    path.display()
                );
            }
        }
        FileMode::CreateNew
    };

    let token = match args.token {
        Some(token) => token,
        None => request_token(&settings.auth)?,
    };

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let graph = rt.block_on(crawl_site(&settings.crawler, &token, &args.seeds))?;

    export_graph(
        &graph,
        &args.nodes_file,
        &args.edges_file,
        mode,
        &settings.csv,
    )
}

/// Authorize the application and print the resulting access token
#[derive(Debug, clap::Args)]
pub struct AuthArgs {
    /// Optional yaml configuration file
    #[clap(env = "SOGRAPH_CONFIG", parse(from_os_str), long)]
    pub config: Option<PathBuf>,
}

pub fn auth(args: AuthArgs) -> anyhow::Result<()> {
    let settings = Settings::load(args.config.as_ref())?;
    let token = request_token(&settings.auth)?;
    println!("{token}");
    Ok(())
}

/// Opens the OAuth dialog and waits for the user to paste the redirect URL.
fn request_token(config: &AuthConfig) -> anyhow::Result<String> {
    let url = authorize_url(config);
    eprintln!("Grant access in your browser: {url}");
    if let Err(e) = webbrowser::open(url.as_str()) {
        log::warn!("Couldn't open a browser: {e}");
    }

    let stdin = io::stdin();
    let mut stdin = stdin.lock();
    loop {
        eprint!("Enter the URL you were redirected to after granting permission: ");
        io::stderr().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            anyhow::bail!("No redirect URL provided");
        }
        match token_from_redirect(&line) {
            Some(token) => return Ok(token),
            None => eprintln!("No access token found in: {}", line.trim()),
        }
    }
}

fn init_logger() {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or("sograph=info,sograph_crawler=info,sograph_export=info"),
    )
    .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Crawl(args) => {
            if !args.quiet {
                init_logger();
            }
            crawl(args)
        }
        SubCommand::Auth(args) => {
            init_logger();
            auth(args)
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "sograph", &mut io::stdout());
            Ok(())
        }
    }
}
