use clap::{Args, Command, FromArgMatches, Parser, Subcommand, ValueEnum};
use feedsync_core::config::{DEFAULT_LOCALE_TAG, DEFAULT_OUTPUT_PATH};
use feedsync_core::{SyncConfig, SyncMode};
use feedsync_integrations::connectors::bilibili::{
    BilibiliConfig, DEFAULT_ACCEPT_LANGUAGE, DEFAULT_ORIGIN, DEFAULT_USER_AGENT,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "feedsync",
    version,
    about = "Mirror a Bilibili opus feed into a local JSON-lines log"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// A bare `feedsync` behaves like `feedsync sync full`; `feedsync full` and
    /// `feedsync inc` are folded into `sync` as well.
    pub fn into_command(self) -> Result<Commands, clap::Error> {
        Ok(match self.command {
            Some(Commands::Full { args }) => Commands::Sync {
                mode: ModeArg::Full,
                args,
            },
            Some(Commands::Incremental { args }) => Commands::Sync {
                mode: ModeArg::Incremental,
                args,
            },
            Some(cmd) => cmd,
            None => Commands::Sync {
                mode: ModeArg::Full,
                args: SyncArgs::from_env_and_defaults()?,
            },
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch the feed and merge it into the output file (default: full).
    Sync {
        #[arg(value_enum, default_value = "full", ignore_case = true)]
        mode: ModeArg,

        #[command(flatten)]
        args: SyncArgs,
    },

    /// Shorthand for `sync full`.
    Full {
        #[command(flatten)]
        args: SyncArgs,
    },

    /// Shorthand for `sync incremental`.
    #[command(alias = "inc")]
    Incremental {
        #[command(flatten)]
        args: SyncArgs,
    },

    /// Rewrite an existing log so that every record carries `badge` last.
    Normalize {
        /// Log to read.
        input: PathBuf,

        /// Where to write the result (defaults to rewriting `input` in place).
        output: Option<PathBuf>,
    },

    /// Print the effective configuration (redacted secrets).
    Config {
        #[command(flatten)]
        args: SyncArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Rebuild the whole output file.
    Full,
    /// Append only items newer than the newest stored one.
    #[value(alias = "inc")]
    Incremental,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => SyncMode::Full,
            ModeArg::Incremental => SyncMode::Incremental,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct SyncArgs {
    /// Numeric id of the feed owner (UP mid).
    #[arg(long, env = "FEEDSYNC_HOST_MID")]
    pub host_mid: Option<u64>,

    #[arg(long, env = "FEEDSYNC_OUTPUT", default_value = DEFAULT_OUTPUT_PATH)]
    pub output: PathBuf,

    /// Seconds to wait between page requests.
    #[arg(long, env = "FEEDSYNC_DELAY", default_value = "0.3", value_parser = parse_delay)]
    pub delay: Duration,

    #[arg(long, env = "FEEDSYNC_WEB_LOCATION", default_value = DEFAULT_LOCALE_TAG)]
    pub web_location: String,

    /// Browser cookie string (`k=v; k2=v2`).
    #[arg(long, env = "BILI_COOKIE", default_value = "", hide_env_values = true)]
    pub cookie: String,

    #[arg(long, env = "BILI_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    #[arg(long, env = "FEEDSYNC_ACCEPT_LANGUAGE", default_value = DEFAULT_ACCEPT_LANGUAGE)]
    pub accept_language: String,

    #[arg(long, env = "FEEDSYNC_ORIGIN", default_value = DEFAULT_ORIGIN)]
    pub origin: String,

    /// Defaults to the owner's opus page.
    #[arg(long, env = "FEEDSYNC_REFERER")]
    pub referer: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "FEEDSYNC_TIMEOUT", default_value = "10", value_parser = parse_delay)]
    pub timeout: Duration,
}

impl SyncArgs {
    /// Sync arguments with no flags given: environment values, then defaults.
    pub fn from_env_and_defaults() -> Result<Self, clap::Error> {
        let matches =
            Self::augment_args(Command::new("feedsync")).try_get_matches_from(["feedsync"])?;
        Self::from_arg_matches(&matches)
    }

    /// A missing `host_mid` maps to the unset target and fails validation later.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::new(self.host_mid.unwrap_or(0), self.output.clone())
            .with_delay(self.delay)
            .with_locale_tag(self.web_location.clone())
    }

    pub fn bilibili_config(&self) -> BilibiliConfig {
        let user_agent = if self.user_agent.trim().is_empty() {
            DEFAULT_USER_AGENT.to_string()
        } else {
            self.user_agent.trim().to_string()
        };
        BilibiliConfig {
            user_agent,
            accept_language: self.accept_language.clone(),
            origin: self.origin.clone(),
            referer: self.referer.clone().filter(|r| !r.trim().is_empty()),
            cookie: self.cookie.trim().to_string(),
            timeout: self.timeout,
            ..BilibiliConfig::default()
        }
    }
}

fn parse_delay(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|e| format!("expected seconds as a number: {e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration {raw:?}: {e}"))
}
