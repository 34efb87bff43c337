use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use clap::builder::BoolishValueParser;
use serde::{Deserialize, Deserializer};
use serde_yaml;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::github::DEFAULT_API_URL;

pub const DEFAULT_NAME: &str = "github2karakeep";

#[derive(Parser, Debug, Default)]
#[command(name = "github2karakeep")]
#[command(about = "Mirrors GitHub stars into a Karakeep list", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config", env = "CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// Timeout for each HTTP request, e.g. 10s
    #[arg(long, env = "TIMEOUT")]
    pub timeout: Option<String>,

    #[arg(long = "gh-user", env = "GH_USERNAME")]
    pub gh_user: Option<String>,

    /// GitHub personal access token
    #[arg(long = "gh-token", env = "GH_TOKEN", hide_env_values = true)]
    pub gh_token: Option<String>,

    /// Number of starred repos requested per page
    #[arg(long = "gh-per-page", env = "GH_PER_PAGE")]
    pub gh_per_page: Option<u32>,

    /// Attach repository topics as tags
    #[arg(long = "gh-extract-topics", env = "GH_EXTRACT_TOPICS", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub gh_extract_topics: Option<bool>,

    #[arg(long = "gh-api-url", env = "GH_API_URL")]
    pub gh_api_url: Option<String>,

    #[arg(long = "kk-host", env = "KK_HOST")]
    pub kk_host: Option<String>,

    #[arg(long = "kk-token", env = "KK_TOKEN", hide_env_values = true)]
    pub kk_token: Option<String>,

    /// Karakeep list the bookmarks are added to
    #[arg(long = "kk-list", env = "KK_LIST")]
    pub kk_list: Option<String>,

    /// Tag applied to every bookmark, empty to disable
    #[arg(long = "default-tag", env = "DEFAULT_TAG")]
    pub default_tag: Option<String>,

    #[arg(long = "update-interval", env = "UPDATE_INTERVAL")]
    pub update_interval: Option<String>,

    /// Bookmarks exported per pass, 0 or less for no limit
    #[arg(long = "export-limit", env = "EXPORT_LIMIT", allow_negative_numbers = true)]
    pub export_limit: Option<i64>,

    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".github2karakeep")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Github {
    pub user: String,
    pub token: String,
    pub per_page: u32,
    pub extract_topics: bool,
    pub api_url: String,
}

impl Default for Github {
    fn default() -> Self {
        Self {
            user: String::new(),
            token: String::new(),
            per_page: 100,
            extract_topics: false,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Karakeep {
    pub host: String,
    pub token: String,
    pub list: String,
    pub default_tag: String,
}

impl Default for Karakeep {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: String::new(),
            list: DEFAULT_NAME.to_string(),
            default_tag: DEFAULT_NAME.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Schedule {
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
    pub export_limit: i64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
            export_limit: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    pub github: Github,
    pub karakeep: Karakeep,
    pub sync: Schedule,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            github: Github::default(),
            karakeep: Karakeep::default(),
            sync: Schedule::default(),
        }
    }
}

impl Config {
    pub fn new(path: &Path) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        Ok(cfg)
    }

    /// Builds the effective config: flags and env override the config file,
    /// which overrides the defaults.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut cfg = match &cli.config_path {
            Some(path) => Config::new(path)?,
            None => {
                let path = default_config_path();
                if path.exists() { Config::new(&path)? } else { Config::default() }
            }
        };
        cfg.apply(cli)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply(&mut self, cli: &Cli) -> Result<()> {
        if let Some(timeout) = &cli.timeout {
            self.timeout = parse_duration(timeout).context("invalid --timeout")?;
        }
        if let Some(interval) = &cli.update_interval {
            self.sync.interval = parse_duration(interval).context("invalid --update-interval")?;
        }
        if let Some(limit) = cli.export_limit {
            self.sync.export_limit = limit;
        }

        let gh = &mut self.github;
        override_with(&mut gh.user, &cli.gh_user);
        override_with(&mut gh.token, &cli.gh_token);
        override_with(&mut gh.api_url, &cli.gh_api_url);
        if let Some(per_page) = cli.gh_per_page {
            gh.per_page = per_page;
        }
        if let Some(extract) = cli.gh_extract_topics {
            gh.extract_topics = extract;
        }

        let kk = &mut self.karakeep;
        override_with(&mut kk.host, &cli.kk_host);
        override_with(&mut kk.token, &cli.kk_token);
        override_with(&mut kk.list, &cli.kk_list);
        override_with(&mut kk.default_tag, &cli.default_tag);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("gh-user", &self.github.user),
            ("gh-token", &self.github.token),
            ("kk-host", &self.karakeep.host),
            ("kk-token", &self.karakeep.token),
            ("kk-list", &self.karakeep.list),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                bail!("missing required option --{}", name);
            }
        }
        if !(1..=100).contains(&self.github.per_page) {
            bail!("gh-per-page must be between 1 and 100, got {}", self.github.per_page);
        }
        if self.timeout.is_zero() {
            bail!("timeout must be greater than zero");
        }
        if self.sync.interval.is_zero() {
            bail!("update-interval must be greater than zero");
        }
        Ok(())
    }

    fn load_config(path: &Path) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
        let yaml_with_env = Config::substitute_env_vars(&yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!(var = var_name, "environment variable not found");
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}

fn override_with(target: &mut String, value: &Option<String>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

/// Parses durations such as `10s`, `24h`, `1h30m` or `250ms`. A bare number is
/// taken as seconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        bail!("empty duration");
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            bail!("invalid duration {:?}", input);
        }
        let value: u64 = rest[..digits].parse()?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "ms" => Duration::from_millis(1),
            "s" => Duration::from_secs(1),
            "m" => Duration::from_secs(60),
            "h" => Duration::from_secs(60 * 60),
            "d" => Duration::from_secs(24 * 60 * 60),
            other => bail!("invalid duration unit {:?} in {:?}", other, input),
        };
        rest = &rest[unit_len..];

        let part = unit
            .checked_mul(u32::try_from(value)?)
            .ok_or_else(|| anyhow!("duration {:?} is too large", input))?;
        total += part;
    }
    Ok(total)
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
