use std::ffi::OsString;

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command, ErrorKind};
use config::{Config, Environment};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use url::Url;

use crate::{
    builder::PayloadConfig, log::LogSettings, receiver::ReceiverSettings, runner::RunnerSettings,
    sender::SenderSettings,
};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// prefix of environment variables overriding config file values, nested keys
/// are separated by `__`
const ENV_PREFIX: &str = "ALERTPUSH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// post the configured notification `runner.repeat` times
    Send,
    /// post the notification firing, then resolved
    Lifecycle,
    /// run a local webhook endpoint
    Receive,
}

impl Mode {
    fn as_str(&self) -> &'static str {
        match self {
            Mode::Send => "send",
            Mode::Lifecycle => "lifecycle",
            Mode::Receive => "receive",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub mode: Mode,
    /// webhook endpoint notifications are posted to
    pub url: Url,
    pub payload: PayloadConfig,
    pub sender: SenderSettings,
    pub runner: RunnerSettings,
    pub receiver: ReceiverSettings,
    pub log: LogSettings,
}

impl Settings {
    #[allow(clippy::expect_used)]
    pub fn global() -> &'static Self {
        SETTINGS.get().expect("settings are loaded at startup")
    }

    /// parse the command line and load the layered configuration once per process
    pub fn init() -> Result<&'static Self> {
        SETTINGS.get_or_try_init(|| Self::from_matches(&matches_from(std::env::args_os())?))
    }

    fn from_matches(opts: &ArgMatches) -> Result<Self> {
        let (mode, sub) = match opts.subcommand() {
            Some(("send", sub)) => (Mode::Send, sub),
            Some(("lifecycle", sub)) => (Mode::Lifecycle, sub),
            Some(("receive", sub)) => (Mode::Receive, sub),
            _ => bail!("no subcommand given"),
        };

        let mut conf = Config::builder()
            .set_default("url", "http://localhost:9393/webhook")?
            .set_default("payload.status", "firing")?
            .set_default("payload.severity", "warning")?
            .set_default("payload.service_suffix", "")?
            .set_default("sender.timeout", 10.0)?
            .set_default("sender.retry.max_retries", 0_i64)?
            .set_default("sender.retry.starting_interval", 0.5)?
            .set_default("sender.retry.max_interval", 5.0)?
            .set_default("sender.retry.multiplier", 1.5)?
            .set_default("runner.repeat", 1_i64)?
            .set_default("runner.delay", 0.0)?
            .set_default("runner.keep_going", false)?
            .set_default("runner.resolve_after", 5.0)?
            .set_default("receiver.bind_address", "0.0.0.0")?
            .set_default("receiver.port", 9393_i64)?
            .set_default("log.level", "info")?;

        if let Some(config_path) = opts.value_of("config") {
            conf = conf.add_source(config::File::with_name(config_path));
        }

        conf = conf
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override("mode", mode.as_str())?
            .set_override_option("log.level", opts.value_of("level"))?;

        conf = match mode {
            Mode::Send | Mode::Lifecycle => conf
                .set_override_option("url", sub.value_of("url"))?
                .set_override_option(
                    "payload.status",
                    sub.value_of("status").map(str::to_ascii_lowercase),
                )?
                .set_override_option("payload.severity", sub.value_of("severity"))?
                .set_override_option("payload.service_suffix", sub.value_of("suffix"))?
                .set_override_option("sender.timeout", parsed::<f64>(sub, "timeout")?)?
                .set_override_option("sender.retry.max_retries", parsed::<i64>(sub, "retries")?)?
                .set_override_option("runner.repeat", parsed::<i64>(sub, "repeat")?)?
                .set_override_option("runner.delay", parsed::<f64>(sub, "delay")?)?
                .set_override_option(
                    "runner.keep_going",
                    sub.is_present("keep-going").then(|| true),
                )?
                .set_override_option(
                    "runner.resolve_after",
                    match mode {
                        Mode::Lifecycle => parsed::<f64>(sub, "resolve-after")?,
                        _ => None,
                    },
                )?,
            Mode::Receive => conf
                .set_override_option("receiver.bind_address", sub.value_of("bind"))?
                .set_override_option("receiver.port", parsed::<i64>(sub, "port")?)?,
        };

        let settings: Settings = conf
            .build()
            .context("can't load config")?
            .try_deserialize()
            .context("can't load config")?;

        Ok(settings)
    }
}

/// usage errors are returned like every other config error, only help and
/// version output exit the process directly
fn matches_from<I, T>(args: I) -> Result<ArgMatches>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    command()
        .try_get_matches_from(args)
        .map_err(|err| match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => anyhow::Error::new(err),
        })
}

/// parse an optional numeric command line value
fn parsed<T>(opts: &ArgMatches, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    opts.value_of(name)
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("invalid value {:?} for --{}", value, name))
        })
        .transpose()
}

fn send_args() -> Vec<Arg<'static>> {
    vec![
        Arg::new("url")
            .help("webhook endpoint to post to")
            .takes_value(true)
            .short('u')
            .long("url"),
        Arg::new("status")
            .help("status of the alert")
            .possible_values(["firing", "resolved"])
            .ignore_case(true)
            .takes_value(true)
            .long("status"),
        Arg::new("severity")
            .help("value of the severity label, e.g. warning or info")
            .takes_value(true)
            .long("severity"),
        Arg::new("suffix")
            .help("appended to the service label and the group key")
            .takes_value(true)
            .allow_hyphen_values(true)
            .long("suffix"),
        Arg::new("timeout")
            .help("request timeout in seconds")
            .takes_value(true)
            .long("timeout"),
        Arg::new("retries")
            .help("how often a request failing on the transport level is retried")
            .takes_value(true)
            .long("retries"),
        Arg::new("repeat")
            .help("number of notifications to post")
            .takes_value(true)
            .short('n')
            .long("repeat"),
        Arg::new("delay")
            .help("seconds to wait between two notifications")
            .takes_value(true)
            .long("delay"),
        Arg::new("keep-going")
            .help("continue with the next notification after a failed request")
            .long("keep-going"),
    ]
}

pub fn command() -> Command<'static> {
    Command::new(clap::crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args(&[
            Arg::new("config")
                .help("path of an optional config file")
                .takes_value(true)
                .global(true)
                .short('c')
                .long("config"),
            Arg::new("level")
                .help("log level")
                .possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
                .ignore_case(true)
                .takes_value(true)
                .global(true)
                .long("log"),
        ])
        .subcommand(
            Command::new("send")
                .about("post a notification to the webhook endpoint")
                .args(send_args()),
        )
        .subcommand(
            Command::new("lifecycle")
                .about("post a firing notification and resolve it after a while")
                .args(send_args())
                .arg(
                    Arg::new("resolve-after")
                        .help("seconds between the firing and the resolved notification")
                        .takes_value(true)
                        .long("resolve-after"),
                ),
        )
        .subcommand(
            Command::new("receive")
                .about("run a local webhook endpoint that logs every notification")
                .args(&[
                    Arg::new("bind")
                        .help("address to listen on")
                        .takes_value(true)
                        .long("bind"),
                    Arg::new("port")
                        .help("port to listen on")
                        .takes_value(true)
                        .short('p')
                        .long("port"),
                ]),
        )
}
