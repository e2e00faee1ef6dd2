use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
    filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
    EnvFilter,
};

use crate::settings::Settings;

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub level: String,
}

impl LogSettings {
    pub fn global() -> &'static Self {
        &Settings::global().log
    }

    fn level_filter(&self) -> Result<LevelFilter> {
        let level = tracing::Level::from_str(self.level.as_str())
            .with_context(|| format!("invalid log level {:?}", self.level))?;

        Ok(LevelFilter::from_level(level))
    }
}

pub fn setup_logging() -> Result<()> {
    let fmt_layer = fmt::layer();

    let filter_layer = EnvFilter::default()
        .add_directive(LogSettings::global().level_filter()?.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_case_insensitive() {
        let settings = LogSettings { level: "Debug".into() };
        assert_eq!(settings.level_filter().unwrap(), LevelFilter::DEBUG);
    }

    #[test]
    fn unknown_level_is_an_error() {
        let settings = LogSettings { level: "loud".into() };
        assert!(settings.level_filter().is_err());
    }
}
