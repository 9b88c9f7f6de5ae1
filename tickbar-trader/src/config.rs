use crate::{client::orders::OrderTemplate, error::ConfigError};
use derive_more::Display;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::{fmt, str::FromStr, time::Duration};
use tickbar_data::{
    connection::{DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY, FeedConfig},
    store::Retention,
    streams::timeout::DEFAULT_READ_TIMEOUT,
    tick::Symbol,
};
use tickbar_strategy::{
    moving_average::{DEFAULT_LONG_WINDOW, DEFAULT_SHORT_WINDOW},
    pipeline::PipelineConfig,
};
use url::Url;

pub const DEFAULT_DEMO_API_URL: &str = "https://demo.ironbeamapi.com/v2";
pub const DEFAULT_LIVE_API_URL: &str = "https://live.ironbeamapi.com/v2";
pub const DEFAULT_SYMBOLS: &str = "NQ=NQ.Z24";
pub const MAX_SYMBOLS: usize = 10;

const DEFAULT_RETENTION: usize = 5000;
const DEFAULT_ORDER_QUANTITY: u32 = 1;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum Environment {
    #[display("demo")]
    Demo,
    #[display("live")]
    Live,
}

impl Environment {
    fn prefix(self) -> &'static str {
        match self {
            Self::Demo => "TICKBAR_DEMO",
            Self::Live => "TICKBAR_LIVE",
        }
    }
}

/// Account credentials for the selected [`Environment`].
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Human alias of a feed symbol, eg/ "NQ" for "NQ.Z24".
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct SymbolAlias {
    pub alias: SmolStr,
    pub feed_symbol: Symbol,
}

impl FromStr for SymbolAlias {
    type Err = String;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let (alias, feed_symbol) = match entry.split_once('=') {
            Some((alias, feed_symbol)) => (alias.trim(), feed_symbol.trim()),
            None => (entry.trim(), entry.trim()),
        };

        if alias.is_empty() || feed_symbol.is_empty() {
            return Err(format!("expected alias=feed_symbol, found: {entry:?}"));
        }

        Ok(Self {
            alias: SmolStr::new(alias),
            feed_symbol: Symbol::new(feed_symbol),
        })
    }
}

/// Trader configuration read from `TICKBAR_*` environment variables.
#[derive(Clone, Debug)]
pub struct TraderConfig {
    pub environment: Environment,
    pub api_url: Url,
    pub credentials: Credentials,
    pub account_id: String,
    pub symbols: Vec<SymbolAlias>,
    pub short_window: usize,
    pub long_window: usize,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub read_timeout: Duration,
    pub retention: Retention,
    pub order_quantity: u32,
    pub stop_loss_offset: Decimal,
    pub take_profit_offset: Decimal,
}

impl TraderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let environment = if vars.parse_or("TICKBAR_USE_LIVE", Flag(false))?.0 {
            Environment::Live
        } else {
            Environment::Demo
        };

        let api_url = match environment {
            Environment::Demo => {
                vars.parse_or("TICKBAR_DEMO_API_URL", Url::parse(DEFAULT_DEMO_API_URL)?)?
            }
            Environment::Live => {
                vars.parse_or("TICKBAR_LIVE_API_URL", Url::parse(DEFAULT_LIVE_API_URL)?)?
            }
        };

        let prefix = environment.prefix();
        let credentials = Credentials {
            username: vars.required(&format!("{prefix}_USERNAME"))?,
            password: vars.required(&format!("{prefix}_PASSWORD"))?,
            api_key: vars.required(&format!("{prefix}_API_KEY"))?,
        };

        Ok(Self {
            environment,
            api_url,
            credentials,
            account_id: vars.required("TICKBAR_ACCOUNT_ID")?,
            symbols: parse_symbols(
                &vars
                    .get("TICKBAR_SYMBOLS")
                    .unwrap_or_else(|| DEFAULT_SYMBOLS.to_string()),
            )?,
            short_window: vars.parse_or("TICKBAR_SHORT_WINDOW", DEFAULT_SHORT_WINDOW)?,
            long_window: vars.parse_or("TICKBAR_LONG_WINDOW", DEFAULT_LONG_WINDOW)?,
            max_reconnect_attempts: vars
                .parse_or("TICKBAR_MAX_RECONNECT_ATTEMPTS", DEFAULT_MAX_RECONNECT_ATTEMPTS)?,
            reconnect_delay: Duration::from_secs(
                vars.parse_or("TICKBAR_RECONNECT_DELAY_SECS", DEFAULT_RECONNECT_DELAY.as_secs())?,
            ),
            read_timeout: Duration::from_secs(
                vars.parse_or("TICKBAR_READ_TIMEOUT_SECS", DEFAULT_READ_TIMEOUT.as_secs())?,
            ),
            retention: Retention::from_limit(
                vars.parse_or("TICKBAR_RETENTION", DEFAULT_RETENTION)?,
            ),
            order_quantity: vars.parse_or("TICKBAR_ORDER_QUANTITY", DEFAULT_ORDER_QUANTITY)?,
            stop_loss_offset: vars.parse_or("TICKBAR_STOP_LOSS_OFFSET", Decimal::from(10))?,
            take_profit_offset: vars.parse_or("TICKBAR_TAKE_PROFIT_OFFSET", Decimal::from(20))?,
        })
    }

    pub fn feed_symbols(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.symbols.iter().map(|symbol| &symbol.feed_symbol)
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig::new(self.feed_symbols().cloned())
            .with_max_reconnect_attempts(self.max_reconnect_attempts)
            .with_reconnect_delay(self.reconnect_delay)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            short_window: self.short_window,
            long_window: self.long_window,
            retention: self.retention,
        }
    }

    pub fn order_template(&self) -> OrderTemplate {
        OrderTemplate {
            account_id: self.account_id.clone(),
            quantity: self.order_quantity,
            stop_loss_offset: self.stop_loss_offset,
            take_profit_offset: self.take_profit_offset,
        }
    }
}

/// Parse comma separated `alias=feed_symbol` entries.
pub fn parse_symbols(raw: &str) -> Result<Vec<SymbolAlias>, ConfigError> {
    let symbols = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse::<SymbolAlias>().map_err(|reason| ConfigError::Invalid {
                var: "TICKBAR_SYMBOLS".to_string(),
                value: raw.to_string(),
                reason,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    match symbols.len() {
        0 => Err(ConfigError::NoSymbols),
        count if count > MAX_SYMBOLS => Err(ConfigError::TooManySymbols {
            count,
            max: MAX_SYMBOLS,
        }),
        _ => Ok(symbols),
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, var: &str) -> Result<String, ConfigError> {
        self.get(var)
            .ok_or_else(|| ConfigError::Missing(var.to_string()))
    }

    fn parse_or<T>(&self, var: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(var) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|error: T::Err| ConfigError::Invalid {
                var: var.to_string(),
                reason: error.to_string(),
                value,
            }),
        }
    }
}

/// Boolean environment flag accepting `true/false`, `1/0`, `yes/no` & `on/off`.
struct Flag(bool);

impl FromStr for Flag {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Self(true)),
            "false" | "0" | "no" | "off" => Ok(Self(false)),
            other => Err(format!("expected a boolean, found: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| vars.get(key).cloned()
    }

    const DEMO: [(&str, &str); 4] = [
        ("TICKBAR_DEMO_USERNAME", "duncan"),
        ("TICKBAR_DEMO_PASSWORD", "hunter2"),
        ("TICKBAR_DEMO_API_KEY", "demo-key"),
        ("TICKBAR_ACCOUNT_ID", "5123456"),
    ];

    #[test]
    fn test_defaults() {
        let config = TraderConfig::from_lookup(lookup(&DEMO)).unwrap();

        assert_eq!(config.environment, Environment::Demo);
        assert_eq!(config.api_url.as_str(), "https://demo.ironbeamapi.com/v2");
        assert_eq!(config.credentials.username, "duncan");
        assert_eq!(config.account_id, "5123456");
        assert_eq!(
            config.symbols,
            vec![SymbolAlias {
                alias: SmolStr::new("NQ"),
                feed_symbol: Symbol::new("NQ.Z24"),
            }]
        );
        assert_eq!((config.short_window, config.long_window), (200, 1000));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(120));
        assert_eq!(config.retention, Retention::Last(5000));
        assert_eq!(config.order_quantity, 1);
        assert_eq!(config.stop_loss_offset, dec!(10));
        assert_eq!(config.take_profit_offset, dec!(20));

        let feed = config.feed_config();
        assert_eq!(feed.symbols, vec![Symbol::new("NQ.Z24")]);

        let template = config.order_template();
        assert_eq!(template.account_id, "5123456");
        assert_eq!(template.quantity, 1);
        assert_eq!(
            (template.stop_loss_offset, template.take_profit_offset),
            (dec!(10), dec!(20))
        );
    }

    #[test]
    fn test_live_environment_overrides() {
        let config = TraderConfig::from_lookup(lookup(&[
            ("TICKBAR_USE_LIVE", "TRUE"),
            ("TICKBAR_LIVE_USERNAME", "duncan"),
            ("TICKBAR_LIVE_PASSWORD", "hunter2"),
            ("TICKBAR_LIVE_API_KEY", "live-key"),
            ("TICKBAR_ACCOUNT_ID", "5123456"),
            ("TICKBAR_SYMBOLS", "NQ=NQ.Z24, ES=ES.Z24,CL.Z24"),
            ("TICKBAR_RETENTION", "0"),
            ("TICKBAR_SHORT_WINDOW", "20"),
            ("TICKBAR_RECONNECT_DELAY_SECS", "1"),
        ]))
        .unwrap();

        assert_eq!(config.environment, Environment::Live);
        assert_eq!(config.api_url.as_str(), "https://live.ironbeamapi.com/v2");
        assert_eq!(config.credentials.api_key, "live-key");
        assert_eq!(
            config.feed_symbols().map(Symbol::as_str).collect::<Vec<_>>(),
            vec!["NQ.Z24", "ES.Z24", "CL.Z24"]
        );
        assert_eq!(config.retention, Retention::Unbounded);
        assert_eq!(config.pipeline_config().short_window, 20);
        assert_eq!(config.feed_config().reconnect_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_config() {
        struct TestCase {
            overrides: Vec<(&'static str, &'static str)>,
            expected: ConfigError,
        }

        let tests = vec![
            TestCase {
                // TC0: missing credentials for the selected environment
                overrides: vec![("TICKBAR_USE_LIVE", "yes")],
                expected: ConfigError::Missing("TICKBAR_LIVE_USERNAME".to_string()),
            },
            TestCase {
                // TC1: unparsable number
                overrides: vec![("TICKBAR_LONG_WINDOW", "lots")],
                expected: ConfigError::Invalid {
                    var: "TICKBAR_LONG_WINDOW".to_string(),
                    value: "lots".to_string(),
                    reason: "invalid digit found in string".to_string(),
                },
            },
            TestCase {
                // TC2: too many symbols
                overrides: vec![("TICKBAR_SYMBOLS", "A,B,C,D,E,F,G,H,I,J,K")],
                expected: ConfigError::TooManySymbols { count: 11, max: 10 },
            },
            TestCase {
                // TC3: no symbols
                overrides: vec![("TICKBAR_SYMBOLS", " , ,")],
                expected: ConfigError::NoSymbols,
            },
            TestCase {
                // TC4: invalid boolean
                overrides: vec![("TICKBAR_USE_LIVE", "maybe")],
                expected: ConfigError::Invalid {
                    var: "TICKBAR_USE_LIVE".to_string(),
                    value: "maybe".to_string(),
                    reason: "expected a boolean, found: maybe".to_string(),
                },
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let mut vars = DEMO.to_vec();
            vars.extend(test.overrides);
            let actual = TraderConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let config = TraderConfig::from_lookup(lookup(&DEMO)).unwrap();
        let debug = format!("{:?}", config.credentials);

        assert!(debug.contains("duncan"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("demo-key"));
    }
}
