use clap::Parser;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Server settings, read from the command line with environment variable fallbacks.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(version, about)]
pub struct Config {
    /// The address to bind to
    #[arg(long, env = "RESPKV_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// The port to listen on
    #[arg(short, long, env = "RESPKV_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Largest request, in bytes, buffered before the connection is dropped
    #[arg(long, env = "RESPKV_MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "RESPKV_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn defaults_match_cli_defaults() {
        // Passing the declared defaults explicitly keeps exported RESPKV_* variables out of it.
        let mut args = vec!["respkv".to_string()];
        for arg in Config::command().get_arguments() {
            if let (Some(long), [default]) = (arg.get_long(), arg.get_default_values()) {
                args.push(format!("--{}", long));
                args.push(default.to_string_lossy().into_owned());
            }
        }
        assert_eq!(args.len(), 9);

        let config = Config::try_parse_from(args).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn parse_arguments() {
        let config = Config::try_parse_from([
            "respkv",
            "--host",
            "0.0.0.0",
            "-p",
            "7000",
            "--max-frame-size",
            "1024",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(
            config,
            Config {
                host: "0.0.0.0".to_string(),
                port: 7000,
                max_frame_size: 1024,
                log_level: "debug".to_string(),
            }
        );
    }

    #[test]
    fn reject_invalid_port() {
        assert!(Config::try_parse_from(["respkv", "--port", "not-a-port"]).is_err());
    }
}
