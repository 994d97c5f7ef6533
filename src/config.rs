use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser, Debug, Clone)]
#[command(name = "connect-four-web", about = "Serves a single game of connect four over HTTP")]
pub struct Config {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Directory holding save.json and scores.json
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for the daily server logs
    #[arg(long, default_value = "./logs")]
    pub log_dir: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["connect-four-web"]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.log_dir, PathBuf::from("./logs"));
        assert_eq!(config.log_level(), Level::INFO);
    }

    #[test]
    fn test_overrides() {
        let config = Config::try_parse_from([
            "connect-four-web",
            "--bind",
            "0.0.0.0:9000",
            "--data-dir",
            "/var/lib/connect-four",
            "-v",
        ])
        .unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/connect-four"));
        assert_eq!(config.log_level(), Level::DEBUG);
    }

    #[test]
    fn test_rejects_bad_address() {
        assert!(Config::try_parse_from(["connect-four-web", "--bind", "nowhere"]).is_err());
    }
}
