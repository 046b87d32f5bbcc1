use clap::Parser;
use dgrep_config::{ClusterLayout, EngineConfig};
use dgrep_core::{Error, Result, DEFAULT_CACHE_CAPACITY, DEFAULT_DIAL_INTERVAL};
use dgrep_utils::RetryPolicy;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dgrep")]
#[command(about = "Query log files on every machine of a cluster at once", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Number of machines in the cluster
    #[arg(short = 'n', long, default_value_t = 10)]
    pub cluster_size: usize,

    /// Log file on this machine that queries run against
    #[arg(short = 'f', long)]
    pub log_file: PathBuf,

    /// Maximum number of cached query results
    #[arg(short = 'c', long, default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: usize,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Write every query's results as JSON into this directory
    #[arg(short = 't', long)]
    pub test_output_dir: Option<PathBuf>,

    /// Hostname of each machine, with `{ordinal}` or `{ordinal:02}` for its number
    #[arg(long, default_value = "machine-{ordinal:02}")]
    pub machine_template: String,

    /// Listening port of each machine; may also contain the ordinal placeholder
    #[arg(long, default_value = "9000")]
    pub port_template: String,

    /// This machine's number, instead of matching the hostname
    #[arg(long)]
    pub ordinal: Option<usize>,

    /// Give up dialing a peer after this many attempts (default: keep trying)
    #[arg(long)]
    pub dial_attempts: Option<usize>,
}

impl Cli {
    pub fn layout(&self) -> Result<ClusterLayout> {
        ClusterLayout::new(
            self.cluster_size,
            &self.machine_template,
            &self.port_template,
        )
    }

    /// This machine's ordinal, from `--ordinal` or hostname detection
    pub fn local_ordinal(&self, layout: &ClusterLayout) -> Result<usize> {
        match self.ordinal {
            Some(ordinal) if (1..=layout.size).contains(&ordinal) => Ok(ordinal),
            Some(ordinal) => Err(Error::configuration(format!(
                "ordinal {ordinal} is outside the cluster (1..={})",
                layout.size
            ))),
            None => layout.detect_local_ordinal(),
        }
    }

    pub fn dial_policy(&self) -> RetryPolicy {
        match self.dial_attempts {
            Some(attempts) => RetryPolicy::bounded(DEFAULT_DIAL_INTERVAL, attempts),
            None => RetryPolicy::unbounded(DEFAULT_DIAL_INTERVAL),
        }
    }

    pub fn engine_config(&self, listen_addr: SocketAddr, advertise: Option<String>) -> EngineConfig {
        let mut config = EngineConfig::new(&self.log_file)
            .with_listen_addr(listen_addr)
            .with_cache_capacity(self.cache_capacity)
            .with_dial_policy(self.dial_policy());
        if let Some(addr) = advertise {
            config = config.with_advertise_addr(addr);
        }
        if let Some(dir) = &self.test_output_dir {
            config = config.with_test_output_dir(dir);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "dgrep", "-n", "3", "-f", "machine.1.log", "-c", "5", "-v", "-t", "out",
        ])
        .unwrap();

        assert_eq!(cli.cluster_size, 3);
        assert_eq!(cli.log_file, PathBuf::from("machine.1.log"));
        assert_eq!(cli.cache_capacity, 5);
        assert!(cli.verbose);
        assert_eq!(cli.test_output_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["dgrep", "--log-file", "a.log"]).unwrap();
        assert_eq!(cli.cluster_size, 10);
        assert_eq!(cli.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert!(!cli.verbose);
        assert_eq!(cli.dial_policy().max_attempts, None);

        let layout = cli.layout().unwrap();
        assert_eq!(layout.hostname_for(4), "machine-04");
        assert_eq!(layout.port_for(4).unwrap(), 9000);
    }

    #[test]
    fn test_log_file_is_required() {
        assert!(Cli::try_parse_from(["dgrep"]).is_err());
    }

    #[test]
    fn test_ordinal_override_is_checked() {
        let cli =
            Cli::try_parse_from(["dgrep", "-f", "a.log", "-n", "3", "--ordinal", "2"]).unwrap();
        assert_eq!(cli.local_ordinal(&cli.layout().unwrap()).unwrap(), 2);

        let cli =
            Cli::try_parse_from(["dgrep", "-f", "a.log", "-n", "3", "--ordinal", "4"]).unwrap();
        assert!(cli.local_ordinal(&cli.layout().unwrap()).is_err());
    }

    #[test]
    fn test_engine_config_carries_flags() {
        let cli = Cli::try_parse_from([
            "dgrep",
            "-f",
            "a.log",
            "-c",
            "7",
            "-t",
            "exports",
            "--dial-attempts",
            "4",
        ])
        .unwrap();
        let config = cli.engine_config(
            "0.0.0.0:9000".parse().unwrap(),
            Some("10.0.0.1:9000".to_string()),
        );

        assert_eq!(config.cache_capacity, 7);
        assert_eq!(config.dial_policy.max_attempts, Some(4));
        assert_eq!(config.advertise_addr.as_deref(), Some("10.0.0.1:9000"));
        assert_eq!(config.test_output_dir, Some(PathBuf::from("exports")));
        config.validate().unwrap();
    }
}
