//! Configuration file model and parser
//!
//! The configuration is a line-oriented text file. Each line is a key
//! followed by whitespace-separated arguments; unknown keys are ignored.
//!
//! ```text
//! server 192.168.1.2 5001
//! server 192.168.1.3 5001
//! req_size_dist conf/websearch.txt
//! dscp 10 25
//! dscp 20 75
//! rate 500Mbps 50
//! rate 0Mbps 50
//! ```

use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A target server endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    /// Server IP address or hostname
    pub ip: String,
    /// Server TCP port
    pub port: u16,
}

impl ServerSpec {
    /// Render as `ip:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// One value of a discrete weighted distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedClass {
    /// Class value (DSCP codepoint or rate in Mbps)
    pub value: u32,
    /// Relative weight
    pub weight: u32,
}

/// Parsed configuration file
#[derive(Debug, Clone)]
pub struct Config {
    /// Target servers, in file order
    pub servers: Vec<ServerSpec>,
    /// Path to the empirical flow-size CDF file
    pub size_dist_path: PathBuf,
    /// DSCP classes; defaults to `{0: 100}` when the file names none
    pub dscp: Vec<WeightedClass>,
    /// Sending-rate classes in Mbps; defaults to `{0: 100}` (unshaped)
    pub rate: Vec<WeightedClass>,
}

impl Config {
    /// Load and parse a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read configuration {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    /// Parse configuration text
    pub fn parse(text: &str) -> Result<Self> {
        let mut servers = Vec::new();
        let mut size_dist_path: Option<PathBuf> = None;
        let mut dscp = Vec::new();
        let mut rate = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            let mut fields = line.split_whitespace();
            let Some(key) = fields.next() else {
                continue;
            };

            match key {
                "server" => {
                    let ip = fields
                        .next()
                        .ok_or_else(|| bad_line(lineno, "server: missing IP"))?;
                    let port: u16 = fields
                        .next()
                        .ok_or_else(|| bad_line(lineno, "server: missing port"))?
                        .parse()
                        .map_err(|_| bad_line(lineno, "server: bad port"))?;
                    debug!("server[{}]: {}:{}", servers.len(), ip, port);
                    servers.push(ServerSpec {
                        ip: ip.to_string(),
                        port,
                    });
                }
                "req_size_dist" => {
                    let path = fields
                        .next()
                        .ok_or_else(|| bad_line(lineno, "req_size_dist: missing path"))?;
                    if size_dist_path.is_some() {
                        return Err(Error::Config(
                            "configuration must provide exactly one request size distribution"
                                .into(),
                        ));
                    }
                    debug!("request size distribution: {path}");
                    size_dist_path = Some(PathBuf::from(path));
                }
                "dscp" => {
                    let value: u32 = fields
                        .next()
                        .ok_or_else(|| bad_line(lineno, "dscp: missing value"))?
                        .parse()
                        .map_err(|_| bad_line(lineno, "dscp: bad value"))?;
                    let weight: u32 = fields
                        .next()
                        .ok_or_else(|| bad_line(lineno, "dscp: missing weight"))?
                        .parse()
                        .map_err(|_| bad_line(lineno, "dscp: bad weight"))?;
                    if value >= 64 {
                        return Err(bad_line(lineno, "dscp: value outside [0, 64)"));
                    }
                    debug!("dscp: {value}, weight: {weight}");
                    dscp.push(WeightedClass { value, weight });
                }
                "rate" => {
                    let value = fields
                        .next()
                        .ok_or_else(|| bad_line(lineno, "rate: missing value"))?;
                    let value: u32 = value
                        .strip_suffix("Mbps")
                        .ok_or_else(|| bad_line(lineno, "rate: value must end in Mbps"))?
                        .parse()
                        .map_err(|_| bad_line(lineno, "rate: bad value"))?;
                    let weight: u32 = fields
                        .next()
                        .ok_or_else(|| bad_line(lineno, "rate: missing weight"))?
                        .parse()
                        .map_err(|_| bad_line(lineno, "rate: bad weight"))?;
                    debug!("rate: {value} Mbps, weight: {weight}");
                    rate.push(WeightedClass { value, weight });
                }
                other => {
                    debug!("ignoring unknown configuration key {other:?}");
                }
            }
        }

        if servers.is_empty() {
            return Err(Error::Config(
                "configuration must provide at least one server".into(),
            ));
        }
        let size_dist_path = size_dist_path.ok_or_else(|| {
            Error::Config("configuration must provide a request size distribution".into())
        })?;

        if dscp.is_empty() {
            dscp.push(WeightedClass {
                value: 0,
                weight: 100,
            });
        }
        if rate.is_empty() {
            rate.push(WeightedClass {
                value: 0,
                weight: 100,
            });
        }

        Ok(Self {
            servers,
            size_dist_path,
            dscp,
            rate,
        })
    }
}

fn bad_line(lineno: usize, what: &str) -> Error {
    Error::Config(format!("configuration line {}: {what}", lineno + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "server 10.0.0.1 5001\n\
                        server 10.0.0.2 5002\n\
                        req_size_dist conf/websearch.txt\n\
                        dscp 10 25\n\
                        dscp 20 75\n\
                        rate 500Mbps 50\n\
                        rate 0Mbps 50\n";

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(FULL).unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].addr(), "10.0.0.1:5001");
        assert_eq!(config.size_dist_path, PathBuf::from("conf/websearch.txt"));
        assert_eq!(config.dscp, vec![
            WeightedClass { value: 10, weight: 25 },
            WeightedClass { value: 20, weight: 75 },
        ]);
        assert_eq!(config.rate, vec![
            WeightedClass { value: 500, weight: 50 },
            WeightedClass { value: 0, weight: 50 },
        ]);
    }

    #[test]
    fn test_defaults_when_classes_omitted() {
        let config = Config::parse("server 10.0.0.1 5001\nreq_size_dist d.txt\n").unwrap();
        assert_eq!(config.dscp, vec![WeightedClass { value: 0, weight: 100 }]);
        assert_eq!(config.rate, vec![WeightedClass { value: 0, weight: 100 }]);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let text = "server 10.0.0.1 5001\nreq_size_dist d.txt\nfanout 2 1\n";
        assert!(Config::parse(text).is_ok());
    }

    #[test]
    fn test_requires_server() {
        assert!(matches!(
            Config::parse("req_size_dist d.txt\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_requires_exactly_one_distribution() {
        assert!(Config::parse("server 10.0.0.1 5001\n").is_err());
        let two = "server 10.0.0.1 5001\nreq_size_dist a.txt\nreq_size_dist b.txt\n";
        assert!(Config::parse(two).is_err());
    }

    #[test]
    fn test_rejects_dscp_out_of_range() {
        let text = "server 10.0.0.1 5001\nreq_size_dist d.txt\ndscp 64 100\n";
        assert!(Config::parse(text).is_err());
    }

    #[test]
    fn test_rate_requires_mbps_suffix() {
        let text = "server 10.0.0.1 5001\nreq_size_dist d.txt\nrate 500 100\n";
        assert!(Config::parse(text).is_err());
    }
}
