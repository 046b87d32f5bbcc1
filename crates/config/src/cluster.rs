//! Static cluster addressing.
//!
//! Every node has a fixed ordinal `1..=size`. A machine-name template and a
//! port template, both containing `{ordinal}` or `{ordinal:02}`, turn an
//! ordinal into that node's hostname and listening port. A node finds its own
//! ordinal by matching its hostname against the machine template.

use dgrep_core::{Error, Result};
use std::net::{Ipv4Addr, SocketAddr};

const ORDINAL_PLACEHOLDER: &str = "{ordinal}";
const PADDED_ORDINAL_PLACEHOLDER: &str = "{ordinal:02}";

/// Naming convention for a fixed-size cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterLayout {
    /// Number of nodes
    pub size: usize,
    /// Hostname template, e.g. `node-{ordinal:02}.example.com`
    pub machine_template: String,
    /// Port template, e.g. `90{ordinal:02}`
    pub port_template: String,
}

impl ClusterLayout {
    pub fn new(
        size: usize,
        machine_template: impl Into<String>,
        port_template: impl Into<String>,
    ) -> Result<Self> {
        let layout = Self {
            size,
            machine_template: machine_template.into(),
            port_template: port_template.into(),
        };
        layout.validate()?;
        Ok(layout)
    }

    fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::configuration("cluster size must be at least 1"));
        }
        if !has_placeholder(&self.machine_template) {
            return Err(Error::configuration(format!(
                "machine template '{}' must contain {ORDINAL_PLACEHOLDER} or {PADDED_ORDINAL_PLACEHOLDER}",
                self.machine_template
            )));
        }
        for ordinal in self.ordinals() {
            self.port_for(ordinal)?;
        }
        Ok(())
    }

    /// All ordinals in the cluster, in order
    pub fn ordinals(&self) -> impl Iterator<Item = usize> {
        1..=self.size
    }

    pub fn hostname_for(&self, ordinal: usize) -> String {
        render(&self.machine_template, ordinal)
    }

    pub fn port_for(&self, ordinal: usize) -> Result<u16> {
        let rendered = render(&self.port_template, ordinal);
        rendered.parse::<u16>().map_err(|e| {
            Error::configuration(format!(
                "port template '{}' produced invalid port '{rendered}' for node {ordinal}: {e}",
                self.port_template
            ))
        })
    }

    /// Find the ordinal whose hostname equals `hostname`
    pub fn local_ordinal(&self, hostname: &str) -> Option<usize> {
        self.ordinals()
            .find(|&ordinal| self.hostname_for(ordinal) == hostname)
    }

    /// Determine this machine's ordinal from its hostname
    pub fn detect_local_ordinal(&self) -> Result<usize> {
        let hostname = hostname::get()
            .map_err(|e| Error::configuration(format!("failed to read hostname: {e}")))?
            .to_string_lossy()
            .into_owned();

        self.local_ordinal(&hostname).ok_or_else(|| {
            Error::configuration(format!(
                "hostname '{hostname}' does not match machine template '{}' for any of {} nodes",
                self.machine_template, self.size
            ))
        })
    }

    /// Wildcard bind address for the node with this ordinal
    pub fn listen_addr_for(&self, ordinal: usize) -> Result<SocketAddr> {
        Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port_for(ordinal)?)))
    }

    /// Resolve one node's hostname into `ip:port`
    pub async fn resolve(&self, ordinal: usize) -> Result<String> {
        let host = self.hostname_for(ordinal);
        let port = self.port_for(ordinal)?;
        let mut addrs = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|e| Error::network(&host, format!("failed to resolve: {e}")))?;
        addrs
            .next()
            .map(|addr| addr.to_string())
            .ok_or_else(|| Error::network(&host, "resolved to no addresses"))
    }

    /// Resolve every node except `local` into `ip:port` peer addresses.
    ///
    /// Nodes whose hostname cannot be resolved are skipped with a warning.
    pub async fn resolve_peers(&self, local: usize) -> Vec<String> {
        let mut peers = Vec::with_capacity(self.size.saturating_sub(1));
        for ordinal in self.ordinals().filter(|&o| o != local) {
            match self.resolve(ordinal).await {
                Ok(addr) => peers.push(addr),
                Err(e) => {
                    tracing::warn!(ordinal, error = %e, "Skipping unresolvable peer");
                }
            }
        }
        peers
    }
}

fn has_placeholder(template: &str) -> bool {
    template.contains(ORDINAL_PLACEHOLDER) || template.contains(PADDED_ORDINAL_PLACEHOLDER)
}

fn render(template: &str, ordinal: usize) -> String {
    template
        .replace(PADDED_ORDINAL_PLACEHOLDER, &format!("{ordinal:02}"))
        .replace(ORDINAL_PLACEHOLDER, &ordinal.to_string())
}
