use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use tokio::process::Command;

use crate::configuration::types::AcquisitionConfig;
use crate::error_handling::types::AcquisitionError;
use crate::extraction::types::SourceKind;

/// Capability to fetch one source's raw telemetry text.
///
/// The pipeline core never runs remote commands itself; it consumes whatever
/// text this seam hands back, which keeps the whole pipeline testable with
/// canned fixtures.
#[async_trait]
pub trait Acquirer: Send + Sync {
    async fn fetch_raw(&self, kind: SourceKind) -> Result<String, AcquisitionError>;
}

/// Runs the operator-configured shell command for a source, typically an ssh
/// invocation against the gateway, and returns its stdout.
pub struct CommandAcquirer {
    config: AcquisitionConfig,
}

impl CommandAcquirer {
    pub fn new(config: AcquisitionConfig) -> Self {
        Self { config }
    }

    fn command_for(&self, kind: SourceKind) -> Option<&str> {
        match kind {
            SourceKind::ConnectionLog => self.config.connection_log.as_deref(),
            SourceKind::SocketTable => self.config.socket_table.as_deref(),
            SourceKind::Conntrack => self.config.conntrack.as_deref(),
            SourceKind::VpnPeer => self.config.vpn_peers.as_deref(),
            SourceKind::ProbeLog => self.config.probe_log.as_deref(),
        }
    }
}

#[async_trait]
impl Acquirer for CommandAcquirer {
    async fn fetch_raw(&self, kind: SourceKind) -> Result<String, AcquisitionError> {
        let command = self
            .command_for(kind)
            .ok_or(AcquisitionError::NotConfigured)?;
        debug!("acquiring {} via: {}", kind, command);
        let output = Command::new("sh").arg("-c").arg(command).output().await?;
        if !output.status.success() {
            return Err(AcquisitionError::CommandFailed(format!(
                "{} exited with {}",
                kind, output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Canned-text acquirer for tests and one-shot replays.
#[derive(Default)]
pub struct StaticAcquirer {
    blobs: HashMap<SourceKind, String>,
}

impl StaticAcquirer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(mut self, kind: SourceKind, text: &str) -> Self {
        self.blobs.insert(kind, text.to_string());
        self
    }
}

#[async_trait]
impl Acquirer for StaticAcquirer {
    async fn fetch_raw(&self, kind: SourceKind) -> Result<String, AcquisitionError> {
        self.blobs
            .get(&kind)
            .cloned()
            .ok_or(AcquisitionError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn command_acquirer_captures_stdout() {
        let config = AcquisitionConfig {
            socket_table: Some("printf 'tcp 0 0 1.2.3.4:80 5.6.7.8:9\\n'".into()),
            ..Default::default()
        };
        let acquirer = CommandAcquirer::new(config);
        let raw = acquirer.fetch_raw(SourceKind::SocketTable).await.unwrap();
        assert!(raw.contains("1.2.3.4:80"));
    }

    #[tokio::test]
    async fn command_failure_is_reported() {
        let config = AcquisitionConfig {
            conntrack: Some("exit 3".into()),
            ..Default::default()
        };
        let acquirer = CommandAcquirer::new(config);
        let err = acquirer.fetch_raw(SourceKind::Conntrack).await;
        assert!(matches!(err, Err(AcquisitionError::CommandFailed(_))));
    }

    #[tokio::test]
    async fn unconfigured_source_is_not_configured() {
        let acquirer = CommandAcquirer::new(AcquisitionConfig::default());
        let err = acquirer.fetch_raw(SourceKind::VpnPeer).await;
        assert!(matches!(err, Err(AcquisitionError::NotConfigured)));
    }

    #[tokio::test]
    async fn static_acquirer_serves_blobs() {
        let acquirer = StaticAcquirer::new().with_blob(SourceKind::ProbeLog, "DROP SRC=1.2.3.4");
        assert!(acquirer.fetch_raw(SourceKind::ProbeLog).await.is_ok());
        assert!(acquirer.fetch_raw(SourceKind::Conntrack).await.is_err());
    }
}
