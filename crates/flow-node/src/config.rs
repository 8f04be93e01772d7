//! Node configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use flow_broker::BrokerConfig;
use flow_executor::ExecutorConfig;
use flow_ingest::IngestConfig;
use flow_ledger::LedgerConfig;
use flow_notify::NotifyConfig;
use flow_processor::ProcessorConfig;
use flow_transport::ConnectPolicy;

/// Which stages this node runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesConfig {
    #[serde(default = "default_true")]
    pub ingest: bool,
    #[serde(default = "default_true")]
    pub processor: bool,
    #[serde(default = "default_true")]
    pub executor: bool,
    #[serde(default = "default_true")]
    pub ledger: bool,
    #[serde(default = "default_true")]
    pub notify: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            ingest: true,
            processor: true,
            executor: true,
            ledger: true,
            notify: true,
        }
    }
}

/// Full node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Run the broker inside this process. Exactly one node in a
    /// deployment should.
    #[serde(default = "default_true")]
    pub embedded_broker: bool,
    /// Broker address: the bind address when embedded, the address to
    /// connect to otherwise.
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub connect: ConnectPolicy,
    /// Port for the standalone health/metrics server.
    #[serde(default = "default_ops_port")]
    pub ops_port: u16,
    #[serde(default)]
    pub stages: StagesConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

fn default_ops_port() -> u16 {
    9100
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            embedded_broker: true,
            broker: BrokerConfig::default(),
            connect: ConnectPolicy::default(),
            ops_port: default_ops_port(),
            stages: StagesConfig::default(),
            ingest: IngestConfig::default(),
            processor: ProcessorConfig::default(),
            executor: ExecutorConfig::default(),
            ledger: LedgerConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration: file (if given) first, then `FLOW_*`
    /// environment variables on top.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("FLOW").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: NodeConfig = serde_json::from_str("{}").unwrap();
        assert!(config.embedded_broker);
        assert!(config.stages.executor);
        assert_eq!(config.ops_port, 9100);
        assert_eq!(config.broker.max_redeliveries, 3);
        assert_eq!(config.connect.max_attempts, 5);
    }

    #[test]
    fn test_stage_flags_override() {
        let config: NodeConfig =
            serde_json::from_str(r#"{"stages": {"executor": false}}"#).unwrap();
        assert!(!config.stages.executor);
        assert!(config.stages.ingest);
    }
}
