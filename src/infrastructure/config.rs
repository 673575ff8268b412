// Configuration loading - file plus environment overrides
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Gateway,
    Calculator,
    Aggregator,
    All,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    Nats,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub role: Role,
    pub gateway: GatewaySettings,
    pub broker: BrokerSettings,
    pub calculator: CalculatorSettings,
    pub aggregator: AggregatorSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewaySettings {
    pub listen_addr: SocketAddr,
    pub publish_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub kind: BrokerKind,
    pub url: String,
    pub stream: String,
    pub subject_prefix: String,
    pub consumer: String,
    pub connect_timeout_ms: u64,
    pub batch_size: usize,
    pub max_wait_ms: u64,
    pub ack_wait_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalculatorSettings {
    pub listen_addr: SocketAddr,
    pub aggregator_endpoint: String,
    pub relay_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AggregatorSettings {
    pub listen_addr: SocketAddr,
    pub rate: f64,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl GatewaySettings {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

impl BrokerSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn ack_wait(&self) -> Duration {
        Duration::from_millis(self.ack_wait_ms)
    }
}

impl CalculatorSettings {
    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }
}

impl Settings {
    fn validate(self) -> Result<Self, SettingsError> {
        if !self.aggregator.rate.is_finite() || self.aggregator.rate <= 0.0 {
            return Err(SettingsError::Invalid(format!(
                "aggregator.rate must be positive, got {}",
                self.aggregator.rate
            )));
        }
        if self.gateway.publish_timeout_ms == 0 || self.calculator.relay_timeout_ms == 0 {
            return Err(SettingsError::Invalid(
                "publish and relay timeouts must be non-zero".to_string(),
            ));
        }
        if self.broker.batch_size == 0 {
            return Err(SettingsError::Invalid(
                "broker.batch_size must be non-zero".to_string(),
            ));
        }
        // A batch is acked once its fetch completes, which takes at most max_wait.
        if self.broker.ack_wait_ms <= self.broker.max_wait_ms {
            return Err(SettingsError::Invalid(format!(
                "broker.ack_wait_ms ({}) must exceed broker.max_wait_ms ({})",
                self.broker.ack_wait_ms, self.broker.max_wait_ms
            )));
        }
        if matches!(self.role, Role::Gateway | Role::Calculator)
            && self.broker.kind == BrokerKind::Memory
        {
            return Err(SettingsError::Invalid(format!(
                "role {:?} runs in its own process and needs broker.kind = \"nats\"",
                self.role
            )));
        }
        Ok(self)
    }
}

fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    config::Config::builder()
        .set_default("role", "all")?
        .set_default("gateway.listen_addr", "0.0.0.0:30000")?
        .set_default("gateway.publish_timeout_ms", 2000)?
        .set_default("broker.kind", "memory")?
        .set_default("broker.url", "nats://127.0.0.1:4222")?
        .set_default("broker.stream", "OBU_READINGS")?
        .set_default("broker.subject_prefix", "obu.readings")?
        .set_default("broker.consumer", "distance-calculator")?
        .set_default("broker.connect_timeout_ms", 5000)?
        .set_default("broker.batch_size", 64)?
        .set_default("broker.max_wait_ms", 1000)?
        .set_default("broker.ack_wait_ms", 30000)?
        .set_default("calculator.listen_addr", "0.0.0.0:30001")?
        .set_default("calculator.aggregator_endpoint", "http://127.0.0.1:3000/aggregate")?
        .set_default("calculator.relay_timeout_ms", 2000)?
        .set_default("aggregator.listen_addr", "0.0.0.0:3000")?
        .set_default("aggregator.rate", 3.15)
}

/// Load settings from `config/toll` (optional) and `TOLL__*` environment
/// variables, e.g. `TOLL__AGGREGATOR__RATE=2.0`.
pub fn load_settings() -> Result<Settings, SettingsError> {
    let settings = builder()?
        .add_source(config::File::with_name("config/toll").required(false))
        .add_source(config::Environment::with_prefix("TOLL").separator("__"))
        .build()?;

    settings.try_deserialize::<Settings>()?.validate()
}
