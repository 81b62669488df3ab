use crate::pipeline::DEFAULT_BUFFER_LIMIT;
use crate::tail::session::DEFAULT_CLOSE_DEADLINE;
use crate::tail::{RetryPolicy, TailConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cloud: CloudConfig,
    pub tail: TailSettings,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Websocket endpoint of the logs tail service (ws:// or wss://)
    pub logs_tail_url: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailSettings {
    pub reference_id: String,
    /// How far back the first connection starts
    #[serde(with = "humantime_serde", default = "default_tail_from")]
    pub tail_from: Duration,
}

fn default_tail_from() -> Duration {
    Duration::from_secs(5 * 60)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(with = "humantime_serde", default = "default_base_interval")]
    pub base_interval: Duration,
    #[serde(with = "humantime_serde", default = "default_max_interval")]
    pub max_interval: Duration,
}

fn default_attempts() -> u32 {
    3
}

fn default_base_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_interval() -> Duration {
    Duration::from_secs(2 * 60)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            base_interval: default_base_interval(),
            max_interval: default_max_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_buffer_limit")]
    pub buffer_limit: usize,
    #[serde(with = "humantime_serde", default = "default_close_deadline")]
    pub close_deadline: Duration,
}

fn default_buffer_limit() -> usize {
    DEFAULT_BUFFER_LIMIT
}

fn default_close_deadline() -> Duration {
    DEFAULT_CLOSE_DEADLINE
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_limit: default_buffer_limit(),
            close_deadline: default_close_deadline(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, self.base_interval, self.max_interval)
    }
}

impl Config {
    /// Connection settings for [`crate::tail::LogTailer`]
    pub fn tail_config(&self) -> TailConfig {
        TailConfig {
            logs_tail_url: self.cloud.logs_tail_url.clone(),
            token: self.cloud.token.clone(),
            retry: self.retry.policy(),
            buffer_limit: self.pipeline.buffer_limit,
            close_deadline: self.pipeline.close_deadline,
        }
    }
}
