//! Collaborator traits for the external compute/volume registries and the
//! cloud API the monitor reconciles against (spec §4.8 describes these as
//! "the external compute registry"/"the cloud API"; REDESIGN FLAGS: pass
//! such module-level singletons as explicit constructor dependencies).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use graphnode_basic_types::Error;

#[derive(Debug, Clone)]
pub struct ComputeEntry {
    pub instance_id: String,
    pub tier: String,
}

#[derive(Debug, Clone)]
pub struct VolumeEntry {
    pub volume_id: String,
    pub instance_id: Option<String>,
    pub status: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub last_attached_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudInstanceState {
    Running,
    Stopping,
    Stopped,
    Terminated,
}

#[async_trait::async_trait]
pub trait ComputeRegistry: Send + Sync {
    /// One page of up to `limit` entries starting at `offset` (spec §4.8
    /// step 1: "page 100 at a time, cap 10k").
    async fn list_entries(&self, offset: u32, limit: u32) -> Result<Vec<ComputeEntry>, Error>;
    async fn remove_entry(&self, instance_id: &str) -> Result<(), Error>;
    async fn mark_unhealthy(&self, instance_id: &str) -> Result<(), Error>;
}

#[async_trait::async_trait]
pub trait VolumeRegistry: Send + Sync {
    async fn volumes_for_instance(&self, instance_id: &str) -> Result<Vec<VolumeEntry>, Error>;
    async fn flip_to_available(&self, volume_id: &str) -> Result<(), Error>;
    async fn flip_to_failed(&self, volume_id: &str) -> Result<(), Error>;
    async fn all_volumes(&self) -> Result<Vec<VolumeEntry>, Error>;
}

#[async_trait::async_trait]
pub trait CloudProvider: Send + Sync {
    /// Current state of every id in `instance_ids` (spec §4.8 step 3:
    /// "in batches of 1000").
    async fn describe_states(
        &self,
        instance_ids: &[String],
    ) -> Result<HashMap<String, CloudInstanceState>, Error>;
}

#[derive(Debug, Clone)]
pub struct MetricGauge {
    pub name: String,
    pub value: f64,
    pub labels: Vec<(String, String)>,
}

#[async_trait::async_trait]
pub trait MetricsSink: Send + Sync {
    async fn push_batch(&self, gauges: &[MetricGauge]) -> Result<(), Error>;
}
