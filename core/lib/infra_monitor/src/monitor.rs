//! Reconciliation between the external compute/volume registries and live
//! cloud state (spec §4.8), grounded on the polling/batching shape of
//! `core/bin/zksync_core/src/gateway_watcher.rs` (`futures::stream` +
//! `buffer_unordered` rather than a hand-rolled worker pool).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use futures::{stream, StreamExt};
use graphnode_basic_types::Error;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::registries::{
    CloudInstanceState, CloudProvider, ComputeRegistry, MetricGauge, MetricsSink, VolumeRegistry,
};

static INSTANCE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^i-[0-9a-f]{8,17}$").expect("static regex is valid"));

const PAGE_SIZE: u32 = 100;
const PAGE_CAP: u32 = 10_000;
const CLOUD_BATCH_SIZE: usize = 1000;
const METRICS_BATCH_SIZE: usize = 20;
const CONCURRENT_BATCHES: usize = 8;

const STALE_DELETED_AFTER_DAYS: i64 = 7;
const STALE_UNATTACHED_AFTER_DAYS: i64 = 30;

#[derive(Debug, Clone, Default)]
pub struct HealthCheckSummary {
    pub healthy: u32,
    pub unhealthy: u32,
    pub terminated: u32,
    pub invalid_format: u32,
}

#[derive(Debug, Clone, Default)]
pub struct CleanupSummary {
    pub removed: u32,
    pub flipped: u32,
}

pub struct InfrastructureMonitor {
    compute: Arc<dyn ComputeRegistry>,
    volumes: Arc<dyn VolumeRegistry>,
    cloud: Arc<dyn CloudProvider>,
    metrics: Arc<dyn MetricsSink>,
}

impl InfrastructureMonitor {
    pub fn new(
        compute: Arc<dyn ComputeRegistry>,
        volumes: Arc<dyn VolumeRegistry>,
        cloud: Arc<dyn CloudProvider>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            compute,
            volumes,
            cloud,
            metrics,
        }
    }

    /// spec §4.8 `check_instance_health`.
    pub async fn check_instance_health(&self) -> Result<HealthCheckSummary, Error> {
        let entries = self.paginate_all_compute_entries().await?;

        let (valid, invalid): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| INSTANCE_ID_RE.is_match(&e.instance_id));

        let mut summary = HealthCheckSummary {
            invalid_format: invalid.len() as u32,
            ..Default::default()
        };
        for entry in &invalid {
            warn!(instance_id = %entry.instance_id, "compute entry has invalid instance id format");
        }

        let ids: Vec<String> = valid.iter().map(|e| e.instance_id.clone()).collect();
        let states = self.describe_in_batches(&ids).await?;

        for entry in &valid {
            let state = states.get(&entry.instance_id).copied();
            match state {
                Some(CloudInstanceState::Running) => summary.healthy += 1,
                Some(CloudInstanceState::Terminated) => {
                    self.cascade_terminate(&entry.instance_id).await?;
                    summary.terminated += 1;
                }
                Some(CloudInstanceState::Stopping) | Some(CloudInstanceState::Stopped) | None => {
                    self.compute.mark_unhealthy(&entry.instance_id).await?;
                    summary.unhealthy += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn cascade_terminate(&self, instance_id: &str) -> Result<(), Error> {
        let volumes = self.volumes.volumes_for_instance(instance_id).await?;
        for volume in volumes {
            self.volumes.flip_to_available(&volume.volume_id).await?;
        }
        self.compute.remove_entry(instance_id).await
    }

    async fn paginate_all_compute_entries(
        &self,
    ) -> Result<Vec<crate::registries::ComputeEntry>, Error> {
        let mut all = Vec::new();
        let mut offset = 0u32;
        loop {
            let page = self.compute.list_entries(offset, PAGE_SIZE).await?;
            let page_len = page.len();
            all.extend(page);
            offset += PAGE_SIZE;
            if page_len < PAGE_SIZE as usize || offset >= PAGE_CAP {
                break;
            }
        }
        Ok(all)
    }

    async fn describe_in_batches(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, CloudInstanceState>, Error> {
        let batches: Vec<Vec<String>> = ids
            .chunks(CLOUD_BATCH_SIZE)
            .map(|c| c.to_vec())
            .collect();

        let results: Vec<Result<HashMap<String, CloudInstanceState>, Error>> =
            stream::iter(batches)
                .map(|batch| {
                    let cloud = self.cloud.clone();
                    async move { cloud.describe_states(&batch).await }
                })
                .buffer_unordered(CONCURRENT_BATCHES)
                .collect()
                .await;

        let mut merged = HashMap::with_capacity(ids.len());
        for result in results {
            merged.extend(result?);
        }
        Ok(merged)
    }

    /// spec §4.8 `cleanup_stale_graphs`: removes compute registry entries
    /// whose referenced compute no longer exists in the cloud.
    pub async fn cleanup_stale_graphs(&self) -> Result<CleanupSummary, Error> {
        let entries = self.paginate_all_compute_entries().await?;
        let ids: Vec<String> = entries.iter().map(|e| e.instance_id.clone()).collect();
        let states = self.describe_in_batches(&ids).await?;

        let mut summary = CleanupSummary::default();
        for entry in entries {
            if !states.contains_key(&entry.instance_id) {
                self.compute.remove_entry(&entry.instance_id).await?;
                summary.removed += 1;
            }
        }
        Ok(summary)
    }

    /// spec §4.8 `cleanup_stale_volumes`.
    pub async fn cleanup_stale_volumes(&self) -> Result<CleanupSummary, Error> {
        let volumes = self.volumes.all_volumes().await?;
        let now = Utc::now();
        let known_instances: HashSet<String> = self
            .paginate_all_compute_entries()
            .await?
            .into_iter()
            .map(|e| e.instance_id)
            .collect();

        let mut summary = CleanupSummary::default();
        for volume in volumes {
            let deleted_stale = volume
                .deleted_at
                .is_some_and(|t| now - t > ChronoDuration::days(STALE_DELETED_AFTER_DAYS));
            let unattached_stale = volume.status == "unattached"
                && volume
                    .last_attached_at
                    .is_some_and(|t| now - t > ChronoDuration::days(STALE_UNATTACHED_AFTER_DAYS));

            if deleted_stale || unattached_stale {
                summary.removed += 1;
                continue;
            }

            if volume.status == "attaching" {
                let attaching_to_missing = volume
                    .instance_id
                    .as_ref()
                    .is_some_and(|id| !known_instances.contains(id));
                if attaching_to_missing {
                    self.volumes.flip_to_failed(&volume.volume_id).await?;
                    summary.flipped += 1;
                }
            }
        }
        Ok(summary)
    }

    /// spec §4.8 `collect_metrics`: per-instance + cluster-wide gauges,
    /// pushed in batches of 20.
    pub async fn collect_metrics(&self) -> Result<(), Error> {
        let entries = self.paginate_all_compute_entries().await?;
        let mut tier_counts: HashMap<String, u32> = HashMap::new();
        for entry in &entries {
            *tier_counts.entry(entry.tier.clone()).or_insert(0) += 1;
        }

        let mut gauges: Vec<MetricGauge> = entries
            .iter()
            .map(|e| MetricGauge {
                name: "graphnode_instance_present".into(),
                value: 1.0,
                labels: vec![
                    ("instance_id".into(), e.instance_id.clone()),
                    ("tier".into(), e.tier.clone()),
                ],
            })
            .collect();

        gauges.push(MetricGauge {
            name: "graphnode_instance_count".into(),
            value: entries.len() as f64,
            labels: vec![],
        });
        for (tier, count) in tier_counts {
            gauges.push(MetricGauge {
                name: "graphnode_instance_tier_count".into(),
                value: count as f64,
                labels: vec![("tier".into(), tier)],
            });
        }

        for batch in gauges.chunks(METRICS_BATCH_SIZE) {
            self.metrics.push_batch(batch).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_regex_matches_aws_style_ids() {
        assert!(INSTANCE_ID_RE.is_match("i-0a1b2c3d"));
        assert!(INSTANCE_ID_RE.is_match("i-0123456789abcdef0"));
        assert!(!INSTANCE_ID_RE.is_match("not-an-id"));
        assert!(!INSTANCE_ID_RE.is_match("i-XYZ"));
    }
}
