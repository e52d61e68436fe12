//! A single pooled connection and its bookkeeping (spec §3.4).

use chrono::{DateTime, Utc};
use graphnode_basic_types::GraphId;

use crate::engine::GraphEngine;

pub struct Conn {
    pub graph_id: GraphId,
    pub handle: Box<dyn GraphEngine>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub use_count: u64,
    pub is_healthy: bool,
}

impl Conn {
    pub fn new(graph_id: GraphId, handle: Box<dyn GraphEngine>) -> Self {
        let now = Utc::now();
        Self {
            graph_id,
            handle,
            created_at: now,
            last_used: now,
            use_count: 0,
            is_healthy: true,
        }
    }

    /// `created_at + ttl < now` (spec §3.4).
    pub fn is_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.created_at + ttl < now
    }

    pub fn mark_used(&mut self) {
        self.last_used = Utc::now();
        self.use_count += 1;
    }
}
