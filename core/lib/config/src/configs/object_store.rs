// External uses
use serde::Deserialize;
// Local uses
use crate::envy_load;

/// Cloud-object-storage credentials the staging connection pool installs
/// into every new DuckDB/analytical-engine connection (spec §4.3, §6:
/// `ACCESS_KEY_ID`, `SECRET_ACCESS_KEY`, `REGION`, `ENDPOINT`). Field names
/// are bare (no common prefix) because they mirror the well-known AWS SDK
/// environment variable names a cloud emulator also expects.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct ObjectStoreConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    /// Non-AWS endpoint, e.g. a local `minio`/emulator. Presence of this
    /// field also switches the client to path-style addressing (§4.3).
    pub endpoint: Option<String>,
}

impl ObjectStoreConfig {
    pub fn from_env() -> Self {
        envy_load!("object_store", "")
    }

    pub fn has_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    pub fn uses_path_style(&self) -> bool {
        self.endpoint.is_some()
    }
}
