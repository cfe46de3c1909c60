// ── Device records ──
//
// The device list is surfaced as raw records. Known fields are typed; the
// rest is kept verbatim in `extra` for device-level code to interpret.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::manager::Manager;

/// One entry of `/cloud/v1/deviceManaged/devices`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(default)]
    pub cid: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub device_name: String,
    /// Model code, e.g. `Core300S`.
    #[serde(default)]
    pub device_type: String,
    /// Product category, e.g. `wifi-air`.
    #[serde(default, rename = "type")]
    pub product_type: Option<String>,
    #[serde(default)]
    pub config_module: Option<String>,
    #[serde(default, rename = "macID")]
    pub mac_id: Option<String>,
    #[serde(default)]
    pub connection_status: Option<String>,
    #[serde(default)]
    pub device_status: Option<String>,
    #[serde(default)]
    pub sub_device_no: Option<Value>,
    #[serde(default)]
    pub device_region: Option<String>,
    /// Result of the last detail refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceRecord {
    pub fn is_online(&self) -> bool {
        self.connection_status.as_deref() == Some("online")
    }
}

/// One page of the device list result.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeviceListPage {
    #[serde(default)]
    pub list: Option<Vec<DeviceRecord>>,
    #[serde(default)]
    pub total: Option<usize>,
}

/// Per-device detail fetch run by [`Manager::update`].
///
/// Implementations issue their own calls through
/// [`Manager::call_api`] and return the detail payload, or `None` when
/// nothing could be fetched.
#[async_trait]
pub trait DetailRefresher: Send + Sync {
    async fn refresh(&self, manager: &Manager, device: &DeviceRecord) -> Option<Value>;
}
