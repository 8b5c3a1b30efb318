use serde::{Deserialize, Serialize};

/// User preferences that survive restarts. They gate automatic scanning but
/// play no part in the scan state machine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoScanSettings {
    pub enabled: bool,
    pub scan_interval_ms: u64,
    pub notify_on_phishing: bool,
}

impl Default for AutoScanSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_ms: 30_000,
            notify_on_phishing: true,
        }
    }
}

impl AutoScanSettings {
    pub fn merge(self, patch: SettingsPatch) -> Self {
        Self {
            enabled: patch.enabled.unwrap_or(self.enabled),
            scan_interval_ms: patch.scan_interval_ms.unwrap_or(self.scan_interval_ms),
            notify_on_phishing: patch.notify_on_phishing.unwrap_or(self.notify_on_phishing),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub enabled: Option<bool>,
    pub scan_interval_ms: Option<u64>,
    pub notify_on_phishing: Option<bool>,
}
