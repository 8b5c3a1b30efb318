use serde::{Deserialize, Serialize};

use crate::{
    db::settings::LatestScan,
    domain::{
        AutoScanSettings, EmailId, ExtractedContent, LinkScanUpdate, LinkStatus, ScanResult,
        SettingsPatch,
    },
};

/// Every request the background side accepts. One handler per tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    /// Scan a single link; answered with the local verdict, upgraded later.
    #[serde(rename_all = "camelCase")]
    ScanLink { url: String },
    /// Popup-initiated scan of whatever email the user is looking at.
    #[serde(rename_all = "camelCase")]
    ScanEmail { content: ExtractedContent },
    /// Scan requested by a page session for a newly opened email.
    #[serde(rename_all = "camelCase")]
    ScanAutoEmail {
        email_id: EmailId,
        content: ExtractedContent,
    },
    #[serde(rename_all = "camelCase")]
    AutoScanUrls { urls: Vec<String> },
    GetAutoScanPreference,
    /// Most recent automatic email verdict, if any was persisted.
    GetLatestScan,
    #[serde(rename_all = "camelCase")]
    UpdateAutoScanSettings { settings: SettingsPatch },
    ResetScanStatus,
    #[serde(rename_all = "camelCase")]
    TogglePanel {
        #[serde(default)]
        visible: Option<bool>,
        page_url: String,
    },
    #[serde(rename_all = "camelCase")]
    ShowPhishingWarning { count: usize },
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Command::ScanLink { .. } => "scanLink",
            Command::ScanEmail { .. } => "scanEmail",
            Command::ScanAutoEmail { .. } => "scanAutoEmail",
            Command::AutoScanUrls { .. } => "autoScanUrls",
            Command::GetAutoScanPreference => "getAutoScanPreference",
            Command::GetLatestScan => "getLatestScan",
            Command::UpdateAutoScanSettings { .. } => "updateAutoScanSettings",
            Command::ResetScanStatus => "resetScanStatus",
            Command::TogglePanel { .. } => "togglePanel",
            Command::ShowPhishingWarning { .. } => "showPhishingWarning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    /// Provisional link verdict; the settled one follows as a bus update.
    LinkScan(LinkScanUpdate),
    EmailScan(ScanResult),
    UrlBatch { results: Vec<LinkStatus> },
    Settings(AutoScanSettings),
    LatestScan { latest: Option<LatestScan> },
    Panel { visible: bool },
    /// Auto-scan is switched off, nothing was sent.
    Disabled,
    Refused { reason: String },
    Failed { error: String },
    Ack,
}
