pub mod email;
pub mod events;
pub mod result;
pub mod settings;

pub use email::{EmailId, ExtractedContent};
pub use events::{AnalysisType, LinkScanUpdate, UiEvent};
pub use result::{LinkStatus, ResultOrigin, ScanResult, Verdict};
pub use settings::{AutoScanSettings, SettingsPatch};
