use crate::core::transform::{classify_status, details_or_placeholder, LaunchStatus};
use crate::domain::model::{CleanRecord, RawRecord};
use crate::domain::ports::Transformer;
use serde::{Deserialize, Serialize};

/// One past launch with every link flattened to the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSummary {
    pub flight_number: u64,
    pub mission_name: String,
    pub date: Option<String>,
    pub success: bool,
    pub status: LaunchStatus,
    pub details: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub article_url: Option<String>,
    pub rocket_id: Option<String>,
}

impl CleanRecord for LaunchSummary {
    const FIELDS: &'static [&'static str] = &[
        "flight_number",
        "mission_name",
        "date",
        "success",
        "status",
        "details",
        "image_url",
        "video_url",
        "article_url",
        "rocket_id",
    ];
}

/// SpaceX v4 launch → [`LaunchSummary`]. A launch with no recorded outcome
/// counts as a failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchTransformer;

impl Transformer for LaunchTransformer {
    type Output = LaunchSummary;

    fn transform(&self, raw: &RawRecord) -> LaunchSummary {
        let success = raw.bool_field("success").unwrap_or(false);

        LaunchSummary {
            flight_number: raw.u64_field("flight_number").unwrap_or(0),
            mission_name: raw.str_field("name").unwrap_or_default().to_string(),
            date: raw.str_field("date_utc").map(str::to_string),
            success,
            status: classify_status(success),
            details: details_or_placeholder(raw.str_field("details")),
            image_url: raw.path_str(&["links", "patch", "small"]).map(str::to_string),
            video_url: raw.path_str(&["links", "webcast"]).map(str::to_string),
            article_url: raw.path_str(&["links", "article"]).map(str::to_string),
            rocket_id: raw.str_field("rocket").map(str::to_string),
        }
    }
}
