//! Outage schedule data: where it lives, how its hour table is read, and how
//! it is rendered for the region's local calendar.

pub mod parser;
pub mod region_time;
pub mod render;

pub const DEFAULT_IMAGES_BASE_URL: &str =
    "https://raw.githubusercontent.com/Baskerville42/outage-data-ua/main/images/";
pub const DEFAULT_DATA_BASE_URL: &str =
    "https://raw.githubusercontent.com/Baskerville42/outage-data-ua/main/data/";

/// Base URLs of the outage-data repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEndpoints {
    pub images_base_url: String,
    pub data_base_url: String,
}

impl Default for ScheduleEndpoints {
    fn default() -> Self {
        Self {
            images_base_url: DEFAULT_IMAGES_BASE_URL.to_string(),
            data_base_url: DEFAULT_DATA_BASE_URL.to_string(),
        }
    }
}

impl ScheduleEndpoints {
    /// Groups are written `3.1` in the data but `3-1` in image file names.
    pub fn image_url(&self, region: &str, group: &str) -> String {
        let group_slug = group.replace('.', "-");
        format!(
            "{}{region}/gpv-{group_slug}-emergency.png",
            self.images_base_url
        )
    }

    pub fn data_url(&self, region: &str) -> String {
        format!("{}{region}.json", self.data_base_url)
    }
}
