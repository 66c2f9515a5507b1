//! Object-key scheme for the content store.
//!
//! ```text
//! images/{YYYY-MM-DD}/{variant-key}    binary image variant
//! images/{YYYY-MM-DD}/metadata.json    DailyRecord JSON
//! ```

use chrono::NaiveDate;

/// Top-level prefix every object lives under.
pub const IMAGE_PREFIX: &str = "images";
/// File name of the per-date metadata record.
pub const METADATA_FILE: &str = "metadata.json";

/// ISO-8601 calendar date used as the partition key (`2024-07-04`).
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Key of an image variant for the given date.
pub fn image_key(date: NaiveDate, variant_key: &str) -> String {
    format!("{IMAGE_PREFIX}/{}/{variant_key}", date_key(date))
}

/// Key of the metadata record for the given date.
pub fn metadata_key(date: NaiveDate) -> String {
    format!("{IMAGE_PREFIX}/{}/{METADATA_FILE}", date_key(date))
}
