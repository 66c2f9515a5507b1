//! Content model and storage for the daily picture pipeline.
//!
//! This library holds everything the generation and display paths share:
//!
//! - [`record`]: the persisted [`DailyRecord`], the transient
//!   [`HistoricalEvent`] returned by the event-selection model, art styles
//!   and device profiles.
//! - [`keys`]: the fixed object-key scheme (`images/{date}/...`).
//! - [`store`]: the async [`ContentStore`] trait with S3 and in-memory
//!   implementations, including SigV4 presigned read URLs.
//! - [`imaging`]: cover-resize / grayscale / date-banner post-processing
//!   into device-targeted JPEG variants.
//! - [`resilience`]: the ordered date fallback chain used by the read path.

pub mod imaging;
pub mod keys;
pub mod record;
pub mod resilience;
pub mod store;

pub use imaging::{ImagingError, Overlay, PostProcessor, ProcessedImage, VariantSpec};
pub use record::{month_name, ArtStyle, DailyRecord, DeviceProfile, EventParseError, HistoricalEvent};
pub use resilience::{DateFallbackChain, DegradationLevel, Resolved};
pub use store::{ContentStore, MemoryContentStore, S3Config, S3ContentStore, StoreError};
