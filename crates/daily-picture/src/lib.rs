//! Daily historical-event artwork for e-paper frames.
//!
//! Once a day a text model picks an event that happened on today's date, an
//! image model renders it, and the result is post-processed into grayscale
//! renditions sized for the supported panels. Devices poll
//! `GET /api/display` and receive a short-lived URL for the newest picture
//! their panel can show, falling back to yesterday's when today's is not
//! ready yet.

pub mod config;
pub mod display;
pub mod errors;
pub mod generator;
pub mod prompts;
pub mod providers;
pub mod scheduler;
pub mod server;
pub mod state_machine;
