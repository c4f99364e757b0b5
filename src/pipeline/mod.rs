/*!
 * Pipeline entry points.
 *
 * `VideoPipeline` runs one request end to end: assets, narration, sentence
 * timing, caption translation, segment rendering and assembly. `record`
 * holds the heritage record input format used by the record and batch entry
 * points.
 */

pub mod orchestrator;
pub mod record;

pub use orchestrator::{RunState, VideoPipeline, VideoResponse};
pub use record::{HeritageRecord, LengthVariant};
