/*!
 * Text handling for the narration pipeline.
 *
 * - `splitter`: sentence segmentation and request-sized chunk packing
 * - `timing`: proportional time budget for each sentence
 * - `caption`: word wrapping and filter-safe caption escaping
 * - `font`: glyph measurement and rasterisation for captions
 */

pub mod caption;
pub mod font;
pub mod splitter;
pub mod timing;

pub use caption::{escape_drawtext, wrap_caption, FixedAdvance, TextMeasure};
pub use font::CaptionFont;
pub use splitter::{pack_sentences, split_sentences};
pub use timing::{allocate_durations, build_timeline, TimedUnit};
