//! Labeled image corpora laid out as `root/<group_id>/images/*.<ext>`.
//!
//! [`enumerate`] turns such a tree into a stable ordered list of entries;
//! [`LabelMap`] resolves group ids to human-readable labels; [`ItemRecord`]
//! is the metadata persisted per indexed item.

mod enumerate;
mod error;
mod item;
mod label_map;

pub use enumerate::{enumerate, CorpusLayout, Entry, DEFAULT_EXTENSION, DEFAULT_IMAGES_DIR};
pub use error::CorpusError;
pub use item::ItemRecord;
pub use label_map::LabelMap;
