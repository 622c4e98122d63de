//! Media platform adapters for musicbot.
//!
//! A platform knows how to recognise its own track references in free text and
//! URLs. Everything else it offers (lyrics, search, track metadata) is an
//! optional capability with an `Unsupported` default.

mod error;
mod pattern;
mod quality;
mod registry;
mod shortlink;
mod traits;
mod types;

pub use error::{PlatformError, Result};
pub use pattern::{PatternPlatform, PatternSpec};
pub use quality::{Quality, QualityError};
pub use registry::Registry;
pub use shortlink::{HttpShortLinkResolver, ShortLinkResolver, find_short_link};
pub use traits::Platform;
pub use types::{LyricLine, Lyrics, PlatformMetadata, Track, TrackRef};
