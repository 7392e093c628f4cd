//! Post-processing of extracted audio.
//!
//! Steps run in order: tags (required), cover art, lyrics, cleanup of
//! intermediate files. Everything after tagging is best effort and only
//! logged on failure. Re-running on a processed file overwrites tag values
//! and keeps a single front cover.

mod artwork;
mod cleanup;
mod processor;
mod tagger;

pub use artwork::{
    ensure_folder_cover, find_cover_source, prepare_cover, render_cover, render_cover_file,
    resized_cover_path, ArtworkError, COVER_SIZE, FOLDER_COVER_FALLBACKS, FOLDER_COVER_NAME,
    RESIZED_COVER_SUFFIX,
};
pub use cleanup::{remove_with_retry, remove_with_retry_using, REMOVE_ATTEMPTS, REMOVE_RETRY_DELAY};
pub use processor::{
    lyrics_path, write_lyrics_sidecar, LyricsOutcome, PostProcessContext, PostProcessError,
    PostProcessReport, PostProcessor, UNKNOWN_ARTIST,
};
pub use tagger::{LoftyTagger, TagSet, TagSummary, Tagger, TaggerError};
