//! Testing utilities and mock implementations.
//!
//! Mocks for every external seam (extraction tool, tag writer, lyrics
//! service) so the job pipeline can be driven end to end without network
//! access or real media.
//!
//! # Example
//!
//! ```rust,ignore
//! use snowsky_core::testing::{MockExtractor, MockLyricsProvider, MockTagger};
//!
//! let extractor = MockExtractor::new();
//! extractor.queue_failure(FailureKind::Network).await;
//!
//! let lyrics = MockLyricsProvider::new().with_lyrics("Band", "Song", lyrics);
//! ```

mod mock_extractor;
mod mock_lyrics;
mod mock_tagger;

pub use mock_extractor::{error_for_kind, MockExtractor};
pub use mock_lyrics::MockLyricsProvider;
pub use mock_tagger::MockTagger;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mock's state, ignoring poisoning from a panicked test thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::{self, Write};
    use std::path::Path;

    use crate::extractor::PlaylistEntry;

    /// Write a short mono 16-bit PCM WAV of silence.
    pub fn write_silent_wav(path: &Path) -> io::Result<()> {
        const SAMPLE_RATE: u32 = 8000;
        const SAMPLES: u32 = 800;
        let data_len = SAMPLES * 2;

        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");

        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        bytes.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes()); // byte rate
        bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
        bytes.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(44 + data_len as usize, 0);

        let mut file = std::fs::File::create(path)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Write a gradient PNG of the given size.
    pub fn write_test_png(path: &Path, width: u32, height: u32) -> io::Result<()> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        img.save_with_format(path, image::ImageFormat::Png)
            .map_err(io::Error::other)
    }

    /// A small valid JPEG.
    pub fn tiny_jpeg() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            8,
            8,
            image::Rgb([200, 10, 10]),
        ));
        let mut buffer = Vec::new();
        // Encoding an in-memory RGB image does not fail.
        let _ = img.write_to(&mut io::Cursor::new(&mut buffer), image::ImageFormat::Jpeg);
        buffer
    }

    /// Playlist entries `https://example.com/watch?v=<prefix>N`, numbered from 1.
    pub fn playlist_entries(prefix: &str, count: u32) -> Vec<PlaylistEntry> {
        (1..=count)
            .map(|index| PlaylistEntry {
                url: format!("https://example.com/watch?v={}{}", prefix, index),
                title: Some(format!("Track {}", index)),
                index,
            })
            .collect()
    }

    /// Create `root/artist/album/NN Track.ext` files; returns the album path.
    pub fn make_album(
        root: &Path,
        artist: &str,
        album: &str,
        tracks: usize,
        ext: &str,
    ) -> io::Result<std::path::PathBuf> {
        let dir = root.join(artist).join(album);
        std::fs::create_dir_all(&dir)?;
        for n in 1..=tracks {
            std::fs::write(dir.join(format!("{:02} Track {}.{}", n, n, ext)), b"audio")?;
        }
        Ok(dir)
    }
}
