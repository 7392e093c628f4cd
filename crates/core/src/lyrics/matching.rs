//! Query normalization for lyrics lookups.

use regex_lite::Regex;
use std::path::Path;

/// Separators that join featured artists.
const ARTIST_SEPARATORS: &[&str] = &[" feat.", " ft.", " feat ", " ft ", " & ", " / ", ", ", " x "];

/// The full artist string first, then the primary artist before any separator.
pub fn artist_candidates(artist: &str) -> Vec<String> {
    let artist = artist.trim();
    let mut candidates = vec![artist.to_string()];

    let lower = artist.to_lowercase();
    let cut = ARTIST_SEPARATORS
        .iter()
        .filter_map(|sep| lower.find(sep))
        .min();

    if let Some(idx) = cut {
        // Separators are ASCII so the byte offset is valid in the original string
        let primary = artist[..idx].trim();
        if !primary.is_empty() && primary != artist {
            candidates.push(primary.to_string());
        }
    }

    candidates
}

/// Remove "(Official Video)", "[Lyric Video]", "(Audio)" and similar decorations.
pub fn clean_title(title: &str) -> String {
    let cleaned = match Regex::new(r"(?i)\s*[\(\[](official.*?|music.*?|lyric.*?|audio.*?)[\)\]]") {
        Ok(re) => re.replace_all(title, "").into_owned(),
        Err(_) => title.to_string(),
    };
    cleaned.trim().to_string()
}

/// Title guessed from a file name: stem without a leading track number.
pub fn title_from_filename(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    match Regex::new(r"^\d+[\s._-]+") {
        Ok(re) => re.replace(&stem, "").trim().to_string(),
        Err(_) => stem.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artist_candidates() {
        assert_eq!(artist_candidates("Solo"), vec!["Solo"]);
        assert_eq!(
            artist_candidates("Main feat. Guest"),
            vec!["Main feat. Guest", "Main"]
        );
        assert_eq!(
            artist_candidates("A & B, C"),
            vec!["A & B, C", "A"]
        );
        assert_eq!(artist_candidates("Duo x Other"), vec!["Duo x Other", "Duo"]);
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("Song (Official Video)"), "Song");
        assert_eq!(clean_title("Song [Lyric Video]"), "Song");
        assert_eq!(clean_title("Song (official music video)"), "Song");
        assert_eq!(clean_title("Song (Live)"), "Song (Live)");
    }

    #[test]
    fn test_title_from_filename() {
        assert_eq!(title_from_filename(Path::new("/a/03 - Song.flac")), "Song");
        assert_eq!(title_from_filename(Path::new("/a/07. Other.mp3")), "Other");
        assert_eq!(title_from_filename(Path::new("/a/Plain.mp3")), "Plain");
    }
}
