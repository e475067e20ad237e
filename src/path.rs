//! Filename sanitation (verbatim from the teacher's `path.rs`) plus
//! template-based folder/track path building, generalized from the
//! teacher's hardcoded `base / artist / album / NN - title` layout to
//! honor `filepaths.folder_format`/`track_format` config templates
//! (spec.md §6's Config surface table).

use std::path::{Path, PathBuf};

use crate::config::FilepathsConfig;
use crate::metadata::{AlbumMetadata, TrackMetadata};
use crate::source::Source;

/// Replace or remove characters that are invalid or problematic in
/// filesystem paths. Unchanged from the teacher.
pub fn sanitize_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '/' | '\\' | ':' => out.push('-'),
            '*' | '?' | '"' | '<' | '>' | '|' => {}
            _ => out.push(ch),
        }
    }

    let trimmed = out.trim();
    let trimmed = trimmed.trim_start_matches('.');

    let mut result = String::with_capacity(trimmed.len());
    let mut prev_space = false;
    for ch in trimmed.chars() {
        if ch == ' ' {
            if !prev_space {
                result.push(' ');
            }
            prev_space = true;
        } else {
            result.push(ch);
            prev_space = false;
        }
    }

    if result.len() > 255 {
        let mut end = 255;
        while end > 0 && !result.is_char_boundary(end) {
            end -= 1;
        }
        result.truncate(end);
    }

    result
}

/// Stricter pass applied when `filepaths.restrict_characters` is set:
/// drops everything outside printable ASCII, for targets (FAT32, old
/// Windows shares) that choke on Unicode filenames.
fn restrict_to_ascii(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii() && !c.is_ascii_control()).collect()
}

fn sanitize_with_policy(s: &str, restrict_characters: bool) -> String {
    let sanitized = sanitize_component(s);
    if restrict_characters {
        sanitize_component(&restrict_to_ascii(&sanitized))
    } else {
        sanitized
    }
}

/// Expands `{placeholder}` tokens against a small fixed set of fields.
/// Unknown placeholders are left as-is rather than erroring — a
/// misconfigured template should degrade visibly, not crash a run.
fn expand_template(template: &str, fields: &[(&str, String)]) -> String {
    let mut out = template.to_string();
    for (key, value) in fields {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

fn padded(n: u32) -> String {
    format!("{n:02}")
}

/// Builds the album folder path, honoring `source_subdirectories` (which
/// capitalizes the source name for that one path segment only — the
/// teacher's own casing rule, generalized per Open Question (a) in
/// DESIGN.md).
pub fn album_folder(
    base: &Path,
    album: &AlbumMetadata,
    filepaths: &FilepathsConfig,
    source: Source,
    source_subdirectories: bool,
) -> PathBuf {
    let artist = sanitize_with_policy(&album.artist, filepaths.restrict_characters);
    let title = sanitize_with_policy(&album.title, filepaths.restrict_characters);
    let year = album.year.clone().unwrap_or_default();

    let rendered = expand_template(
        &filepaths.folder_format,
        &[("albumartist", artist), ("album", title), ("year", year)],
    );

    let mut path = base.to_path_buf();
    if source_subdirectories {
        path = path.join(source.capitalized());
    }
    for component in rendered.split('/') {
        if !component.is_empty() {
            path = path.join(sanitize_with_policy(component, filepaths.restrict_characters));
        }
    }
    path
}

/// Builds one track's filename (without parent directories), applying
/// the compilation-aware artist prefix carried forward from the
/// teacher's `path.rs::is_compilation` rule and optional truncation.
pub fn track_filename(track: &TrackMetadata, filepaths: &FilepathsConfig, ext: &str) -> String {
    let title = sanitize_with_policy(&track.title, filepaths.restrict_characters);
    let track_artist = sanitize_with_policy(&track.artist, filepaths.restrict_characters);

    let rendered = expand_template(
        &filepaths.track_format,
        &[
            ("tracknumber", padded(track.track_number)),
            ("title", if track.is_compilation {
                format!("{track_artist} - {title}")
            } else {
                title.clone()
            }),
            ("artist", track_artist),
        ],
    );

    let mut filename = sanitize_with_policy(&rendered, filepaths.restrict_characters);
    if filepaths.truncate_to > 0 && filename.len() > filepaths.truncate_to {
        let mut end = filepaths.truncate_to;
        while end > 0 && !filename.is_char_boundary(end) {
            end -= 1;
        }
        filename.truncate(end);
    }
    format!("{filename}{ext}")
}

/// Full path for a track within an already-resolved album folder,
/// adding a `Disc N` subdirectory for multi-disc albums (teacher's rule).
pub fn track_path(album_dir: &Path, album: &AlbumMetadata, track: &TrackMetadata, filepaths: &FilepathsConfig, ext: &str) -> PathBuf {
    let mut path = album_dir.to_path_buf();
    if album.disc_total > 1 {
        path = path.join(format!("Disc {}", track.disc_number));
    }
    path.join(track_filename(track, filepaths, ext))
}

/// Path for a standalone single track (`PendingSingle`), which has no
/// enclosing album folder — only the base download directory.
pub fn single_track_path(base: &Path, track: &TrackMetadata, filepaths: &FilepathsConfig, ext: &str) -> PathBuf {
    base.join(track_filename(track, filepaths, ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filepaths() -> FilepathsConfig {
        FilepathsConfig {
            folder_format: "{albumartist}/{album}".to_string(),
            track_format: "{tracknumber} - {title}".to_string(),
            restrict_characters: false,
            truncate_to: 0,
        }
    }

    fn track(title: &str, artist: &str, number: u32) -> TrackMetadata {
        TrackMetadata {
            id: "1".to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            track_number: number,
            track_total: 10,
            disc_number: 1,
            disc_total: 1,
            duration_seconds: 180,
            isrc: None,
            is_compilation: false,
        }
    }

    #[test]
    fn sanitize_strips_forbidden_chars_and_collapses_spaces() {
        assert_eq!(sanitize_component("AC/DC: Who  Made  Who?"), "AC-DC- Who Made Who");
    }

    #[test]
    fn sanitize_trims_leading_dots_and_whitespace() {
        assert_eq!(sanitize_component("  ...hidden file.mp3"), "hidden file.mp3");
    }

    #[test]
    fn compilation_filename_prefixes_track_artist() {
        let mut t = track("Harder Better Faster Stronger", "Kanye West", 3);
        t.is_compilation = true;
        let filename = track_filename(&t, &filepaths(), ".flac");
        assert_eq!(filename, "03 - Kanye West - Harder Better Faster Stronger.flac");
    }

    #[test]
    fn non_compilation_filename_omits_artist_prefix() {
        let t = track("Homework", "Daft Punk", 1);
        let filename = track_filename(&t, &filepaths(), ".flac");
        assert_eq!(filename, "01 - Homework.flac");
    }

    #[test]
    fn truncate_to_limits_filename_length() {
        let mut fp = filepaths();
        fp.truncate_to = 10;
        let t = track("A Very Long Track Title Indeed", "Artist", 1);
        let filename = track_filename(&t, &fp, ".flac");
        assert!(filename.len() <= 10 + ".flac".len());
    }

    #[test]
    fn source_subdirectories_capitalizes_only_that_segment() {
        let album = AlbumMetadata {
            id: "1".to_string(),
            title: "Discovery".to_string(),
            artist: "Daft Punk".to_string(),
            year: Some("2001".to_string()),
            cover_url: None,
            disc_total: 1,
            tracks: vec![],
        };
        let path = album_folder(
            Path::new("/music"),
            &album,
            &filepaths(),
            Source::Qobuz,
            true,
        );
        assert_eq!(path, Path::new("/music/Qobuz/Daft Punk/Discovery"));
    }
}
