//! `tag_file` (spec.md §1: "out of scope... only its contract matters"),
//! concretized per SPEC_FULL.md §6.1 as a `Tagger` trait with one
//! `lofty`-backed implementation. `Track::postprocess` calls this at its
//! interface and nothing more; frame-level tag shapes are `lofty`'s
//! concern, not ours, grounded in `other_examples/...sonami__...download.rs`'s
//! `write_metadata`.

use std::fs;
use std::path::Path;

use lofty::config::WriteOptions;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::Tag;

use crate::error::{AppError, Result, TransportError};
use crate::metadata::{AlbumMetadata, TrackMetadata};

pub trait Tagger: Send + Sync {
    /// Writes title/artist/album/tracknumber/discnumber/year plus the
    /// embed cover (if `cover_path` is set) onto the file at `path`.
    /// `album` is absent for standalone singles.
    fn tag_file(
        &self,
        path: &Path,
        track: &TrackMetadata,
        album: Option<&AlbumMetadata>,
        cover_path: Option<&Path>,
    ) -> Result<()>;
}

pub struct LoftyTagger;

impl Tagger for LoftyTagger {
    fn tag_file(
        &self,
        path: &Path,
        track: &TrackMetadata,
        album: Option<&AlbumMetadata>,
        cover_path: Option<&Path>,
    ) -> Result<()> {
        let mut tagged_file = Probe::open(path)
            .map_err(|e| tag_err(path, e))?
            .read()
            .map_err(|e| tag_err(path, e))?;

        let tag_type = tagged_file.primary_tag_type();
        let mut tag = match tagged_file.primary_tag_mut() {
            Some(t) => t.clone(),
            None => Tag::new(tag_type),
        };

        tag.set_title(track.title.clone());
        tag.set_artist(track.artist.clone());
        tag.set_track(track.track_number);
        tag.set_track_total(track.track_total);
        tag.set_disk(track.disc_number);
        tag.set_disk_total(track.disc_total);
        if let Some(isrc) = &track.isrc {
            tag.insert_text(lofty::tag::ItemKey::ISRC, isrc.clone());
        }
        if let Some(album) = album {
            tag.set_album(album.title.clone());
            tag.insert_text(lofty::tag::ItemKey::AlbumArtist, album.artist.clone());
            if let Some(year) = &album.year {
                if let Ok(y) = year.chars().take(4).collect::<String>().parse::<u32>() {
                    tag.set_year(y);
                }
            }
        }

        if let Some(cover_path) = cover_path {
            let data = fs::read(cover_path).map_err(|e| io_err(cover_path, e))?;
            let mime = mime_for(cover_path);
            tag.remove_picture_type(PictureType::CoverFront);
            tag.push_picture(Picture::new_unchecked(PictureType::CoverFront, Some(mime), None, data));
        }

        tag.save_to_path(path, WriteOptions::default())
            .map_err(|e| tag_err(path, e))?;
        Ok(())
    }
}

fn mime_for(path: &Path) -> MimeType {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => MimeType::Png,
        _ => MimeType::Jpeg,
    }
}

fn tag_err(path: &Path, e: lofty::error::LoftyError) -> AppError {
    AppError::Transport(TransportError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::other(e.to_string()),
    })
}

fn io_err(path: &Path, e: std::io::Error) -> AppError {
    AppError::Transport(TransportError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_silent_mp3(path: &Path) {
        // Minimal valid MP3 frame header lofty can probe: a single
        // MPEG1 Layer III frame at 128kbps/44.1kHz, no audio payload
        // beyond zero-fill. Good enough for lofty to recognize the
        // format and attach an ID3 tag.
        let mut file = fs::File::create(path).unwrap();
        let frame_header: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];
        file.write_all(&frame_header).unwrap();
        file.write_all(&[0u8; 200]).unwrap();
    }

    fn track() -> TrackMetadata {
        TrackMetadata {
            id: "1".to_string(),
            title: "Test Title".to_string(),
            artist: "Test Artist".to_string(),
            track_number: 3,
            track_total: 10,
            disc_number: 1,
            disc_total: 1,
            duration_seconds: 180,
            isrc: None,
            is_compilation: false,
        }
    }

    #[test]
    fn tags_a_probeable_file_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.mp3");
        write_silent_mp3(&path);
        let tagger = LoftyTagger;
        let result = tagger.tag_file(&path, &track(), None, None);
        assert!(result.is_ok(), "{result:?}");
    }
}
