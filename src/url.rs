//! URL parsing: a reference `https://www.qobuz.com/...` or similar is
//! reduced to `(Source, MediaType, id)`. Wire-level URL shapes per
//! backend are out of scope for this crate (spec.md §1); the patterns
//! below are intentionally the minimal realistic shape for each source.

use regex::Regex;
use std::sync::OnceLock;

use crate::source::{MediaType, Source};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub source: Source,
    pub media_type: MediaType,
    pub id: String,
}

struct Pattern {
    source: Source,
    media_type: MediaType,
    regex: Regex,
}

fn patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let specs: &[(Source, MediaType, &str)] = &[
            (Source::Qobuz, MediaType::Album, r"qobuz\.com/.*?/album/[\w-]+/(?P<id>[\w-]+)"),
            (Source::Qobuz, MediaType::Track, r"qobuz\.com/.*?/track/[\w-]+/(?P<id>[\w-]+)"),
            (Source::Qobuz, MediaType::Playlist, r"qobuz\.com/.*?/playlist/(?P<id>[\w-]+)"),
            (Source::Qobuz, MediaType::Artist, r"qobuz\.com/.*?/artist/(?P<id>[\w-]+)"),
            (Source::Qobuz, MediaType::Label, r"qobuz\.com/.*?/label/(?P<id>[\w-]+)"),
            (Source::Tidal, MediaType::Album, r"tidal\.com/(?:browse/)?album/(?P<id>\d+)"),
            (Source::Tidal, MediaType::Track, r"tidal\.com/(?:browse/)?track/(?P<id>\d+)"),
            (Source::Tidal, MediaType::Playlist, r"tidal\.com/(?:browse/)?playlist/(?P<id>[\w-]+)"),
            (Source::Tidal, MediaType::Artist, r"tidal\.com/(?:browse/)?artist/(?P<id>\d+)"),
            (Source::Deezer, MediaType::Album, r"deezer\.com/.*?/album/(?P<id>\d+)"),
            (Source::Deezer, MediaType::Track, r"deezer\.com/.*?/track/(?P<id>\d+)"),
            (Source::Deezer, MediaType::Playlist, r"deezer\.com/.*?/playlist/(?P<id>\d+)"),
            (Source::Deezer, MediaType::Artist, r"deezer\.com/.*?/artist/(?P<id>\d+)"),
            (Source::Soundcloud, MediaType::Track, r"soundcloud\.com/(?P<id>[\w-]+/[\w-]+)$"),
            (Source::Soundcloud, MediaType::Playlist, r"soundcloud\.com/(?P<id>[\w-]+/sets/[\w-]+)"),
            (Source::Lastfm, MediaType::Playlist, r"last\.fm/.*?/playlists/(?P<id>\d+)"),
        ];
        specs
            .iter()
            .map(|(source, media_type, pattern)| Pattern {
                source: *source,
                media_type: *media_type,
                regex: Regex::new(pattern).expect("static url pattern is valid"),
            })
            .collect()
    })
}

/// Parse a user-supplied URL into `(source, media_type, id)`.
/// Returns `None` on anything unrecognized; the caller reports it
/// per-URL and continues (spec.md §7, Reference errors).
pub fn parse_url(url: &str) -> Option<ParsedUrl> {
    for pattern in patterns() {
        if let Some(caps) = pattern.regex.captures(url) {
            return Some(ParsedUrl {
                source: pattern.source,
                media_type: pattern.media_type,
                id: caps.name("id")?.as_str().to_string(),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_qobuz_album() {
        let p = parse_url("https://www.qobuz.com/us-en/album/some-title/abcdefg123").unwrap();
        assert_eq!(p.source, Source::Qobuz);
        assert_eq!(p.media_type, MediaType::Album);
        assert_eq!(p.id, "abcdefg123");
    }

    #[test]
    fn parses_tidal_track() {
        let p = parse_url("https://tidal.com/browse/track/123456789").unwrap();
        assert_eq!(p.source, Source::Tidal);
        assert_eq!(p.media_type, MediaType::Track);
        assert_eq!(p.id, "123456789");
    }

    #[test]
    fn parses_deezer_playlist() {
        let p = parse_url("https://www.deezer.com/en/playlist/908622995").unwrap();
        assert_eq!(p.source, Source::Deezer);
        assert_eq!(p.media_type, MediaType::Playlist);
    }

    #[test]
    fn parses_soundcloud_track() {
        let p = parse_url("https://soundcloud.com/some-artist/some-track").unwrap();
        assert_eq!(p.source, Source::Soundcloud);
        assert_eq!(p.media_type, MediaType::Track);
        assert_eq!(p.id, "some-artist/some-track");
    }

    #[test]
    fn parses_lastfm_playlist() {
        let p = parse_url("https://www.last.fm/user/someone/playlists/123").unwrap();
        assert_eq!(p.source, Source::Lastfm);
        assert_eq!(p.id, "123");
    }

    #[test]
    fn rejects_unknown_url() {
        assert!(parse_url("https://example.com/whatever").is_none());
    }
}
