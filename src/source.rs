use std::fmt;

/// A streaming backend identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Qobuz,
    Tidal,
    Deezer,
    Soundcloud,
    Lastfm,
}

impl Source {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "qobuz" => Some(Source::Qobuz),
            "tidal" => Some(Source::Tidal),
            "deezer" => Some(Source::Deezer),
            "soundcloud" => Some(Source::Soundcloud),
            "lastfm" | "last.fm" => Some(Source::Lastfm),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Qobuz => "qobuz",
            Source::Tidal => "tidal",
            Source::Deezer => "deezer",
            Source::Soundcloud => "soundcloud",
            Source::Lastfm => "lastfm",
        }
    }

    /// Capitalized form, used only for the `source_subdirectories` folder
    /// segment (see `PendingAlbum::album_folder`). Per Open Question (a)
    /// in DESIGN.md this casing is not applied anywhere else.
    pub fn capitalized(&self) -> &'static str {
        match self {
            Source::Qobuz => "Qobuz",
            Source::Tidal => "Tidal",
            Source::Deezer => "Deezer",
            Source::Soundcloud => "Soundcloud",
            Source::Lastfm => "Lastfm",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of item a reference points at. `Featured` is the reserved
/// editorial/curated search media-type from spec.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Track,
    Album,
    Playlist,
    Artist,
    Label,
    Featured,
}

impl MediaType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "track" => Some(MediaType::Track),
            "album" => Some(MediaType::Album),
            "playlist" => Some(MediaType::Playlist),
            "artist" => Some(MediaType::Artist),
            "label" => Some(MediaType::Label),
            "featured" => Some(MediaType::Featured),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Track => "track",
            MediaType::Album => "album",
            MediaType::Playlist => "playlist",
            MediaType::Artist => "artist",
            MediaType::Label => "label",
            MediaType::Featured => "featured",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
