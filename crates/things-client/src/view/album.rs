use things_proto::api::{Album, AlbumTrack, Playable};

/// A track as the album page lists it.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumRow {
    pub track: AlbumTrack,
    /// Artists joined with ", ", or empty when they are just the album artist.
    pub artist_label: String,
}

impl Playable for AlbumRow {
    fn link(&self) -> &str {
        &self.track.link
    }

    fn is_available(&self) -> bool {
        self.track.is_available
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscView {
    pub disc: u32,
    pub rows: Vec<AlbumRow>,
    /// Whether any track on the disc credits someone besides the album
    /// artist.  Decides if the artist column is drawn.
    pub contains_other_artists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumView {
    pub album_name: String,
    pub artist: String,
    pub year: Option<u32>,
    pub link: String,
    pub discs: Vec<DiscView>,
}

impl From<Album> for AlbumView {
    fn from(album: Album) -> Self {
        let discs = album
            .discs
            .into_iter()
            .map(|disc| {
                let rows: Vec<AlbumRow> = disc
                    .tracks
                    .into_iter()
                    .map(|track| {
                        let joined = track.artists.join(", ");
                        let artist_label = if joined == album.artist {
                            String::new()
                        } else {
                            joined
                        };
                        AlbumRow {
                            track,
                            artist_label,
                        }
                    })
                    .collect();
                let contains_other_artists = rows.iter().any(|r| !r.artist_label.is_empty());
                DiscView {
                    disc: disc.disc,
                    rows,
                    contains_other_artists,
                }
            })
            .collect();

        AlbumView {
            album_name: album.album_name,
            artist: album.artist,
            year: album.year,
            link: album.link,
            discs,
        }
    }
}

impl AlbumView {
    pub fn rows(&self) -> impl Iterator<Item = &AlbumRow> {
        self.discs.iter().flat_map(|d| d.rows.iter())
    }
}
