use things_proto::api::{LinkKind, RfidTag};

use super::grid::{shared_list, Grid, SharedList};

/// All linked tags, one grid per resource kind.
pub struct TagShelf {
    albums: SharedList<RfidTag>,
    playlists: SharedList<RfidTag>,
    tracks: SharedList<RfidTag>,
    row_width: usize,
}

impl TagShelf {
    pub fn new(row_width: usize) -> Self {
        Self {
            albums: shared_list(),
            playlists: shared_list(),
            tracks: shared_list(),
            row_width,
        }
    }

    /// Sort `tags` onto the shelf.  Tags of unknown kind are left out.
    pub fn fill(&self, tags: Vec<RfidTag>) {
        for list in [&self.albums, &self.playlists, &self.tracks] {
            list.write().clear();
        }
        for tag in tags {
            let list = match tag.kind {
                LinkKind::Album => &self.albums,
                LinkKind::Playlist => &self.playlists,
                LinkKind::Track => &self.tracks,
                LinkKind::Unknown => continue,
            };
            list.write().push(tag);
        }
    }

    /// Caption and grid of each group, in display order.
    pub fn groups(&self) -> [(&'static str, Grid<RfidTag>); 3] {
        [
            ("Albums", self.grid(LinkKind::Album)),
            ("Playlists", self.grid(LinkKind::Playlist)),
            ("Tracks", self.grid(LinkKind::Track)),
        ]
    }

    pub fn grid(&self, kind: LinkKind) -> Grid<RfidTag> {
        let list = match kind {
            LinkKind::Album => &self.albums,
            LinkKind::Playlist => &self.playlists,
            LinkKind::Track | LinkKind::Unknown => &self.tracks,
        };
        Grid::new(self.row_width, std::sync::Arc::clone(list))
    }
}
