//! Line-oriented commands for `thingsctl`.

use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use parking_lot::Mutex;
use things_client::rfid_session::TagReadOutcome;
use things_client::view::{
    format_duration, format_millis, AlbumView, PlayerPanel, SearchSession, TagShelf,
    TrackCollectionPlayer, ViewScope,
};
use things_client::{
    AlertList, ApiClient, MessageChannel, PlayerService, RfidTagService, SpotifyService, TagLinker,
};
use things_proto::api::TrackInfo;
use things_proto::config::Config;
use tracing::{debug, info};

/// How long `scan` waits for a tag.
const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

const HELP: &str = "\
play | pause | next | prev
repeat on|off | shuffle on|off | seek <secs>
playtrack <collection-link> <track-link>
search <text> | more tracks|albums
queue | playlists | album <link>
tags | scan <link> | link <tag> <link> | relink <tag> <link> | unlink <tag>
login <user> <pass> | logout
alerts | dismiss <seq> | status | help | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum More {
    Tracks,
    Albums,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Play,
    Pause,
    Next,
    Prev,
    Repeat(bool),
    Shuffle(bool),
    Seek(u32),
    PlayTrack { collection: String, track: String },
    Search(String),
    More(More),
    Queue,
    Playlists,
    Album(String),
    Tags,
    Scan(String),
    Link { tag: String, link: String },
    Relink { tag: String, link: String },
    Unlink(String),
    Login { user: String, pass: String },
    Logout,
    Alerts,
    Dismiss(u64),
    Status,
    Help,
    Quit,
}

fn on_off(word: Option<&str>) -> Result<bool> {
    match word {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => bail!("expected on|off"),
    }
}

fn arg<'a>(word: Option<&'a str>, name: &str) -> Result<&'a str> {
    word.ok_or_else(|| anyhow!("missing <{}>", name))
}

impl FromStr for Request {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let mut words = rest.split_whitespace();

        let request = match verb {
            "play" => Request::Play,
            "pause" => Request::Pause,
            "next" => Request::Next,
            "prev" => Request::Prev,
            "repeat" => Request::Repeat(on_off(words.next())?),
            "shuffle" => Request::Shuffle(on_off(words.next())?),
            "seek" => Request::Seek(
                arg(words.next(), "secs")?
                    .parse()
                    .context("seek takes whole seconds")?,
            ),
            "playtrack" => Request::PlayTrack {
                collection: arg(words.next(), "collection-link")?.to_string(),
                track: arg(words.next(), "track-link")?.to_string(),
            },
            "search" if !rest.is_empty() => Request::Search(rest.to_string()),
            "search" => bail!("missing <text>"),
            "more" => match words.next() {
                Some("tracks") => Request::More(More::Tracks),
                Some("albums") => Request::More(More::Albums),
                _ => bail!("expected tracks|albums"),
            },
            "queue" => Request::Queue,
            "playlists" => Request::Playlists,
            "album" => Request::Album(arg(words.next(), "link")?.to_string()),
            "tags" => Request::Tags,
            "scan" => Request::Scan(arg(words.next(), "link")?.to_string()),
            "link" | "relink" => {
                let tag = arg(words.next(), "tag")?.to_string();
                let link = arg(words.next(), "link")?.to_string();
                if verb == "link" {
                    Request::Link { tag, link }
                } else {
                    Request::Relink { tag, link }
                }
            }
            "unlink" => Request::Unlink(arg(words.next(), "tag")?.to_string()),
            "login" => Request::Login {
                user: arg(words.next(), "user")?.to_string(),
                pass: arg(words.next(), "pass")?.to_string(),
            },
            "logout" => Request::Logout,
            "alerts" => Request::Alerts,
            "dismiss" => Request::Dismiss(
                arg(words.next(), "seq")?
                    .parse()
                    .context("dismiss takes an alert number")?,
            ),
            "status" => Request::Status,
            "help" | "?" => Request::Help,
            "quit" | "exit" => Request::Quit,
            other => bail!("unknown command '{}' (try help)", other),
        };
        Ok(request)
    }
}

pub struct Console {
    player: PlayerService,
    spotify: SpotifyService,
    rfid: RfidTagService,
    panel: PlayerPanel,
    tracks: TrackCollectionPlayer,
    search: SearchSession,
    alerts: Arc<Mutex<AlertList>>,
    scope: ViewScope,
    rfid_url: String,
    row_width: usize,
}

impl Console {
    pub fn new(channel: Arc<MessageChannel>, api: ApiClient, config: &Config) -> Self {
        let player = PlayerService::new(Arc::clone(&channel));
        let spotify = SpotifyService::new(Arc::clone(&channel), api.clone());
        let rfid = RfidTagService::new(Arc::clone(&channel), api);
        let bus = channel.alerts().clone();

        let scope = ViewScope::new();
        let alerts = Arc::new(Mutex::new(AlertList::new()));
        let list = Arc::clone(&alerts);
        scope.hold(bus.subscribe(move |alert| {
            println!("[{}] {} (#{})", alert.kind, alert.message, alert.sequence);
            list.lock().push(alert.clone());
        }));

        let readers = rfid.subscribe_attached_readers(|readers| {
            let names: Vec<&str> = readers.iter().map(|r| r.name.as_str()).collect();
            info!("rfid readers: {:?}", names);
        });
        scope.hold(readers);
        scope.hold(spotify.subscribe_login_state(|state| match &state.current_user {
            Some(user) if state.is_logged_in => info!("logged in as {}", user),
            _ => info!("not logged in"),
        }));

        Self {
            panel: PlayerPanel::new(player.clone(), &bus),
            tracks: TrackCollectionPlayer::new(player.clone()),
            search: SearchSession::new(spotify.clone(), config.paging.clone()),
            player,
            spotify,
            rfid,
            alerts,
            scope,
            rfid_url: config.server.ws_url("/ws/rfid"),
            row_width: config.paging.grid_row_width,
        }
    }

    /// Run one request.  Returns `false` when the console should exit.
    pub async fn execute<W: Write>(&mut self, request: Request, out: &mut W) -> Result<bool> {
        debug!("console: {:?}", request);
        match request {
            Request::Play => self.panel.play(),
            Request::Pause => self.panel.pause(),
            Request::Next => self.panel.next_track(),
            Request::Prev => self.panel.previous_track(),
            Request::Repeat(on) => self.player.set_repeat(on),
            Request::Shuffle(on) => self.player.set_shuffle(on),
            Request::Seek(secs) => self.panel.seek(secs),
            Request::PlayTrack { collection, track } => {
                let track = TrackInfo {
                    name: String::new(),
                    link: track,
                };
                self.tracks.play(&collection, &track);
            }
            Request::Search(text) => {
                scoped(&self.scope, self.search.search(&text)).await?;
                self.print_search(out)?;
            }
            Request::More(More::Tracks) => {
                scoped(&self.scope, self.search.show_more_tracks()).await?;
                self.print_search(out)?;
            }
            Request::More(More::Albums) => {
                scoped(&self.scope, self.search.show_more_albums()).await?;
                self.print_search(out)?;
            }
            Request::Queue => {
                let queue = scoped(&self.scope, self.spotify.play_queue()).await?;
                self.tracks.refresh();
                for track in &queue {
                    let mark = if self.tracks.show_playing_indicator(track) { ">" } else { " " };
                    writeln!(
                        out,
                        "{} {:<40} {:<30} {}",
                        mark,
                        track.track_name,
                        track.artists.join(", "),
                        format_millis(track.duration)
                    )?;
                }
            }
            Request::Playlists => {
                for list in scoped(&self.scope, self.spotify.playlists()).await? {
                    writeln!(out, "{:<40} {:>4} tracks  {}", list.name, list.track_count, list.link)?;
                }
            }
            Request::Album(link) => {
                let album = AlbumView::from(scoped(&self.scope, self.spotify.album(&link)).await?);
                self.tracks.refresh();
                writeln!(out, "{} - {} {}", album.artist, album.album_name, year(album.year))?;
                for disc in &album.discs {
                    if album.discs.len() > 1 {
                        writeln!(out, "disc {}", disc.disc)?;
                    }
                    for row in &disc.rows {
                        let mark = if self.tracks.show_playing_indicator(row) { ">" } else { " " };
                        let artists = if disc.contains_other_artists { row.artist_label.as_str() } else { "" };
                        writeln!(
                            out,
                            "{} {:>2}. {:<40} {:<30} {}",
                            mark,
                            row.track.track_index,
                            row.track.track_name,
                            artists,
                            format_millis(row.track.duration)
                        )?;
                    }
                }
            }
            Request::Tags => {
                let shelf = TagShelf::new(self.row_width);
                shelf.fill(scoped(&self.scope, self.rfid.tags()).await?);
                for (caption, grid) in shelf.groups() {
                    if grid.is_empty() {
                        continue;
                    }
                    writeln!(out, "{}", caption)?;
                    for row in grid.rows() {
                        let cells: Vec<String> =
                            row.iter().map(|t| format!("{} ({})", t.name, t.tag)).collect();
                        writeln!(out, "  {}", cells.join("  |  "))?;
                    }
                }
            }
            Request::Scan(link) => self.scan(link, out).await?,
            Request::Link { tag, link } => {
                scoped(&self.scope, self.rfid.link_tag(&tag, &link)).await?;
                writeln!(out, "linked {} to {}", tag, link)?;
            }
            Request::Relink { tag, link } => {
                scoped(&self.scope, self.rfid.relink_tag(&tag, &link)).await?;
                writeln!(out, "relinked {} to {}", tag, link)?;
            }
            Request::Unlink(tag) => {
                scoped(&self.scope, self.rfid.unlink_tag(&tag)).await?;
                writeln!(out, "unlinked {}", tag)?;
            }
            Request::Login { user, pass } => {
                let result = scoped(&self.scope, self.spotify.login(&user, &pass)).await?;
                if result.success {
                    writeln!(out, "logged in as {}", user)?;
                } else {
                    writeln!(out, "login failed: {}", result.error.unwrap_or_default())?;
                }
            }
            Request::Logout => {
                scoped(&self.scope, self.spotify.logout()).await?;
                writeln!(out, "logged out")?;
            }
            Request::Alerts => {
                let alerts = self.alerts.lock();
                if alerts.is_empty() {
                    writeln!(out, "no alerts")?;
                }
                for alert in alerts.iter() {
                    writeln!(
                        out,
                        "#{} {} [{}] {}",
                        alert.sequence,
                        alert.raised_at.format("%H:%M:%S"),
                        alert.kind,
                        alert.message
                    )?;
                }
            }
            Request::Dismiss(seq) => {
                if !self.alerts.lock().dismiss(seq) {
                    writeln!(out, "no alert #{}", seq)?;
                }
            }
            Request::Status => self.print_status(out)?,
            Request::Help => writeln!(out, "{}", HELP)?,
            Request::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Wait for one tag on the reader and link it to `link`.
    async fn scan<W: Write>(&self, link: String, out: &mut W) -> Result<()> {
        let mut linker = TagLinker::new(link);
        let api = self.rfid.api().clone();
        scoped(&self.scope, linker.load(&api)).await?;
        writeln!(out, "{} has {} tag(s); swipe a tag...", linker.link(), linker.tags().len())?;

        let mut session = self.rfid.scan_session(&self.rfid_url).await?;
        let read = tokio::time::timeout(SCAN_TIMEOUT, session.next_read()).await;
        session.close().await;
        let read = match read {
            Ok(Some(read)) => read,
            Ok(None) => bail!("tag reader session closed"),
            Err(_) => bail!("no tag read within {}s", SCAN_TIMEOUT.as_secs()),
        };

        match scoped(&self.scope, linker.on_tag_read(&api, read)).await? {
            TagReadOutcome::Linked(tag) => writeln!(out, "linked {} to {}", tag, linker.link())?,
            TagReadOutcome::Overwrite { tag, name } => writeln!(
                out,
                "{} is linked to {}; run `relink {} {}` to overwrite",
                tag,
                name,
                tag,
                linker.link()
            )?,
        }
        Ok(())
    }

    fn print_search<W: Write>(&self, out: &mut W) -> Result<()> {
        let Some(query) = self.search.last_query() else {
            writeln!(out, "nothing searched yet")?;
            return Ok(());
        };
        writeln!(
            out,
            "'{}': {}/{} tracks, {}/{} albums",
            query,
            self.search.tracks().len(),
            self.search.total_tracks(),
            self.search.albums().len(),
            self.search.total_albums()
        )?;
        for track in self.search.tracks() {
            let mark = if self.tracks.show_playing_indicator(track) { ">" } else { " " };
            writeln!(
                out,
                "{} {:<40} {:<30} {}  {}",
                mark,
                track.track_name,
                track.artists.join(", "),
                format_millis(track.duration),
                track.link
            )?;
        }
        for row in self.search.album_grid().rows() {
            let cells: Vec<String> = row
                .iter()
                .map(|a| format!("{} - {}", a.artist_name, a.album_name))
                .collect();
            writeln!(out, "  {}", cells.join("  |  "))?;
        }
        if self.search.has_more_tracks() {
            writeln!(out, "more tracks: `more tracks`")?;
        }
        if self.search.has_more_albums() {
            writeln!(out, "more albums: `more albums`")?;
        }
        Ok(())
    }

    fn print_status<W: Write>(&self, out: &mut W) -> Result<()> {
        let st = self.panel.state();
        let flag = |on: bool| if on { "on" } else { "off" };
        writeln!(
            out,
            "{}  repeat {}  shuffle {}  {} / {}",
            if st.is_playing { "playing" } else { "paused" },
            flag(st.is_repeat_on),
            flag(st.is_shuffle_on),
            format_duration(st.track_progress),
            format_duration(st.track_length as f64)
        )?;
        match &st.now_playing {
            Some(now) => writeln!(out, "{} - {}  {}", now.artists, now.name, now.link)?,
            None => writeln!(out, "nothing loaded")?,
        }
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.scope.teardown();
        self.tracks.destroy();
    }
}

/// Await an API call unless the console's scope was torn down first.
async fn scoped<T, E, F>(scope: &ViewScope, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    match scope.run(fut).await {
        Some(result) => Ok(result?),
        None => bail!("console is shutting down"),
    }
}

fn year(year: Option<u32>) -> String {
    year.map(|y| format!("({})", y)).unwrap_or_default()
}
