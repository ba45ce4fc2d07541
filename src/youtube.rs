use std::sync::Arc;

use bones_dj::time::parse_iso8601_duration;
use bones_dj::Track;
use reqwest::Url;
use serde::Deserialize;
use serenity::prelude::TypeMapKey;
use songbird::input::{Input, Restartable};
use tracing::{debug, warn};

const API_BASE: &str = "https://youtube.googleapis.com/youtube/v3";
/// The Data API caps `maxResults` and `id=` lists at 50.
const API_PAGE: usize = 50;
const MAX_PLAYLIST_TRACKS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Must provide a query")]
    EmptyQuery,

    #[error("Search did not return any results")]
    NoResults,

    #[error("Error requesting the YouTube API: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Error sourcing track: {0}")]
    Source(String),
}

pub enum Resolved {
    Single(Track),
    Playlist(Vec<Track>),
}

#[derive(Deserialize)]
struct VideoId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Deserialize)]
struct SearchItem {
    id: VideoId,
}

#[derive(Deserialize)]
struct SearchResponse {
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct Snippet {
    title: String,
}

#[derive(Deserialize)]
struct ContentDetails {
    duration: String,
}

#[derive(Deserialize)]
struct VideoItem {
    id: String,
    snippet: Snippet,
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
}

#[derive(Deserialize)]
struct VideosResponse {
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    #[serde(rename = "contentDetails")]
    content_details: VideoId,
}

#[derive(Deserialize)]
struct PlaylistItemsResponse {
    items: Vec<PlaylistItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

/// Turns user input into tracks. Uses the YouTube Data API when a key is
/// configured and falls back to youtube-dl metadata otherwise.
pub struct Resolver {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl TypeMapKey for Resolver {
    type Value = Arc<Resolver>;
}

impl Resolver {
    pub fn new(api_key: Option<String>) -> Self {
        Resolver {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    pub async fn resolve(&self, query: &str) -> Result<Resolved, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::EmptyQuery);
        }

        if query.starts_with("http") {
            if let (Some(key), Ok(url)) = (&self.api_key, Url::parse(query)) {
                if let Some(list) = playlist_id(&url) {
                    let tracks = self.playlist(key, &list).await?;
                    return Ok(Resolved::Playlist(tracks));
                }
                if let Some(id) = video_id(&url) {
                    return self.video(key, &id).await.map(Resolved::Single);
                }
            }
            let source = Restartable::ytdl(query.to_string(), true)
                .await
                .map_err(|why| ResolveError::Source(why.to_string()))?;
            return Ok(Resolved::Single(track_from_input(&Input::from(source), query)));
        }

        match &self.api_key {
            Some(key) => {
                let id = self.search(key, query).await?;
                self.video(key, &id).await.map(Resolved::Single)
            }
            None => {
                let source = Restartable::ytdl_search(query.to_string(), true)
                    .await
                    .map_err(|why| ResolveError::Source(why.to_string()))?;
                Ok(Resolved::Single(track_from_input(&Input::from(source), query)))
            }
        }
    }

    async fn search(&self, key: &str, query: &str) -> Result<String, ResolveError> {
        let resp = self
            .http
            .get(format!("{}/search", API_BASE))
            .query(&[("q", query), ("type", "video"), ("part", "id"), ("key", key)])
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await?;

        resp.items
            .into_iter()
            .next()
            .map(|item| item.id.video_id)
            .ok_or(ResolveError::NoResults)
    }

    async fn video(&self, key: &str, id: &str) -> Result<Track, ResolveError> {
        self.videos(key, &[id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(ResolveError::NoResults)
    }

    /// Looks up title and duration for up to `API_PAGE` ids, keeping their order.
    async fn videos(&self, key: &str, ids: &[String]) -> Result<Vec<Track>, ResolveError> {
        let resp = self
            .http
            .get(format!("{}/videos", API_BASE))
            .query(&[
                ("id", ids.join(",").as_str()),
                ("part", "snippet,contentDetails"),
                ("key", key),
            ])
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json::<VideosResponse>()
            .await?;

        let mut tracks = Vec::with_capacity(resp.items.len());
        for id in ids {
            // Private or deleted videos are missing from the response.
            let Some(item) = resp.items.iter().find(|item| &item.id == id) else {
                debug!("skipping unavailable video {}", id);
                continue;
            };
            let duration_ms = parse_iso8601_duration(&item.content_details.duration).unwrap_or_else(|| {
                warn!("unparseable duration {:?} for {}", item.content_details.duration, id);
                0
            });
            tracks.push(Track::new(item.snippet.title.clone(), watch_url(id), duration_ms));
        }
        Ok(tracks)
    }

    async fn playlist(&self, key: &str, list: &str) -> Result<Vec<Track>, ResolveError> {
        let mut ids: Vec<String> = Vec::new();
        let mut page_token: Option<String> = None;
        let max_results = API_PAGE.to_string();

        loop {
            let mut request = self
                .http
                .get(format!("{}/playlistItems", API_BASE))
                .query(&[
                    ("playlistId", list),
                    ("part", "contentDetails"),
                    ("maxResults", max_results.as_str()),
                    ("key", key),
                ])
                .header("Accept", "application/json");
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let resp = request
                .send()
                .await?
                .error_for_status()?
                .json::<PlaylistItemsResponse>()
                .await?;

            ids.extend(resp.items.into_iter().map(|item| item.content_details.video_id));
            page_token = resp.next_page_token;
            if page_token.is_none() || ids.len() >= MAX_PLAYLIST_TRACKS {
                break;
            }
        }
        ids.truncate(MAX_PLAYLIST_TRACKS);

        let mut tracks = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(API_PAGE) {
            tracks.extend(self.videos(key, chunk).await?);
        }
        if tracks.is_empty() {
            return Err(ResolveError::NoResults);
        }
        Ok(tracks)
    }
}

/// Opens the playable source for a queued track.
pub async fn open_source(track: &Track) -> Result<Input, ResolveError> {
    Restartable::ytdl(track.uri.clone(), true)
        .await
        .map(Input::from)
        .map_err(|why| ResolveError::Source(why.to_string()))
}

fn track_from_input(input: &Input, fallback: &str) -> Track {
    let metadata = &input.metadata;
    let uri = metadata.source_url.clone().unwrap_or_else(|| fallback.to_string());
    let title = metadata.title.clone().unwrap_or_else(|| uri.clone());
    let duration_ms = metadata
        .duration
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0);
    Track::new(title, uri, duration_ms)
}

fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

fn is_youtube_host(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("youtube.com" | "www.youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtu.be")
    )
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Playlist id of a playlist page. A `watch?v=..&list=..` link plays the one video.
fn playlist_id(url: &Url) -> Option<String> {
    if !is_youtube_host(url) || url.path() != "/playlist" {
        return None;
    }
    query_param(url, "list")
}

fn video_id(url: &Url) -> Option<String> {
    if !is_youtube_host(url) {
        return None;
    }
    if url.host_str() == Some("youtu.be") {
        return url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|id| !id.is_empty())
            .map(str::to_string);
    }
    if let Some(id) = url.path().strip_prefix("/shorts/") {
        return Some(id.trim_end_matches('/').to_string()).filter(|id| !id.is_empty());
    }
    query_param(url, "v")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn finds_video_ids() {
        assert_eq!(
            video_id(&url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10")).as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(video_id(&url("https://youtu.be/dQw4w9WgXcQ")).as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            video_id(&url("https://youtube.com/shorts/abc123")).as_deref(),
            Some("abc123")
        );
        assert_eq!(video_id(&url("https://soundcloud.com/artist/song")), None);
        assert_eq!(video_id(&url("https://www.youtube.com/watch")), None);
    }

    #[test]
    fn finds_playlist_ids() {
        assert_eq!(
            playlist_id(&url("https://www.youtube.com/playlist?list=PL123")).as_deref(),
            Some("PL123")
        );
        assert_eq!(playlist_id(&url("https://www.youtube.com/watch?v=abc&list=PL123")), None);
        assert_eq!(playlist_id(&url("https://example.com/playlist?list=PL123")), None);
    }

    #[test]
    fn decodes_videos_response() {
        let body = r#"{"items":[{"id":"abc","snippet":{"title":"Song"},"contentDetails":{"duration":"PT3M5S"}}]}"#;
        let resp: VideosResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.items[0].snippet.title, "Song");
        assert_eq!(parse_iso8601_duration(&resp.items[0].content_details.duration), Some(185_000));
    }

    #[test]
    fn decodes_playlist_page() {
        let body = r#"{"nextPageToken":"tok","items":[{"contentDetails":{"videoId":"a"}},{"contentDetails":{"videoId":"b"}}]}"#;
        let resp: PlaylistItemsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.next_page_token.as_deref(), Some("tok"));
        let ids: Vec<_> = resp.items.into_iter().map(|i| i.content_details.video_id).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
