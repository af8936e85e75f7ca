use async_trait::async_trait;
use log::{debug, info};
use reqwest::{header, Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::quiz::{TranscriptFragment, TranscriptSource};

const WATCH_URL: &str = "https://www.youtube.com/watch";
const CAPTION_TRACKS_KEY: &str = "\"captionTracks\":";
const GENERATED_TRACK_KIND: &str = "asr";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TranscriptError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("transcript request failed with status {0}")]
    HttpStatus(StatusCode),
    #[error("no captions available for video {video_id}")]
    CaptionsUnavailable { video_id: String },
    #[error("no '{language}' transcript for video {video_id}")]
    NoTranscript { video_id: String, language: String },
    #[error("invalid caption track url: {0}")]
    InvalidTrackUrl(String),
    #[error("unexpected transcript payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Takes whatever follows the last `?v=` of a YouTube link.
pub fn extract_video_id(link: &str) -> &str {
    link.rsplit("?v=").next().unwrap_or(link)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    pub fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some(GENERATED_TRACK_KIND)
    }
}

/// Pulls the caption track list out of a watch page. `None` means the page
/// carries no captions at all.
pub fn extract_caption_tracks(page: &str) -> Result<Option<Vec<CaptionTrack>>, TranscriptError> {
    let Some(start) = page.find(CAPTION_TRACKS_KEY) else {
        return Ok(None);
    };
    let rest = &page[start + CAPTION_TRACKS_KEY.len()..];

    // The array is followed by the rest of the player config, so only the
    // first JSON value is read.
    match serde_json::Deserializer::from_str(rest)
        .into_iter::<Vec<CaptionTrack>>()
        .next()
    {
        Some(tracks) => Ok(Some(tracks?)),
        None => Ok(None),
    }
}

/// Manually created tracks win over auto-generated ones.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    let matches = |t: &&CaptionTrack| t.language_code == language;
    tracks
        .iter()
        .filter(matches)
        .find(|t| !t.is_generated())
        .or_else(|| tracks.iter().find(matches))
}

/// Rewrites a track url so that it returns timed events as JSON.
pub fn json3_url(base_url: &str) -> Result<Url, TranscriptError> {
    let mut url =
        Url::parse(base_url).map_err(|_| TranscriptError::InvalidTrackUrl(base_url.to_string()))?;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "fmt")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("fmt", "json3");
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct TimedText {
    #[serde(default)]
    events: Vec<TimedEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimedEvent {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Option<Vec<Segment>>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(default)]
    utf8: String,
}

/// Decodes a `fmt=json3` timed text body into fragments. Events without
/// segments and whitespace-only events (the `"\n"` line-break appends of
/// auto-generated tracks) are dropped.
pub fn parse_timed_text(body: &str) -> Result<Vec<TranscriptFragment>, TranscriptError> {
    let timed_text: TimedText = serde_json::from_str(body)?;

    let fragments = timed_text
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs?.into_iter().map(|s| s.utf8).collect();
            if text.trim().is_empty() {
                return None;
            }
            Some(TranscriptFragment::new(
                text,
                event.t_start_ms as f64 / 1000.0,
                event.d_duration_ms as f64 / 1000.0,
            ))
        })
        .collect();

    Ok(fragments)
}

/// Fetches captions the way a browser would: watch page first, then the
/// timed text of the chosen track.
pub struct YoutubeTranscripts {
    client: Client,
    language: String,
}

impl YoutubeTranscripts {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            language: language.into(),
        }
    }

    async fn get_text(&self, url: Url) -> Result<String, TranscriptError> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT_LANGUAGE, "en-US")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TranscriptError::HttpStatus(response.status()));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl TranscriptSource for YoutubeTranscripts {
    async fn fetch_transcript(
        &self,
        video_id: &str,
    ) -> Result<Vec<TranscriptFragment>, TranscriptError> {
        let watch_url = Url::parse_with_params(WATCH_URL, &[("v", video_id)])
            .map_err(|_| TranscriptError::InvalidTrackUrl(WATCH_URL.to_string()))?;
        let page = self.get_text(watch_url).await?;

        let tracks = extract_caption_tracks(&page)?.unwrap_or_default();
        if tracks.is_empty() {
            return Err(TranscriptError::CaptionsUnavailable {
                video_id: video_id.to_string(),
            });
        }
        debug!(
            "Video {} has caption tracks: {:?}",
            video_id,
            tracks.iter().map(|t| &t.language_code).collect::<Vec<_>>()
        );

        let track = select_track(&tracks, &self.language).ok_or_else(|| {
            TranscriptError::NoTranscript {
                video_id: video_id.to_string(),
                language: self.language.clone(),
            }
        })?;

        let body = self.get_text(json3_url(&track.base_url)?).await?;
        let fragments = parse_timed_text(&body)?;
        let covered = fragments
            .last()
            .map(|f| f.start_offset + f.duration)
            .unwrap_or_default();
        info!(
            "Fetched {} transcript fragments ({:.0}s) for video {}",
            fragments.len(),
            covered,
            video_id
        );

        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATCH_PAGE: &str = r#"<script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc123&lang=en&kind=asr&fmt=srv3","name":{"simpleText":"English (auto-generated)"},"vssId":"a.en","languageCode":"en","kind":"asr","isTranslatable":true},{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc123&lang=en","name":{"simpleText":"English"},"vssId":".en","languageCode":"en","isTranslatable":true},{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc123&lang=de","vssId":".de","languageCode":"de"}],"audioTracks":[]}},"videoDetails":{"videoId":"abc123"}};</script>"#;

    #[test]
    fn extracts_video_id_after_last_marker() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            "dQw4w9WgXcQ"
        );
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(extract_video_id(""), "");
    }

    #[test]
    fn extracts_tracks_from_watch_page() {
        let tracks = extract_caption_tracks(WATCH_PAGE).unwrap().unwrap();
        assert_eq!(tracks.len(), 3);
        assert!(tracks[0].is_generated());
        assert_eq!(
            tracks[1].base_url,
            "https://www.youtube.com/api/timedtext?v=abc123&lang=en"
        );
        assert_eq!(tracks[2].language_code, "de");
    }

    #[test]
    fn page_without_captions_has_no_tracks() {
        let page = r#"{"playabilityStatus":{"status":"ERROR","reason":"Video unavailable"}}"#;
        assert!(extract_caption_tracks(page).unwrap().is_none());
    }

    #[test]
    fn prefers_manual_track_over_generated() {
        let tracks = extract_caption_tracks(WATCH_PAGE).unwrap().unwrap();
        let track = select_track(&tracks, "en").unwrap();
        assert!(!track.is_generated());

        let generated_only = vec![tracks[0].clone()];
        assert!(select_track(&generated_only, "en").unwrap().is_generated());
        assert!(select_track(&tracks, "fr").is_none());
    }

    #[test]
    fn json3_url_replaces_format() {
        let url = json3_url(
            "https://www.youtube.com/api/timedtext?v=abc123&lang=en&kind=asr&fmt=srv3",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.youtube.com/api/timedtext?v=abc123&lang=en&kind=asr&fmt=json3"
        );
        assert!(json3_url("not a url").is_err());
    }

    #[test]
    fn parses_timed_events() {
        let body = r#"{
            "wireMagic": "pb3",
            "events": [
                {"tStartMs": 0, "dDurationMs": 98000, "id": 1, "wpWinPosId": 1},
                {"tStartMs": 1200, "dDurationMs": 2500, "segs": [{"utf8": "Hello "}, {"utf8": "there"}]},
                {"tStartMs": 3700, "dDurationMs": 40, "aAppend": 1, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 3740, "segs": [{"utf8": "general"}]}
            ]
        }"#;

        let fragments = parse_timed_text(body).unwrap();
        assert_eq!(
            fragments,
            vec![
                TranscriptFragment::new("Hello there", 1.2, 2.5),
                TranscriptFragment::new("general", 3.74, 0.0),
            ]
        );
    }

    #[test]
    fn rejects_garbage_timed_text() {
        assert!(matches!(
            parse_timed_text("<transcript/>"),
            Err(TranscriptError::Decode(_))
        ));
    }

    #[test]
    fn whitespace_only_events_are_dropped() {
        let body = r#"{"events": [
            {"tStartMs": 0, "dDurationMs": 1000, "segs": [{"utf8": "one"}]},
            {"tStartMs": 1000, "dDurationMs": 10, "aAppend": 1, "segs": [{"utf8": "\n"}]},
            {"tStartMs": 1010, "dDurationMs": 10, "segs": [{"utf8": "  "}, {"utf8": "\t"}]},
            {"tStartMs": 1020, "dDurationMs": 1000, "segs": [{"utf8": " two"}]}
        ]}"#;

        let texts: Vec<String> = parse_timed_text(body)
            .unwrap()
            .into_iter()
            .map(|f| f.text)
            .collect();
        assert_eq!(texts, vec!["one", " two"]);
    }
}
