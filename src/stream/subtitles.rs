//! Subtitle track selection and format conversion
//!
//! Holds the tracks offered for the current content and enforces that at
//! most one is active. Handles SRT to WebVTT conversion for runtimes that
//! only render WebVTT.

use tracing::debug;

use crate::error::ApiError;
use crate::models::{SubFormat, SubtitleTrack};

/// The subtitle tracks of one session; zero or one active
#[derive(Debug, Clone, Default)]
pub struct SubtitleTracks {
    tracks: Vec<SubtitleTrack>,
}

impl SubtitleTracks {
    /// Take ownership of provider tracks, keeping at most the first active flag
    pub fn new(tracks: Vec<SubtitleTrack>) -> Self {
        let mut set = Self { tracks };
        let first_active = set.tracks.iter().position(|t| t.active);
        for (i, track) in set.tracks.iter_mut().enumerate() {
            track.active = Some(i) == first_active;
        }
        set
    }

    pub fn tracks(&self) -> &[SubtitleTrack] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn active(&self) -> Option<&SubtitleTrack> {
        self.tracks.iter().find(|t| t.active)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.tracks.iter().position(|t| t.active)
    }

    /// Activate the track at `index`, deactivating any other
    pub fn select(&mut self, index: usize) -> Option<&SubtitleTrack> {
        if index >= self.tracks.len() {
            return None;
        }
        for (i, track) in self.tracks.iter_mut().enumerate() {
            track.active = i == index;
        }
        debug!(index, language = %self.tracks[index].language, "subtitle track selected");
        self.tracks.get(index)
    }

    /// Activate the first track matching one of `languages`, in preference order
    pub fn select_preferred(&mut self, languages: &[String]) -> Option<&SubtitleTrack> {
        let index = languages.iter().find_map(|lang| {
            self.tracks
                .iter()
                .position(|t| language_matches(&t.language, lang))
        })?;
        self.select(index)
    }

    pub fn disable(&mut self) {
        for track in &mut self.tracks {
            track.active = false;
        }
    }

    /// Off → first → second → … → last → off
    pub fn cycle(&mut self) -> Option<&SubtitleTrack> {
        match self.active_index() {
            None if !self.tracks.is_empty() => self.select(0),
            Some(i) if i + 1 < self.tracks.len() => self.select(i + 1),
            _ => {
                self.disable();
                None
            }
        }
    }
}

/// Loose language tag comparison ("en" ~ "eng", case-insensitive)
fn language_matches(track: &str, wanted: &str) -> bool {
    track.eq_ignore_ascii_case(wanted)
        || (track.len() >= 2
            && wanted.len() >= 2
            && (track.to_lowercase().starts_with(&wanted.to_lowercase())
                || wanted.to_lowercase().starts_with(&track.to_lowercase())))
}

/// Download a track and return it as WebVTT
pub async fn fetch_webvtt(
    client: &reqwest::Client,
    track: &SubtitleTrack,
) -> Result<String, ApiError> {
    let response = client.get(&track.url).send().await?;

    if !response.status().is_success() {
        return Err(ApiError::Status(response.status().as_u16()));
    }

    let content = response.text().await?;
    match track.format() {
        SubFormat::WebVtt => Ok(content),
        SubFormat::Srt => Ok(srt_to_webvtt(&content)),
        SubFormat::Ass => Err(ApiError::Malformed(format!(
            "unsupported subtitle format for {}",
            track.url
        ))),
    }
}

/// Convert SRT content to WebVTT format
///
/// Converts SRT timestamps (00:00:00,000) to WebVTT format (00:00:00.000)
/// and adds the required WEBVTT header. Dialogue lines are left untouched.
pub fn srt_to_webvtt(srt: &str) -> String {
    let mut webvtt = String::from("WEBVTT\n\n");

    for line in srt.trim_start_matches('\u{feff}').lines() {
        let converted = if line.contains(" --> ") {
            line.replace(',', ".")
        } else {
            line.to_string()
        };
        webvtt.push_str(&converted);
        webvtt.push('\n');
    }

    webvtt
}

/// Convert 3-letter language code to full name
pub fn lang_code_to_name(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "eng" | "en" => "English".to_string(),
        "spa" | "es" => "Spanish".to_string(),
        "fre" | "fra" | "fr" => "French".to_string(),
        "ger" | "deu" | "de" => "German".to_string(),
        "ita" | "it" => "Italian".to_string(),
        "por" | "pob" | "pt" => "Portuguese".to_string(),
        "rus" | "ru" => "Russian".to_string(),
        "jpn" | "ja" => "Japanese".to_string(),
        "kor" | "ko" => "Korean".to_string(),
        "chi" | "zho" | "zh" => "Chinese".to_string(),
        "ara" | "ar" => "Arabic".to_string(),
        "hin" | "hi" => "Hindi".to_string(),
        "dut" | "nld" | "nl" => "Dutch".to_string(),
        "pol" | "pl" => "Polish".to_string(),
        "tur" | "tr" => "Turkish".to_string(),
        "swe" | "sv" => "Swedish".to_string(),
        "gre" | "ell" | "el" => "Greek".to_string(),
        "heb" | "he" => "Hebrew".to_string(),
        "ukr" | "uk" => "Ukrainian".to_string(),
        "vie" | "vi" => "Vietnamese".to_string(),
        _ => code.to_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubtitleKind;

    fn track(lang: &str, active: bool) -> SubtitleTrack {
        SubtitleTrack {
            url: format!("https://subs.example/{}.vtt", lang),
            language: lang.to_string(),
            label: lang_code_to_name(lang),
            kind: SubtitleKind::Subtitle,
            active,
        }
    }

    #[test]
    fn test_new_keeps_single_active() {
        let set = SubtitleTracks::new(vec![
            track("en", false),
            track("es", true),
            track("fr", true),
        ]);
        assert_eq!(set.active_index(), Some(1));
        assert_eq!(set.tracks().iter().filter(|t| t.active).count(), 1);
    }

    #[test]
    fn test_select_is_exclusive() {
        let mut set = SubtitleTracks::new(vec![track("en", true), track("es", false)]);
        set.select(1);
        assert_eq!(set.active().unwrap().language, "es");
        assert!(!set.tracks()[0].active);
        assert!(set.select(5).is_none());
        assert_eq!(set.active_index(), Some(1));
    }

    #[test]
    fn test_cycle_wraps_through_off() {
        let mut set = SubtitleTracks::new(vec![track("en", false), track("es", false)]);
        assert_eq!(set.cycle().unwrap().language, "en");
        assert_eq!(set.cycle().unwrap().language, "es");
        assert!(set.cycle().is_none());
        assert!(set.active().is_none());
    }

    #[test]
    fn test_select_preferred_language() {
        let mut set = SubtitleTracks::new(vec![track("fre", false), track("eng", false)]);
        assert!(set.select_preferred(&["ger".to_string()]).is_none());
        assert!(set.active().is_none());

        let picked = set.select_preferred(&["ger".to_string(), "en".to_string()]);
        assert_eq!(picked.unwrap().language, "eng");
    }

    #[test]
    fn test_srt_to_webvtt_converts_only_timestamps() {
        let srt = "1\n00:01:23,456 --> 00:01:25,789\nHello, world!";
        let vtt = srt_to_webvtt(srt);
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:01:23.456 --> 00:01:25.789"));
        assert!(vtt.contains("Hello, world!"));
    }

    #[test]
    fn test_lang_code_to_name() {
        assert_eq!(lang_code_to_name("eng"), "English");
        assert_eq!(lang_code_to_name("ES"), "Spanish");
        assert_eq!(lang_code_to_name("xyz"), "XYZ");
    }
}
