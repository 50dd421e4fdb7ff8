//! Compact transfer format for sharing a single show as a link.
//!
//! A show is projected onto `{ n: name, s: [[song, bpm], ...] }`, encoded as a
//! MessagePack map, and wrapped in standard base64 so it can ride in a URL
//! fragment of the form `#import=<token>`.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DownbeatError, Result};
use crate::models::{validate_name, Show, Song};

/// Fragment marker that introduces a share token.
pub const IMPORT_MARKER: &str = "#import=";

/// Standard alphabet that tolerates missing or present padding on input.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Serialize)]
struct CompactShowRef<'a> {
    n: &'a str,
    s: Vec<(&'a str, u16)>,
}

#[derive(Deserialize)]
struct CompactShow {
    n: String,
    s: Vec<(String, i64)>,
}

/// Serialize `show` into a share token.
pub fn encode(show: &Show) -> Result<String> {
    let compact = CompactShowRef {
        n: &show.name,
        s: show
            .songs
            .iter()
            .map(|song| (song.name.as_str(), song.bpm))
            .collect(),
    };
    let bytes = rmp_serde::to_vec_named(&compact)
        .map_err(|err| DownbeatError::import(format!("could not encode show: {err}")))?;
    let token = STANDARD.encode(bytes);
    debug!(show = %show.name, bytes = token.len(), "encoded share token");
    Ok(token)
}

/// Parse a share token back into a show. Malformed base64, malformed
/// MessagePack, a payload without the name/song-list shape, and songs that
/// break the tempo rules are all reported as `ImportDecode`.
pub fn decode(token: &str) -> Result<Show> {
    let bytes = LENIENT
        .decode(token.trim())
        .map_err(|err| DownbeatError::import(format!("bad base64: {err}")))?;
    let compact: CompactShow = rmp_serde::from_slice(&bytes)
        .map_err(|err| DownbeatError::import(format!("bad payload: {err}")))?;

    let name = validate_name(&compact.n, "Show name is missing")
        .map_err(|err| DownbeatError::import(err.to_string()))?;
    let songs = compact
        .s
        .into_iter()
        .map(|(song, bpm)| Song::new(&song, bpm))
        .collect::<Result<Vec<_>>>()
        .map_err(|err| DownbeatError::import(err.to_string()))?;
    Ok(Show { name, songs })
}

/// Build the full share link for `show` under `base_url`.
pub fn share_link(base_url: &str, show: &Show) -> Result<String> {
    let base = base_url.split('#').next().unwrap_or(base_url);
    Ok(format!("{base}{IMPORT_MARKER}{}", encode(show)?))
}

/// Pull the token out of a link or bare fragment. Returns `None` when the
/// import marker is absent.
pub fn import_token(link: &str) -> Option<&str> {
    let start = link.find(IMPORT_MARKER)? + IMPORT_MARKER.len();
    Some(&link[start..])
}

/// Return `desired` unchanged when no show uses it, otherwise the first of
/// `desired (2)`, `desired (3)`, ... that is free.
pub fn unique_show_name(shows: &[Show], desired: &str) -> String {
    let taken = |candidate: &str| shows.iter().any(|show| show.name == candidate);
    if !taken(desired) {
        return desired.to_string();
    }

    let mut counter = 2;
    loop {
        let candidate = format!("{desired} ({counter})");
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// A launch-time import link that can be consumed exactly once. Taking it
/// clears the slot whether or not the token decodes, so redraws and later
/// restores never re-trigger the import.
#[derive(Debug, Default)]
pub struct LaunchLink {
    link: Option<String>,
}

impl LaunchLink {
    pub fn new(link: Option<String>) -> Self {
        Self { link }
    }

    /// Consume the link. `None` when there was no link or it carried no
    /// import marker; otherwise the decode outcome.
    pub fn take_import(&mut self) -> Option<Result<Show>> {
        let link = self.link.take()?;
        let Some(token) = import_token(&link) else {
            warn!("launch link has no import marker; ignoring");
            return None;
        };
        Some(decode(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_a() -> Show {
        Show {
            name: "Set A".into(),
            songs: vec![
                Song {
                    name: "Intro".into(),
                    bpm: 100,
                },
                Song {
                    name: "Outro".into(),
                    bpm: 140,
                },
            ],
        }
    }

    #[test]
    fn decode_inverts_encode() {
        let show = set_a();
        assert_eq!(decode(&encode(&show).unwrap()).unwrap(), show);
    }

    #[test]
    fn empty_show_survives_transfer() {
        let show = Show::new("Empty").unwrap();
        assert_eq!(decode(&encode(&show).unwrap()).unwrap(), show);
    }

    #[test]
    fn payload_is_a_map_with_short_keys() {
        let bytes = STANDARD.decode(encode(&set_a()).unwrap()).unwrap();
        // fixmap with two entries, then the one-character key "n".
        assert_eq!(&bytes[..3], &[0x82, 0xa1, b'n']);
    }

    #[test]
    fn unpadded_tokens_decode() {
        let token = encode(&set_a()).unwrap();
        let trimmed = token.trim_end_matches('=');
        assert_eq!(decode(trimmed).unwrap(), set_a());
    }

    #[test]
    fn malformed_tokens_are_import_errors() {
        assert!(matches!(
            decode("!!!not base64!!!"),
            Err(DownbeatError::ImportDecode(_))
        ));
        let garbage = STANDARD.encode([0xc1, 0x00, 0xff]);
        assert!(matches!(
            decode(&garbage),
            Err(DownbeatError::ImportDecode(_))
        ));
        let wrong_shape = STANDARD.encode(rmp_serde::to_vec_named(&vec![1, 2, 3]).unwrap());
        assert!(matches!(
            decode(&wrong_shape),
            Err(DownbeatError::ImportDecode(_))
        ));
    }

    #[test]
    fn out_of_range_tempo_is_rejected() {
        let mut show = set_a();
        show.songs[0].bpm = 400;
        let token = encode(&show).unwrap();
        assert!(matches!(decode(&token), Err(DownbeatError::ImportDecode(_))));
    }

    #[test]
    fn import_token_requires_marker() {
        assert_eq!(import_token("https://x.test/#import=abc"), Some("abc"));
        assert_eq!(import_token("#import=abc"), Some("abc"));
        assert_eq!(import_token("https://x.test/#songs"), None);
    }

    #[test]
    fn share_link_replaces_existing_fragment() {
        let link = share_link("https://x.test/app#old", &set_a()).unwrap();
        assert!(link.starts_with("https://x.test/app#import="));
        assert_eq!(decode(import_token(&link).unwrap()).unwrap(), set_a());
    }

    #[test]
    fn duplicate_names_get_numeric_suffix() {
        let mut shows = vec![set_a()];
        assert_eq!(unique_show_name(&shows, "Set A"), "Set A (2)");
        shows.push(Show::new("Set A (2)").unwrap());
        assert_eq!(unique_show_name(&shows, "Set A"), "Set A (3)");
        assert_eq!(unique_show_name(&shows, "Set B"), "Set B");
    }

    #[test]
    fn launch_link_is_consumed_even_on_failure() {
        let mut link = LaunchLink::new(Some("#import=@@@".into()));
        assert!(matches!(link.take_import(), Some(Err(_))));
        assert!(link.take_import().is_none());
    }
}
