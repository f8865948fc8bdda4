//! Language fallback resolution.
//!
//! Policy, in order:
//! 1. For each preferred code: a human-authored track, else an
//!    auto-generated one in that language.
//! 2. If the list contained the wildcard: the first human-authored track,
//!    else the first track of any kind.
//! 3. Otherwise no match.
//!
//! Within one language, human beats auto; otherwise input order wins.

use ytx_models::{AvailableTrack, LanguagePreference};

use crate::error::FetchError;

/// Pick the best track for a preference list.
pub fn resolve<'a>(
    preference: &LanguagePreference,
    tracks: &'a [AvailableTrack],
) -> Option<&'a AvailableTrack> {
    for code in preference.explicit_codes() {
        let in_language = |t: &&AvailableTrack| t.language_code.eq_ignore_ascii_case(code);

        if let Some(track) = tracks
            .iter()
            .filter(in_language)
            .find(|t| !t.is_auto_generated)
        {
            return Some(track);
        }
        if let Some(track) = tracks.iter().find(in_language) {
            return Some(track);
        }
    }

    if preference.has_wildcard() {
        return tracks
            .iter()
            .find(|t| !t.is_auto_generated)
            .or_else(|| tracks.first());
    }

    None
}

/// Like [`resolve`], but reports the miss as `NoMatchingLanguage`.
pub fn resolve_or_err<'a>(
    preference: &LanguagePreference,
    tracks: &'a [AvailableTrack],
) -> Result<&'a AvailableTrack, FetchError> {
    resolve(preference, tracks).ok_or_else(|| FetchError::NoMatchingLanguage {
        requested: preference.codes().join(", "),
        available: describe_tracks(tracks),
    })
}

fn describe_tracks(tracks: &[AvailableTrack]) -> String {
    tracks
        .iter()
        .map(|t| {
            if t.is_auto_generated {
                format!("{} (auto)", t.language_code)
            } else {
                t.language_code.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
