//! Audio media types accepted by the recognizer.
//!
//! Used to pick a `Content-Type` for audio files when the caller does not
//! specify one, and to reject obviously unsupported content types before any
//! request is made.

use std::path::Path;

pub const AUDIO_BASIC: &str = "audio/basic";
pub const AUDIO_FLAC: &str = "audio/flac";
pub const AUDIO_L16: &str = "audio/l16";
pub const AUDIO_MP3: &str = "audio/mp3";
pub const AUDIO_MPEG: &str = "audio/mpeg";
pub const AUDIO_MULAW: &str = "audio/mulaw";
pub const AUDIO_ALAW: &str = "audio/alaw";
pub const AUDIO_OGG: &str = "audio/ogg";
pub const AUDIO_OGG_OPUS: &str = "audio/ogg;codecs=opus";
pub const AUDIO_OGG_VORBIS: &str = "audio/ogg;codecs=vorbis";
pub const AUDIO_WAV: &str = "audio/wav";
pub const AUDIO_WEBM: &str = "audio/webm";
pub const AUDIO_WEBM_OPUS: &str = "audio/webm;codecs=opus";
pub const AUDIO_WEBM_VORBIS: &str = "audio/webm;codecs=vorbis";

/// Base media types (without parameters) the service understands.
const SUPPORTED_BASE_TYPES: &[&str] = &[
    AUDIO_BASIC,
    AUDIO_FLAC,
    AUDIO_L16,
    AUDIO_MP3,
    AUDIO_MPEG,
    AUDIO_MULAW,
    AUDIO_ALAW,
    AUDIO_OGG,
    AUDIO_WAV,
    AUDIO_WEBM,
];

/// Guess the audio media type of a file from its extension.
///
/// Matching is case-insensitive. Returns `None` for files without an
/// extension or with an extension that is not an audio format.
pub fn media_type_from_path(path: impl AsRef<Path>) -> Option<&'static str> {
    let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
    let media_type = match ext.as_str() {
        "wav" => AUDIO_WAV,
        "ogg" | "oga" => AUDIO_OGG,
        "opus" => AUDIO_OGG_OPUS,
        "flac" => AUDIO_FLAC,
        "mp3" => AUDIO_MP3,
        "mpeg" | "mpga" => AUDIO_MPEG,
        "webm" => AUDIO_WEBM,
        "l16" | "raw" | "pcm" => AUDIO_L16,
        "mulaw" | "ulaw" => AUDIO_MULAW,
        "alaw" => AUDIO_ALAW,
        "au" | "basic" => AUDIO_BASIC,
        _ => return None,
    };
    Some(media_type)
}

/// Strip parameters (`; rate=16000`, `;codecs=opus`) and normalize case.
pub fn base_type(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether `media_type` names a supported audio format.
///
/// Parameters are ignored, so `audio/l16; rate=44000` is valid.
pub fn is_valid_media_type(media_type: &str) -> bool {
    let base = base_type(media_type);
    SUPPORTED_BASE_TYPES.contains(&base.as_str())
}
