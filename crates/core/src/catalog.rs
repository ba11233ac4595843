//! Languages, voice providers and voices offered for dubbing.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Languages
// ---------------------------------------------------------------------------

/// Target/source languages as `(code, display name)`.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("ru", "Русский"),
    ("es", "Español"),
    ("fr", "Français"),
    ("de", "Deutsch"),
    ("it", "Italiano"),
    ("pt", "Português"),
    ("zh", "中文"),
    ("ja", "日本語"),
    ("ko", "한국어"),
];

/// Whether `code` is one of [`SUPPORTED_LANGUAGES`].
pub fn is_supported_language(code: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|(c, _)| *c == code)
}

// ---------------------------------------------------------------------------
// Voice providers
// ---------------------------------------------------------------------------

/// Text-to-speech backend used to synthesize the dubbed track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceProvider {
    OpenAi,
    ElevenLabs,
}

impl VoiceProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::ElevenLabs => "elevenlabs",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::ElevenLabs => "ElevenLabs",
        }
    }
}

impl std::fmt::Display for VoiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VoiceProvider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(CoreError::Unsupported {
                field: "voice provider",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Voices
// ---------------------------------------------------------------------------

/// Voices offered by the OpenAI provider as `(id, display name)`.
pub const OPENAI_VOICES: &[(&str, &str)] = &[
    ("alloy", "Alloy"),
    ("echo", "Echo"),
    ("fable", "Fable"),
    ("onyx", "Onyx"),
    ("nova", "Nova"),
    ("shimmer", "Shimmer"),
];

/// Provider applied when an upload finishes and configuration begins.
pub const DEFAULT_VOICE_PROVIDER: VoiceProvider = VoiceProvider::OpenAi;

/// Voice applied together with [`DEFAULT_VOICE_PROVIDER`].
pub const DEFAULT_VOICE_ID: &str = "onyx";
