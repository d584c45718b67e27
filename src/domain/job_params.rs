use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{AuditId, UsageId};

/// Parameters for `stt` and `stt_diarize` jobs. `usage_id` and `audit_id`
/// link the job back to the provisional usage row and audit entry created at
/// admission time, so reconciliation is a direct lookup instead of a guess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionJobParameters {
    pub file_id: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub usage_id: Option<UsageId>,
    #[serde(default)]
    pub audit_id: Option<AuditId>,
}

/// Parameters for `tts` jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisJobParameters {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub format: AudioFormat,
    #[serde(default)]
    pub usage_id: Option<UsageId>,
    #[serde(default)]
    pub audit_id: Option<AuditId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
        }
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wav" => Ok(AudioFormat::Wav),
            "mp3" => Ok(AudioFormat::Mp3),
            _ => Err(format!("Invalid audio format: {}", s)),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
