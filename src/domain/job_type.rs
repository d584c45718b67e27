use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    Stt,
    SttDiarize,
    Tts,
}

impl JobType {
    pub const ALL: [JobType; 3] = [JobType::Stt, JobType::SttDiarize, JobType::Tts];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Stt => "stt",
            JobType::SttDiarize => "stt_diarize",
            JobType::Tts => "tts",
        }
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stt" => Ok(JobType::Stt),
            "stt_diarize" => Ok(JobType::SttDiarize),
            "tts" => Ok(JobType::Tts),
            _ => Err(format!("Invalid job type: {}", s)),
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
