mod balance;
mod health;
mod jobs;

pub use balance::{admin_set_balance_handler, balance_handler};
pub use health::health_handler;
pub use jobs::{
    USER_ID_HEADER, job_status_handler, submit_stt_diarize_handler, submit_stt_handler,
    submit_tts_handler,
};
