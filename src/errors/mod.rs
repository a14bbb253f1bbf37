pub mod stt_error;

pub use stt_error::{SpeechToTextError, SttResult};
