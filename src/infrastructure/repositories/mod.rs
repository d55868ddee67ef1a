pub mod conversion_repository;
pub mod http_speech_repository;
pub mod speech_repository;

pub use conversion_repository::ConversionRepository;
pub use http_speech_repository::HttpSpeechRepository;
pub use speech_repository::{SpeechError, SpeechRepository, SpeechRequest};
