pub mod ai_providers;
pub mod ai_service;
pub mod api;
pub mod challenge;
pub mod config;
pub mod database;
pub mod errors;
pub mod grading;
pub mod logging;
pub mod models;
pub mod preparer;
pub mod session;
pub mod srs;
pub mod word_service;

pub use ai_providers::{AiProvider, AiProviderKind, JsonResponseParser};
pub use ai_service::{AiService, CancelToken};
pub use challenge::Challenge;
pub use config::Config;
pub use database::Database;
pub use errors::*;
pub use grading::{grade_challenge, Answer, ChallengeResult};
pub use models::*;
pub use session::{ReviewSession, SessionMode, SessionPhase};
pub use srs::SrsScheduler;
pub use word_service::WordService;
