pub mod config;
pub mod detection_types;
pub mod goal_types;
pub mod health_types;
pub mod location_types;
pub mod nlu_types;
pub mod pose;
pub mod speech_types;
pub mod tts_types;

pub use config::*;
pub use detection_types::*;
pub use goal_types::*;
pub use health_types::*;
pub use location_types::*;
pub use nlu_types::*;
pub use pose::*;
pub use speech_types::*;
pub use tts_types::*;
