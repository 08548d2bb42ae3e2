//! Task orchestrator: owns the capability modules' lifecycle, gates every
//! intent on the latest health snapshot, and routes it to navigation,
//! perception or the orchestrator's own mode table.
//!
//! Startup order is derived from declared module dependencies. Critical
//! module failures abort startup; non-critical ones leave the module
//! degraded and excluded from dispatch.

pub mod error;
pub mod feedback;
pub mod lifecycle;
pub mod module;
pub mod modules;
pub mod orchestrator;
pub mod perception;
pub mod runtime;
pub mod speech;

pub use error::{DispatchError, InitError, StartError};
pub use lifecycle::{initialization_order, ModuleLifecycle, ModuleStatus};
pub use module::{Module, ModuleDescriptor};
pub use modules::{DetectionModule, HealthModule, NavigationModule, VoiceModule};
pub use orchestrator::{Dispatched, Orchestrator, Services};
pub use perception::{Perception, StaticPerception, UnavailablePerception};
pub use runtime::{EventQueue, RuntimeEvent, RuntimeHandle};
pub use speech::{
    ChannelSpeaker, LogSpeaker, ScriptedSpeechInput, Speaker, SpeechInput, StdinSpeechInput,
};
