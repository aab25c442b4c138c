//! Detection intake: the data model the provider delivers, the provider
//! interface, payload parsing and the bundled providers.

mod payload;
mod provider;
mod providers;
mod result;

pub use payload::{parse_detection, parse_frame_json, parse_frame_payload};
pub use provider::DetectionProvider;
pub use providers::{ReplayProvider, ScriptedProvider};
pub use result::{Detection, DetectionKind, FramePayload};
