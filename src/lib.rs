pub mod assets;
pub mod body_sync;
pub mod camera;
pub mod color;
pub mod engine;
pub mod error;
pub mod events;
pub mod gizmo;
pub mod material;
pub mod physics;
pub mod project;
pub mod registry;
pub mod render_graph;
pub mod script;
pub mod settings;

pub use engine::{Engine, EngineOptions, EntityOptions, EntityUpdate, LightOptions, SimMode, FIXED_TIME_STEP};
pub use error::{EngineError, EngineResult};
