//! Black-and-white film emulation: a pure pixel pipeline, a catalog of film
//! stock presets, and an edit session that renders debounced previews on a
//! background thread.

pub mod config;
pub mod error;
pub mod export;
pub mod presets;
pub mod processing;
pub mod session;
pub mod state;
pub mod worker;

pub use config::EditorConfig;
pub use error::{FilmError, Result};
pub use export::{EncodedImage, ExportFormat};
pub use presets::FilmPreset;
pub use processing::{BlurMode, PipelineOptions, transform, transform_raw, transform_seeded};
pub use session::{EditSession, ParameterSession};
pub use state::{FilmParameters, PaperTone, ParamField, Tint};
