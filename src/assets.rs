use crate::render_graph::{MaterialId, Texture, TextureSlot};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;

/// Reference to an external texture or environment image: a file path, a URL,
/// or an embedded data URL carried in a project document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TextureRefRepr", into = "TextureRefRepr")]
pub struct TextureRef {
    pub name: String,
    pub source: String,
}

impl TextureRef {
    pub fn from_source(source: impl Into<String>) -> Self {
        let source = source.into();
        let name = derive_name(&source);
        Self { name, source }
    }

    pub fn named(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self { name: name.into(), source: source.into() }
    }

    pub fn is_embedded(&self) -> bool {
        self.source.starts_with("data:")
    }
}

fn derive_name(source: &str) -> String {
    if source.starts_with("data:") {
        "embedded".to_string()
    } else {
        source.rsplit('/').next().unwrap_or(source).to_string()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TextureRefRepr {
    Source(String),
    Detailed { name: String, url: String },
}

impl From<TextureRefRepr> for TextureRef {
    fn from(repr: TextureRefRepr) -> Self {
        match repr {
            TextureRefRepr::Source(source) => TextureRef::from_source(source),
            TextureRefRepr::Detailed { name, url } => TextureRef::named(name, url),
        }
    }
}

impl From<TextureRef> for TextureRefRepr {
    fn from(value: TextureRef) -> Self {
        if value.name == derive_name(&value.source) {
            TextureRefRepr::Source(value.source)
        } else {
            TextureRefRepr::Detailed { name: value.name, url: value.source }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadTarget {
    MaterialSlot { material: MaterialId, slot: TextureSlot },
    Environment,
}

/// Completion message, consumed only from the frame tick. The consumer must
/// re-check that the target still exists before applying it.
#[derive(Debug)]
pub enum LoadCompletion {
    TextureReady { material: MaterialId, slot: TextureSlot, texture: Texture },
    EnvironmentReady { name: String },
}

/// Fire-and-forget resource loads.
///
/// Requests queue up from anywhere in the API; `pump` performs the decode work
/// and `drain` hands finished loads to the frame tick. There is no
/// cancellation: a superseded request still completes and is discarded by the
/// liveness check on the consuming side.
#[derive(Default)]
pub struct AssetLoader {
    pending: VecDeque<(LoadTarget, TextureRef)>,
    completed: Vec<LoadCompletion>,
    failures: Vec<(String, String)>,
}

impl AssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_texture(&mut self, material: MaterialId, slot: TextureSlot, source: TextureRef) {
        self.pending.push_back((LoadTarget::MaterialSlot { material, slot }, source));
    }

    pub fn request_environment(&mut self, source: TextureRef) {
        self.pending.push_back((LoadTarget::Environment, source));
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Runs every queued load to completion. Failures go to the error
    /// continuation (a warning plus the failure log); the referenced slot is
    /// simply never filled.
    pub fn pump(&mut self) {
        while let Some((target, source)) = self.pending.pop_front() {
            match decode_image(&source) {
                Ok(texture) => {
                    let completion = match target {
                        LoadTarget::MaterialSlot { material, slot } => {
                            LoadCompletion::TextureReady { material, slot, texture }
                        }
                        // The prefiltered cubemap itself belongs to the
                        // renderer; the engine only tracks the installed name.
                        LoadTarget::Environment => LoadCompletion::EnvironmentReady { name: texture.name },
                    };
                    self.completed.push(completion);
                }
                Err(reason) => {
                    warn!("resource load failed for '{}': {reason}", source.name);
                    self.failures.push((source.name.clone(), reason));
                }
            }
        }
    }

    pub fn drain(&mut self) -> Vec<LoadCompletion> {
        self.completed.drain(..).collect()
    }

    pub fn failures(&self) -> &[(String, String)] {
        &self.failures
    }
}

fn decode_image(source: &TextureRef) -> Result<Texture, String> {
    let bytes = if let Some(rest) = source.source.strip_prefix("data:") {
        let payload = rest.split_once(',').map(|(_, payload)| payload).ok_or("malformed data URL")?;
        BASE64.decode(payload).map_err(|err| format!("invalid base64 payload: {err}"))?
    } else {
        fs::read(&source.source).map_err(|err| format!("reading '{}': {err}", source.source))?
    };
    let decoded = image::load_from_memory(&bytes).map_err(|err| format!("decoding '{}': {err}", source.name))?;
    let rgba = decoded.to_rgba8();
    Ok(Texture {
        name: source.name.clone(),
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}
