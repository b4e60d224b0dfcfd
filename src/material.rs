use crate::assets::{AssetLoader, TextureRef};
use crate::color::{Color, ColorNames};
use crate::error::EngineResult;
use crate::render_graph::{Material, MaterialId, RenderGraph, TextureSlot};
use serde::{Deserialize, Serialize};

/// Loose material description accepted by the entity API and the replay
/// script dialect. Missing fields fall back to the default PBR material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialDesc {
    pub color: Option<String>,
    pub roughness: Option<f32>,
    pub metalness: Option<f32>,
    pub map: Option<TextureRef>,
    pub roughness_map: Option<TextureRef>,
    pub metalness_map: Option<TextureRef>,
}

/// Resolves a loose description into a concrete material handle, queueing
/// texture loads for the slots that reference external images. An invalid
/// color aborts before anything is allocated.
pub fn resolve(
    desc: &MaterialDesc,
    names: &ColorNames,
    graph: &mut RenderGraph,
    loader: &mut AssetLoader,
) -> EngineResult<MaterialId> {
    let mut material = Material::default();
    if let Some(color) = &desc.color {
        material.color = Color::parse(color, names)?;
    }
    if let Some(roughness) = desc.roughness {
        material.roughness = roughness.clamp(0.0, 1.0);
    }
    if let Some(metalness) = desc.metalness {
        material.metalness = metalness.clamp(0.0, 1.0);
    }
    let id = graph.add_material(material);

    let slots = [
        (TextureSlot::BaseColor, &desc.map),
        (TextureSlot::Roughness, &desc.roughness_map),
        (TextureSlot::Metalness, &desc.metalness_map),
    ];
    for (slot, source) in slots {
        if let Some(texture) = source {
            loader.request_texture(id, slot, texture.clone());
        }
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_color_allocates_nothing() {
        let mut graph = RenderGraph::new();
        let mut loader = AssetLoader::new();
        let names = ColorNames::new();
        let desc = MaterialDesc { color: Some("bogus".into()), ..MaterialDesc::default() };
        assert!(resolve(&desc, &names, &mut graph, &mut loader).is_err());
        assert_eq!(graph.material_count(), 0);
        assert_eq!(loader.pending_count(), 0);
    }

    #[test]
    fn texture_slots_queue_loads() {
        let mut graph = RenderGraph::new();
        let mut loader = AssetLoader::new();
        let names = ColorNames::new();
        let desc = MaterialDesc {
            color: Some("#804020".into()),
            map: Some(TextureRef::from_source("crate.png")),
            ..MaterialDesc::default()
        };
        let id = resolve(&desc, &names, &mut graph, &mut loader).unwrap();
        assert_eq!(graph.material(id).unwrap().color.to_hex(), "#804020");
        assert_eq!(loader.pending_count(), 1);
    }
}
