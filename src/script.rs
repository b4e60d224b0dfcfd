use crate::engine::{BackgroundOptions, Engine, EntityOptions, LightOptions};
use crate::registry::{EntityKind, PhysicsConfig};
use crate::render_graph::{Geometry, LightParams, NodeKind, TextureSlot};
use crate::settings::{FogConfig, RenderSettingsPatch};
use anyhow::{anyhow, Context, Result};
use glam::EulerRot;
use log::{error, info};
use rhai::{Dynamic, Map, Scope};
use std::fmt::Write as _;

/// Script-facing handle over the engine, registered as the `scene` variable.
/// Failures inside a call are logged and abort only that call; the script
/// keeps running and the registry stays consistent.
#[derive(Clone, Copy)]
pub struct SceneApi {
    engine: *mut Engine,
}

// The API object lives only for the duration of a single single-threaded
// script run; rhai requires these bounds for registered types.
unsafe impl Send for SceneApi {}
unsafe impl Sync for SceneApi {}

impl SceneApi {
    pub fn new(engine: &mut Engine) -> Self {
        Self { engine }
    }

    fn engine(&mut self) -> &mut Engine {
        unsafe { &mut *self.engine }
    }

    fn clear_scene(&mut self) {
        self.engine().clear_user_entities();
    }

    fn set_gravity(&mut self, x: f32, y: f32, z: f32) {
        self.engine().set_gravity(glam::Vec3::new(x, y, z));
    }

    fn set_fog(&mut self, options: Map) {
        match from_map::<FogConfig>(options) {
            Ok(fog) => {
                if let Err(err) = self.engine().set_fog(fog) {
                    error!("[script] set_fog: {err}");
                }
            }
            Err(err) => error!("[script] set_fog: {err}"),
        }
    }

    fn set_background(&mut self, options: Map) {
        match from_map::<BackgroundOptions>(options) {
            Ok(background) => {
                if let Err(err) = self.engine().set_background(&background) {
                    error!("[script] set_background: {err}");
                }
            }
            Err(err) => error!("[script] set_background: {err}"),
        }
    }

    fn apply_render_settings(&mut self, options: Map) {
        match from_map::<RenderSettingsPatch>(options) {
            Ok(patch) => self.engine().apply_render_settings(&patch),
            Err(err) => error!("[script] apply_render_settings: {err}"),
        }
    }

    fn add_entity(&mut self, id: &str, name: &str, kind: &str, options: Map) {
        let kind = match EntityKind::parse(kind) {
            Ok(kind) => kind,
            Err(err) => {
                error!("[script] add_entity '{id}': {err}");
                return;
            }
        };
        match from_map::<EntityOptions>(options) {
            Ok(options) => {
                if let Err(err) = self.engine().add_entity(id, name, kind, &options) {
                    error!("[script] add_entity '{id}': {err}");
                }
            }
            Err(err) => error!("[script] add_entity '{id}': {err}"),
        }
    }

    fn add_light(&mut self, id: &str, name: &str, options: Map) {
        match from_map::<LightOptions>(options) {
            Ok(options) => {
                if let Err(err) = self.engine().add_light(id, name, &options) {
                    error!("[script] add_light '{id}': {err}");
                }
            }
            Err(err) => error!("[script] add_light '{id}': {err}"),
        }
    }

    fn log(&mut self, message: &str) {
        info!("[script] {message}");
    }
}

fn from_map<T: serde::de::DeserializeOwned>(map: Map) -> Result<T> {
    rhai::serde::from_dynamic(&Dynamic::from(map)).map_err(|err| anyhow!("{err}"))
}

fn register_api(engine: &mut rhai::Engine) {
    engine.register_type_with_name::<SceneApi>("Scene");
    engine.register_fn("clear_scene", SceneApi::clear_scene);
    engine.register_fn("set_gravity", SceneApi::set_gravity);
    engine.register_fn("set_fog", SceneApi::set_fog);
    engine.register_fn("set_background", SceneApi::set_background);
    engine.register_fn("apply_render_settings", SceneApi::apply_render_settings);
    engine.register_fn("add_entity", SceneApi::add_entity);
    engine.register_fn("add_light", SceneApi::add_light);
    engine.register_fn("log", SceneApi::log);
}

/// Runs caller-supplied code against the registry API.
pub fn run_script(engine: &mut Engine, code: &str, name: &str) -> Result<()> {
    let mut rhai_engine = rhai::Engine::new();
    rhai_engine.set_fast_operators(true);
    register_api(&mut rhai_engine);
    let mut scope = Scope::new();
    scope.push("scene", SceneApi::new(engine));
    rhai_engine
        .run_with_scope(&mut scope, code)
        .map_err(|err| anyhow!("{err}"))
        .with_context(|| format!("Running scene script '{name}'"))?;
    info!("script '{name}' executed");
    Ok(())
}

/// Two-decimal rounding shared by every number in the replay script, with
/// negative zero folded into zero so a value survives a generate → execute →
/// regenerate cycle byte-identically.
fn num(value: f32) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.2}")
}

fn esc(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Serializes the scene as an ordered sequence of registry calls. Executing
/// the result against a fresh engine and regenerating yields the same bytes.
pub fn generate_scene_script(engine: &Engine) -> String {
    let mut script = String::new();
    let _ = writeln!(script, "// Scene replay script generated by the editor.");
    let _ = writeln!(script, "// Texture references are resolved by name at load time.");
    let _ = writeln!(script);
    let _ = writeln!(script, "scene.clear_scene();");
    let _ = writeln!(script);

    let gravity = engine.gravity();
    let _ = writeln!(
        script,
        "scene.set_gravity({}, {}, {});",
        num(gravity.x),
        num(gravity.y),
        num(gravity.z)
    );

    let fog = &engine.settings().fog;
    if fog.enabled {
        let _ = writeln!(
            script,
            "scene.set_fog(#{{ enabled: true, color: \"{}\", near: {}, far: {} }});",
            esc(&fog.color),
            num(fog.near),
            num(fog.far)
        );
    } else {
        let _ = writeln!(script, "scene.set_fog(#{{ enabled: false }});");
    }

    let background = &engine.settings().background;
    match &background.environment_map {
        Some(map) => {
            let _ = writeln!(
                script,
                "scene.set_background(#{{ color: \"{}\", environment_map: \"{}\" }});",
                esc(&background.color),
                esc(map)
            );
        }
        None => {
            let _ = writeln!(script, "scene.set_background(#{{ color: \"{}\" }});", esc(&background.color));
        }
    }

    let render = &engine.settings().render;
    let _ = writeln!(
        script,
        "scene.apply_render_settings(#{{ shadows_enabled: {}, shadow_type: \"{}\", shadow_map_size: {}, \
         tone_mapping_enabled: {}, tone_mapping_exposure: {}, pixel_ratio: {} }});",
        render.shadows_enabled,
        render.shadow_type.as_str(),
        render.shadow_map_size,
        render.tone_mapping_enabled,
        num(render.tone_mapping_exposure),
        num(render.pixel_ratio)
    );
    let _ = writeln!(script);

    for record in engine.registry().iter() {
        if record.default_entity {
            continue;
        }
        let Some(node) = engine.graph().node(record.visual) else {
            continue;
        };
        let position = node.position;
        let (ex, ey, ez) = node.orientation.to_euler(EulerRot::XYZ);

        let mut fields: Vec<String> = Vec::new();
        fields.push(format!(
            "position: #{{ x: {}, y: {}, z: {} }}",
            num(position.x),
            num(position.y),
            num(position.z)
        ));
        fields.push(format!("rotation: #{{ x: {}, y: {}, z: {} }}", num(ex), num(ey), num(ez)));

        match &node.kind {
            NodeKind::Light(params) => {
                emit_light_fields(&mut fields, params);
                let _ = writeln!(
                    script,
                    "scene.add_light(\"{}\", \"{}\", #{{\n    {}\n}});",
                    esc(&record.id),
                    esc(&record.name),
                    fields.join(",\n    ")
                );
                let _ = writeln!(script);
            }
            NodeKind::Camera { fov_degrees, near, far, .. } => {
                fields.push(format!("fov: {}", num(*fov_degrees)));
                fields.push(format!("near: {}", num(*near)));
                fields.push(format!("far: {}", num(*far)));
                let _ = writeln!(
                    script,
                    "scene.add_entity(\"{}\", \"{}\", \"camera\", #{{\n    {}\n}});",
                    esc(&record.id),
                    esc(&record.name),
                    fields.join(",\n    ")
                );
                let _ = writeln!(script);
            }
            NodeKind::Mesh { geometry, material } => {
                if let Some(geometry) = engine.graph().geometry(*geometry) {
                    emit_geometry_fields(&mut fields, geometry);
                }
                if let Some(material) = engine.graph().material(*material) {
                    let mut parts = vec![
                        format!("color: \"{}\"", material.color.to_hex()),
                        format!("roughness: {}", num(material.roughness)),
                        format!("metalness: {}", num(material.metalness)),
                    ];
                    for slot in [TextureSlot::BaseColor, TextureSlot::Roughness, TextureSlot::Metalness] {
                        let name = material
                            .texture_in(slot)
                            .and_then(|id| engine.graph().texture(id))
                            .map(|texture| texture.name.clone());
                        if let Some(name) = name {
                            // Embedded payloads are carried by the project
                            // document, not the replay script.
                            if !name.starts_with("data:") && name != "embedded" {
                                parts.push(format!("{}: \"{}\"", slot.label(), esc(&name)));
                            }
                        }
                    }
                    fields.push(format!("material: #{{ {} }}", parts.join(", ")));
                }
                if let Some(config) = &record.physics {
                    fields.push(physics_field(config));
                }
                let _ = writeln!(
                    script,
                    "scene.add_entity(\"{}\", \"{}\", \"{}\", #{{\n    {}\n}});",
                    esc(&record.id),
                    esc(&record.name),
                    record.kind.as_str(),
                    fields.join(",\n    ")
                );
                let _ = writeln!(script);
            }
            _ => {}
        }
    }

    info!("replay script generated ({} bytes)", script.len());
    script
}

fn emit_geometry_fields(fields: &mut Vec<String>, geometry: &Geometry) {
    match geometry {
        Geometry::Box { width, height, depth } => {
            fields.push(format!(
                "size: #{{ w: {}, h: {}, d: {} }}",
                num(*width),
                num(*height),
                num(*depth)
            ));
        }
        Geometry::Sphere { radius } => fields.push(format!("radius: {}", num(*radius))),
        Geometry::Plane { width, depth } => {
            fields.push(format!("size: #{{ w: {}, d: {} }}", num(*width), num(*depth)));
        }
    }
}

fn emit_light_fields(fields: &mut Vec<String>, params: &LightParams) {
    match params {
        LightParams::Ambient { color, intensity } => {
            fields.push("type: \"ambient\"".to_string());
            fields.push(format!("color: \"{}\"", color.to_hex()));
            fields.push(format!("intensity: {}", num(*intensity)));
        }
        LightParams::Directional { color, intensity, cast_shadow, shadow_map_size } => {
            fields.push("type: \"directional\"".to_string());
            fields.push(format!("color: \"{}\"", color.to_hex()));
            fields.push(format!("intensity: {}", num(*intensity)));
            fields.push(format!("cast_shadow: {cast_shadow}"));
            fields.push(format!("shadow_map_size: {shadow_map_size}"));
        }
        LightParams::Point { color, intensity, distance, decay, cast_shadow } => {
            fields.push("type: \"point\"".to_string());
            fields.push(format!("color: \"{}\"", color.to_hex()));
            fields.push(format!("intensity: {}", num(*intensity)));
            fields.push(format!("distance: {}", num(*distance)));
            fields.push(format!("decay: {}", num(*decay)));
            fields.push(format!("cast_shadow: {cast_shadow}"));
        }
    }
}

fn physics_field(config: &PhysicsConfig) -> String {
    format!(
        "physics: #{{ body_type: \"{}\", mass: {}, friction: {}, restitution: {}, collision_shape: \"{}\", \
         linear_damping: {}, angular_damping: {} }}",
        config.body_type.as_str(),
        num(config.mass),
        num(config.friction),
        num(config.restitution),
        config.collision_shape.as_str(),
        num(config.linear_damping),
        num(config.angular_damping)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_folds_negative_zero() {
        assert_eq!(num(-0.0), "0.00");
        assert_eq!(num(-0.004), "0.00");
        assert_eq!(num(-9.82), "-9.82");
    }

    #[test]
    fn esc_protects_quotes() {
        assert_eq!(esc("a\"b\\c"), "a\\\"b\\\\c");
    }
}
