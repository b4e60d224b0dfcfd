use serde::{Deserialize, Serialize};

fn default_background_color() -> String {
    "#1a1a1a".to_string()
}

/// Solid color plus an optional environment-map reference by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundConfig {
    #[serde(default = "default_background_color")]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_map: Option<String>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self { color: default_background_color(), environment_map: None }
    }
}

fn default_fog_color() -> String {
    "#87ceeb".to_string()
}

const fn default_fog_near() -> f32 {
    20.0
}

const fn default_fog_far() -> f32 {
    100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FogConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_fog_color")]
    pub color: String,
    #[serde(default = "default_fog_near")]
    pub near: f32,
    #[serde(default = "default_fog_far")]
    pub far: f32,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            color: default_fog_color(),
            near: default_fog_near(),
            far: default_fog_far(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowType {
    Basic,
    PcfSoft,
    Vsm,
}

impl ShadowType {
    pub fn as_str(self) -> &'static str {
        match self {
            ShadowType::Basic => "basic",
            ShadowType::PcfSoft => "pcf_soft",
            ShadowType::Vsm => "vsm",
        }
    }

    /// Unrecognized values fall back to soft shadows, the renderer default.
    pub fn parse(value: &str) -> Self {
        match value {
            "basic" => ShadowType::Basic,
            "vsm" => ShadowType::Vsm,
            _ => ShadowType::PcfSoft,
        }
    }
}

impl Default for ShadowType {
    fn default() -> Self {
        ShadowType::PcfSoft
    }
}

const fn default_shadow_map_size() -> u32 {
    1024
}

const fn default_exposure() -> f32 {
    1.0
}

const fn default_pixel_ratio() -> f32 {
    1.0
}

const fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "default_enabled")]
    pub shadows_enabled: bool,
    #[serde(default)]
    pub shadow_type: ShadowType,
    #[serde(default = "default_shadow_map_size")]
    pub shadow_map_size: u32,
    #[serde(default = "default_enabled")]
    pub tone_mapping_enabled: bool,
    #[serde(default = "default_exposure")]
    pub tone_mapping_exposure: f32,
    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadows_enabled: true,
            shadow_type: ShadowType::default(),
            shadow_map_size: default_shadow_map_size(),
            tone_mapping_enabled: true,
            tone_mapping_exposure: default_exposure(),
            pixel_ratio: default_pixel_ratio(),
        }
    }
}

/// Partial render-settings update; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettingsPatch {
    pub shadows_enabled: Option<bool>,
    pub shadow_type: Option<String>,
    pub shadow_map_size: Option<u32>,
    pub tone_mapping_enabled: Option<bool>,
    pub tone_mapping_exposure: Option<f32>,
    pub pixel_ratio: Option<f32>,
}

impl RenderSettings {
    pub fn apply(&mut self, patch: &RenderSettingsPatch) {
        if let Some(enabled) = patch.shadows_enabled {
            self.shadows_enabled = enabled;
        }
        if let Some(shadow_type) = &patch.shadow_type {
            self.shadow_type = ShadowType::parse(shadow_type);
        }
        if let Some(size) = patch.shadow_map_size {
            self.shadow_map_size = size;
        }
        if let Some(enabled) = patch.tone_mapping_enabled {
            self.tone_mapping_enabled = enabled;
        }
        if let Some(exposure) = patch.tone_mapping_exposure {
            self.tone_mapping_exposure = exposure;
        }
        if let Some(ratio) = patch.pixel_ratio {
            self.pixel_ratio = ratio;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityPreset {
    Low,
    Medium,
    High,
}

impl QualityPreset {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(QualityPreset::Low),
            "medium" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    pub fn settings(self) -> RenderSettings {
        match self {
            QualityPreset::Low => RenderSettings {
                shadows_enabled: true,
                shadow_type: ShadowType::Basic,
                shadow_map_size: 512,
                tone_mapping_enabled: true,
                tone_mapping_exposure: 0.8,
                pixel_ratio: 0.75,
            },
            QualityPreset::Medium => RenderSettings {
                shadows_enabled: true,
                shadow_type: ShadowType::PcfSoft,
                shadow_map_size: 1024,
                tone_mapping_enabled: true,
                tone_mapping_exposure: 1.0,
                pixel_ratio: 1.0,
            },
            QualityPreset::High => RenderSettings {
                shadows_enabled: true,
                shadow_type: ShadowType::PcfSoft,
                shadow_map_size: 2048,
                tone_mapping_enabled: true,
                tone_mapping_exposure: 1.2,
                pixel_ratio: 1.0,
            },
        }
    }
}

/// All scene-level state outside the entity registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSettings {
    #[serde(default)]
    pub background: BackgroundConfig,
    #[serde(default)]
    pub fog: FogConfig,
    #[serde(default)]
    pub render: RenderSettings,
}
