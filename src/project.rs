use crate::engine::Engine;
use crate::script;
use crate::settings::{BackgroundConfig, FogConfig, RenderSettings};
use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const PROJECT_VERSION: &str = "1.1";

const DATA_MARKER: &str = "const PROJECT_DATA = \"";

/// The storage layer forbids these characters in keys; each maps to a fixed
/// token. `%` is part of the table so the substitution stays reversible.
const KEY_ESCAPES: &[(char, &str)] = &[
    ('%', "%25"),
    ('.', "%2E"),
    ('#', "%23"),
    ('$', "%24"),
    ('/', "%2F"),
    ('[', "%5B"),
    (']', "%5D"),
];

pub fn encode_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match KEY_ESCAPES.iter().find(|(forbidden, _)| *forbidden == ch) {
            Some((_, token)) => out.push_str(token),
            None => out.push(ch),
        }
    }
    out
}

pub fn decode_key(encoded: &str) -> Result<String> {
    let mut out = String::with_capacity(encoded.len());
    let mut chars = encoded.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let hi = chars.next().ok_or_else(|| anyhow!("truncated escape in key '{encoded}'"))?;
        let lo = chars.next().ok_or_else(|| anyhow!("truncated escape in key '{encoded}'"))?;
        let token = format!("%{hi}{lo}");
        match KEY_ESCAPES.iter().find(|(_, candidate)| *candidate == token) {
            Some((original, _)) => out.push(*original),
            None => bail!("unknown escape '{token}' in key '{encoded}'"),
        }
    }
    Ok(out)
}

/// Virtual file tree node. Leaves hold text payloads (script sources, data
/// URLs); directories nest by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileNode {
    Directory(BTreeMap<String, FileNode>),
    File { content: String },
}

impl FileNode {
    fn to_storage(&self) -> FileNode {
        match self {
            FileNode::Directory(entries) => FileNode::Directory(
                entries.iter().map(|(key, node)| (encode_key(key), node.to_storage())).collect(),
            ),
            FileNode::File { content } => FileNode::File { content: BASE64.encode(content.as_bytes()) },
        }
    }

    fn from_storage(&self) -> Result<FileNode> {
        match self {
            FileNode::Directory(entries) => {
                let mut decoded = BTreeMap::new();
                for (key, node) in entries {
                    decoded.insert(decode_key(key)?, node.from_storage()?);
                }
                Ok(FileNode::Directory(decoded))
            }
            FileNode::File { content } => {
                let bytes = BASE64.decode(content).context("Decoding file payload")?;
                let content = String::from_utf8(bytes).context("File payload is not valid UTF-8")?;
                Ok(FileNode::File { content })
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileTree {
    root: BTreeMap<String, FileNode>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed top-level layout used to resolve texture/script/world references
    /// by name at load time.
    pub fn with_default_layout() -> Self {
        let mut tree = Self::new();
        let mut assets = BTreeMap::new();
        assets.insert("textures".to_string(), FileNode::Directory(BTreeMap::new()));
        assets.insert("scripts".to_string(), FileNode::Directory(BTreeMap::new()));
        assets.insert("mundos".to_string(), FileNode::Directory(BTreeMap::new()));
        tree.root.insert("assets".to_string(), FileNode::Directory(assets));
        tree
    }

    pub fn insert_file<S: AsRef<str>>(&mut self, path: &[S], content: impl Into<String>) -> Result<()> {
        let (file_name, dirs) = match path.split_last() {
            Some(split) => split,
            None => bail!("empty file path"),
        };
        let mut current = &mut self.root;
        for segment in dirs {
            let entry = current
                .entry(segment.as_ref().to_string())
                .or_insert_with(|| FileNode::Directory(BTreeMap::new()));
            current = match entry {
                FileNode::Directory(entries) => entries,
                FileNode::File { .. } => bail!("'{}' is a file, not a directory", segment.as_ref()),
            };
        }
        current.insert(file_name.as_ref().to_string(), FileNode::File { content: content.into() });
        Ok(())
    }

    pub fn file_content<S: AsRef<str>>(&self, path: &[S]) -> Option<&str> {
        let (file_name, dirs) = path.split_last()?;
        let mut current = &self.root;
        for segment in dirs {
            current = match current.get(segment.as_ref())? {
                FileNode::Directory(entries) => entries,
                FileNode::File { .. } => return None,
            };
        }
        match current.get(file_name.as_ref())? {
            FileNode::File { content } => Some(content),
            FileNode::Directory(_) => None,
        }
    }

    pub fn root(&self) -> &BTreeMap<String, FileNode> {
        &self.root
    }

    fn to_storage(&self) -> FileTree {
        FileTree {
            root: self.root.iter().map(|(key, node)| (encode_key(key), node.to_storage())).collect(),
        }
    }

    fn from_storage(&self) -> Result<FileTree> {
        let mut root = BTreeMap::new();
        for (key, node) in &self.root {
            root.insert(decode_key(key)?, node.from_storage()?);
        }
        Ok(FileTree { root })
    }
}

/// The persistable project: virtual file tree, scene settings, the generated
/// scene script, and the pointer naming which tree entry drives the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub version: String,
    pub scene_script: String,
    pub files: FileTree,
    pub active_script: Vec<String>,
    pub background: BackgroundConfig,
    pub fog: FogConfig,
    pub render: RenderSettings,
    pub gravity: [f32; 3],
}

impl ProjectDocument {
    /// Snapshots the current scene together with a file tree.
    pub fn capture(engine: &Engine, files: FileTree, active_script: Vec<String>) -> Self {
        let gravity = engine.gravity();
        Self {
            version: PROJECT_VERSION.to_string(),
            scene_script: script::generate_scene_script(engine),
            files,
            active_script,
            background: engine.settings().background.clone(),
            fog: engine.settings().fog.clone(),
            render: engine.settings().render,
            gravity: [gravity.x, gravity.y, gravity.z],
        }
    }

    /// Tears the scene down completely and rebuilds it from the document:
    /// settings first, then the active script against the fresh registry.
    pub fn load_into(&self, engine: &mut Engine) -> Result<()> {
        engine.clear_all();
        engine.restore_default_entities();
        engine.set_gravity(glam::Vec3::new(self.gravity[0], self.gravity[1], self.gravity[2]));
        engine.set_render_settings(self.render);
        engine.set_fog(self.fog.clone()).map_err(|err| anyhow!("{err}"))?;
        engine.set_background_config(self.background.clone()).map_err(|err| anyhow!("{err}"))?;
        let code = self
            .files
            .file_content(&self.active_script)
            .map(str::to_string)
            .unwrap_or_else(|| self.scene_script.clone());
        script::run_script(engine, &code, "project scene script")
    }

    fn to_storage(&self) -> Self {
        Self {
            version: self.version.clone(),
            scene_script: BASE64.encode(self.scene_script.as_bytes()),
            files: self.files.to_storage(),
            active_script: self.active_script.iter().map(|segment| encode_key(segment)).collect(),
            background: self.background.clone(),
            fog: self.fog.clone(),
            render: self.render,
            gravity: self.gravity,
        }
    }

    fn from_storage(&self) -> Result<Self> {
        let scene_bytes = BASE64.decode(&self.scene_script).context("Decoding scene script payload")?;
        let mut active_script = Vec::with_capacity(self.active_script.len());
        for segment in &self.active_script {
            active_script.push(decode_key(segment)?);
        }
        Ok(Self {
            version: self.version.clone(),
            scene_script: String::from_utf8(scene_bytes).context("Scene script is not valid UTF-8")?,
            files: self.files.from_storage()?,
            active_script,
            background: self.background.clone(),
            fog: self.fog.clone(),
            render: self.render,
            gravity: self.gravity,
        })
    }
}

/// Emits the project as a script file embedding the storage-encoded document
/// in a string literal. Leaf payloads are base64 before embedding, so the
/// only characters needing escape are the literal's own delimiter and the
/// backslash.
pub fn encode_document(document: &ProjectDocument) -> Result<String> {
    let stored = document.to_storage();
    let json = serde_json::to_string(&stored).context("Serializing project document")?;
    let escaped = json.replace('\\', "\\\\").replace('"', "\\\"");
    let mut out = String::with_capacity(escaped.len() + 256);
    out.push_str(&format!("// Tamarin project file (version {}).\n", document.version));
    out.push_str("// The engine parses the embedded document on load; edit through the editor.\n");
    out.push_str(DATA_MARKER);
    out.push_str(&escaped);
    out.push_str("\";\n");
    Ok(out)
}

pub fn decode_document(text: &str) -> Result<ProjectDocument> {
    let start = text.find(DATA_MARKER).ok_or_else(|| anyhow!("missing project data literal"))?
        + DATA_MARKER.len();
    let rest = &text[start..];
    let end = rest.rfind("\";").ok_or_else(|| anyhow!("unterminated project data literal"))?;
    let json = unescape_literal(&rest[..end])?;
    let stored: ProjectDocument = serde_json::from_str(&json).context("Parsing project document")?;
    stored.from_storage()
}

fn unescape_literal(escaped: &str) -> Result<String> {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            other => bail!("invalid escape '\\{}' in project literal", other.unwrap_or(' ')),
        }
    }
    Ok(out)
}

pub fn save_to_path(document: &ProjectDocument, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating project directory {}", parent.display()))?;
    }
    let text = encode_document(document)?;
    fs::write(path, text.as_bytes()).with_context(|| format!("Writing project file {}", path.display()))?;
    Ok(())
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<ProjectDocument> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).with_context(|| format!("Reading project file {}", path.display()))?;
    decode_document(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_codec_round_trips_forbidden_characters() {
        for raw in ["texture.png", "a#b$c", "assets/mundos", "[index]", "50%.hdr", "plain"] {
            let encoded = encode_key(raw);
            for forbidden in ['.', '#', '$', '/', '[', ']'] {
                assert!(!encoded.contains(forbidden), "'{encoded}' still contains '{forbidden}'");
            }
            assert_eq!(decode_key(&encoded).unwrap(), raw);
        }
    }

    #[test]
    fn decode_key_rejects_unknown_escapes() {
        assert!(decode_key("%7E").is_err());
        assert!(decode_key("%2").is_err());
    }

    #[test]
    fn file_tree_round_trips_through_storage() {
        let mut tree = FileTree::with_default_layout();
        tree.insert_file(&["assets", "textures", "crate.png"], "data:image/png;base64,AAAA").unwrap();
        tree.insert_file(&["assets", "scripts", "main.scene.rhai"], "scene.log(\"` $ [ ]\");").unwrap();
        let stored = tree.to_storage();
        let json = serde_json::to_string(&stored).unwrap();
        let reparsed: FileTree = serde_json::from_str(&json).unwrap();
        assert_eq!(reparsed.from_storage().unwrap(), tree);
    }

    #[test]
    fn content_with_delimiters_survives_the_document_literal() {
        let mut tree = FileTree::with_default_layout();
        tree.insert_file(&["assets", "scripts", "tricky.rhai"], "let s = \"`backticks` and \\\"quotes\\\"\";")
            .unwrap();
        let document = ProjectDocument {
            version: PROJECT_VERSION.to_string(),
            scene_script: "scene.clear_scene();\n".to_string(),
            files: tree,
            active_script: vec!["assets".into(), "scripts".into(), "tricky.rhai".into()],
            background: BackgroundConfig::default(),
            fog: FogConfig::default(),
            render: RenderSettings::default(),
            gravity: [0.0, -9.82, 0.0],
        };
        let text = encode_document(&document).unwrap();
        let decoded = decode_document(&text).unwrap();
        assert_eq!(decoded, document);
    }
}
