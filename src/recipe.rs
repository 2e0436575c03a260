//! JSON texture recipes and the material registry.
//!
//! A recipe file names textures and texture families. Each one becomes a [`Material`]: a pure
//! function from the shared [`GraphBuilder`] to the output tasks it needs.
//!
//! ```json
//! {
//!   "textures": {
//!     "block/test": {
//!       "image": { "stack": { "background": "#ff0000", "layers": [
//!         { "layer": { "source": "triangle", "paint": "#0000ff" } }
//!       ] } }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::color::ColorDef;
use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{PackError, PackResult};
use crate::graph::GraphBuilder;
use crate::task::{ImageTask, OutputTask};

/// One texture family's contribution to the pack.
pub trait Material: Send + Sync {
    fn name(&self) -> &str;

    /// Build every output this material needs. Must not start any task.
    fn build(&self, graph: &GraphBuilder) -> PackResult<Vec<OutputTask>>;
}

/// Top-level recipe document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeFile {
    /// Output name (e.g. `block/stone`) to texture.
    #[serde(default)]
    pub textures: BTreeMap<String, TextureDef>,
    #[serde(default)]
    pub palettes: Vec<PaletteDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextureDef {
    pub image: ImageExpr,
    /// Extra output names that receive a copy of the same file.
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// One set of layers rendered once per named color.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaletteDef {
    /// Output name template. `{color}` is replaced by each color's name.
    pub output: String,
    pub colors: BTreeMap<String, ColorDef>,
    #[serde(default)]
    pub background: Option<ColorDef>,
    /// Top-level `layer`s without a paint take the palette color.
    pub layers: Vec<ImageExpr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageExpr {
    Source(String),
    Layer {
        source: String,
        #[serde(default)]
        paint: Option<ColorDef>,
        #[serde(default = "one")]
        alpha: f32,
    },
    Repaint {
        base: Box<ImageExpr>,
        #[serde(default)]
        paint: Option<ColorDef>,
        #[serde(default = "one")]
        alpha: f32,
    },
    Stack {
        #[serde(default)]
        background: Option<ColorDef>,
        layers: Vec<ImageExpr>,
    },
    Animate {
        #[serde(default)]
        background: Option<ColorDef>,
        frames: Vec<ImageExpr>,
    },
}

fn one() -> f32 {
    1.0
}

fn fill(color: Option<ColorDef>) -> Rgba8Premul {
    color.map_or(Rgba8Premul::TRANSPARENT, Rgba8Premul::from)
}

impl ImageExpr {
    pub fn build(&self, graph: &GraphBuilder) -> PackResult<ImageTask> {
        match self {
            Self::Source(name) => graph.source(name),
            Self::Layer {
                source,
                paint,
                alpha,
            } => graph.layer(source, paint.map(Rgba8Premul::from), *alpha),
            Self::Repaint { base, paint, alpha } => {
                let base = base.build(graph)?;
                graph.repaint(&base, paint.map(Rgba8Premul::from), *alpha)
            }
            Self::Stack { background, layers } => {
                let layers = build_all(layers, graph)?;
                graph.stack(fill(*background), layers)
            }
            Self::Animate { background, frames } => {
                let frames = build_all(frames, graph)?;
                graph.animate(fill(*background), frames)
            }
        }
    }

    fn painted_by_default(&self, color: ColorDef) -> ImageExpr {
        match self {
            Self::Layer {
                source,
                paint: None,
                alpha,
            } => Self::Layer {
                source: source.clone(),
                paint: Some(color),
                alpha: *alpha,
            },
            other => other.clone(),
        }
    }
}

fn build_all(exprs: &[ImageExpr], graph: &GraphBuilder) -> PackResult<Vec<ImageTask>> {
    exprs.iter().map(|e| e.build(graph)).collect()
}

impl RecipeFile {
    pub fn from_reader<R: std::io::Read>(r: R) -> PackResult<Self> {
        serde_json::from_reader(r).map_err(|e| PackError::serde(format!("parse recipe JSON: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> PackResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| PackError::io(path, e))?;
        Self::from_reader(BufReader::new(f))
    }

    /// One material per texture and per palette.
    pub fn materials(&self) -> Vec<Arc<dyn Material>> {
        let textures = self.textures.iter().map(|(name, def)| {
            Arc::new(TextureMaterial {
                name: name.clone(),
                def: def.clone(),
            }) as Arc<dyn Material>
        });
        let palettes = self
            .palettes
            .iter()
            .map(|def| Arc::new(PaletteMaterial { def: def.clone() }) as Arc<dyn Material>);
        textures.chain(palettes).collect()
    }
}

/// A single named texture plus its aliases.
pub struct TextureMaterial {
    name: String,
    def: TextureDef,
}

impl TextureMaterial {
    pub fn new(name: impl Into<String>, def: TextureDef) -> Self {
        Self {
            name: name.into(),
            def,
        }
    }
}

impl Material for TextureMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self, graph: &GraphBuilder) -> PackResult<Vec<OutputTask>> {
        let image = self.def.image.build(graph)?;
        let mut outputs = vec![graph.out(&self.name, &image)?];
        for alias in &self.def.aliases {
            outputs.push(graph.out(alias, &image)?);
        }
        outputs.dedup_by(|a, b| a.same(b));
        Ok(outputs)
    }
}

/// A texture family: the same layers, once per palette color.
pub struct PaletteMaterial {
    def: PaletteDef,
}

impl PaletteMaterial {
    pub fn new(def: PaletteDef) -> Self {
        Self { def }
    }
}

impl Material for PaletteMaterial {
    fn name(&self) -> &str {
        &self.def.output
    }

    fn build(&self, graph: &GraphBuilder) -> PackResult<Vec<OutputTask>> {
        let def = &self.def;
        if def.colors.is_empty() {
            return Err(PackError::validation(format!(
                "palette '{}' has no colors",
                def.output
            )));
        }
        if def.colors.len() > 1 && !def.output.contains("{color}") {
            return Err(PackError::validation(format!(
                "palette '{}' has several colors but no {{color}} in its output name",
                def.output
            )));
        }

        let mut outputs = Vec::with_capacity(def.colors.len());
        for (color_name, color) in &def.colors {
            let layers = def
                .layers
                .iter()
                .map(|l| l.painted_by_default(*color).build(graph))
                .collect::<PackResult<Vec<_>>>()?;
            let image = graph.stack(fill(def.background), layers)?;
            outputs.push(graph.out(&def.output.replace("{color}", color_name), &image)?);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
#[path = "../tests/unit/recipe.rs"]
mod tests;
