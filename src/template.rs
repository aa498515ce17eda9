//! View rendering collaborator.
//!
//! The dispatch core only knows [`TemplateRenderer`]: hand it a handler-group,
//! a view name and a parameter bag, get markup back. [`MiniJinjaRenderer`] is
//! the bundled implementation, reading `{dir}/{group}/{view}.html`.

use anyhow::{anyhow, Context};
use minijinja::Environment;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Renders a view identifier plus parameters into markup bytes.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, group: &str, view: &str, params: &Map<String, Value>)
        -> anyhow::Result<Vec<u8>>;
}

/// Template renderer backed by `minijinja`, one file per view.
#[derive(Debug, Clone)]
pub struct MiniJinjaRenderer {
    base_dir: PathBuf,
}

impl MiniJinjaRenderer {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
        }
    }

    /// Resolve `group/view.html` under the base directory, refusing traversal.
    fn map_path(&self, group: &str, view: &str) -> Option<PathBuf> {
        let single = |segment: &str| {
            let mut components = Path::new(segment).components();
            matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            )
        };
        if !single(group) || !single(view) {
            return None;
        }
        Some(self.base_dir.join(group).join(format!("{view}.html")))
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    fn render(
        &self,
        group: &str,
        view: &str,
        params: &Map<String, Value>,
    ) -> anyhow::Result<Vec<u8>> {
        let path = self
            .map_path(group, view)
            .ok_or_else(|| anyhow!("invalid view identifier {group}/{view}"))?;
        let source = fs::read_to_string(&path)
            .with_context(|| format!("view {group}/{view} not found at {}", path.display()))?;
        let mut env = Environment::new();
        env.add_template("view", &source)?;
        let rendered = env.get_template("view")?.render(params)?;
        Ok(rendered.into_bytes())
    }
}
