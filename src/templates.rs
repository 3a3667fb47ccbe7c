//! Compiled page and email templates.
//!
//! Templates are embedded at build time and compiled once at startup. Files
//! ending in `.html` are autoescaped; the plain-text email body is not.

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use tera::Tera;

#[derive(RustEmbed)]
#[folder = "templates"]
struct TemplateFiles;

pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn load() -> Result<Self> {
        let mut sources = Vec::new();
        for name in TemplateFiles::iter() {
            let file = TemplateFiles::get(&name)
                .with_context(|| format!("Embedded template vanished: {name}"))?;
            let body = String::from_utf8(file.data.into_owned())
                .with_context(|| format!("Template is not UTF-8: {name}"))?;
            sources.push((name.to_string(), body));
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(sources)
            .context("Failed to compile templates")?;

        Ok(Self { tera })
    }

    pub fn render(&self, name: &str, context: &tera::Context) -> Result<String> {
        self.tera
            .render(name, context)
            .with_context(|| format!("Failed to render template {name}"))
    }
}
