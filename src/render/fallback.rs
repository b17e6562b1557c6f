//! Schematic SVG built straight from the diagram text, used when the external
//! renderer cannot produce anything usable.

use super::error::RenderError;
use crate::xml::escape_xml;
use std::fmt::Write;

pub const DEFAULT_TITLE: &str = "UML Diagram";
/// Display-space cap on listed elements and relationships.
pub const MAX_ENTRIES: usize = 10;

const ARROW: &str = " -> ";

/// What a line-prefix scan can recover from PlantUML source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    pub title: Option<String>,
    pub elements: Vec<String>,
    pub relationships: Vec<(String, String)>,
}

impl Outline {
    pub fn scan(source: &str) -> Self {
        let mut outline = Outline::default();

        for line in source.trim().lines() {
            let line = line.trim();
            if let Some(title) = line.strip_prefix("title ") {
                outline.title = Some(title.trim().to_string());
            } else if line.contains(ARROW) {
                let parts: Vec<&str> = line.split(ARROW).collect();
                if let [from, to] = parts.as_slice() {
                    outline
                        .relationships
                        .push((from.trim().to_string(), to.trim().to_string()));
                }
            } else if line.starts_with("class ") || line.starts_with("package ") {
                outline.elements.push(line.to_string());
            }
        }

        outline
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }
}

fn write_svg(outline: &Outline, svg: &mut String) -> std::fmt::Result {
    write!(
        svg,
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="800" height="600" viewBox="0 0 800 600" style="background:#f9f9f9;">
<style>
.title {{ font: bold 20px Arial, sans-serif; text-anchor: middle; }}
.element {{ font: 14px Arial, sans-serif; }}
.heading {{ font: bold 14px Arial, sans-serif; }}
.relationship {{ font: 12px Arial, sans-serif; }}
.notice {{ font: 12px Arial, sans-serif; fill: #d32f2f; text-anchor: middle; }}
</style>
<rect x="0" y="0" width="800" height="600" fill="#f9f9f9"/>
<text x="400" y="30" class="title">{title}</text>
<text x="400" y="60" class="notice">Renderer unavailable - showing simplified view</text>"##,
        title = escape_xml(outline.title()),
    )?;

    let mut y = 100;
    for element in outline.elements.iter().take(MAX_ENTRIES) {
        write!(
            svg,
            "\n<text x=\"50\" y=\"{}\" class=\"element\">{}</text>",
            y,
            escape_xml(element)
        )?;
        y += 25;
    }

    y += 20;
    write!(
        svg,
        "\n<text x=\"50\" y=\"{}\" class=\"heading\">Relationships:</text>",
        y
    )?;
    y += 25;

    for (from, to) in outline.relationships.iter().take(MAX_ENTRIES) {
        write!(
            svg,
            "\n<text x=\"70\" y=\"{}\" class=\"relationship\">{} \u{2192} {}</text>",
            y,
            escape_xml(from),
            escape_xml(to)
        )?;
        y += 20;
    }

    write!(
        svg,
        r#"
<text x="400" y="550" class="notice">To fix: check the renderer installation or its Graphviz version</text>
<text x="400" y="570" class="notice">See: https://plantuml.com/graphviz-dot</text>
</svg>"#
    )
}

/// Build the degraded view. Always declares its own background, so it is not
/// passed through background normalization.
pub fn render_fallback(source: &str) -> Result<String, RenderError> {
    let outline = Outline::scan(source);
    let mut svg = String::with_capacity(2048);
    write_svg(&outline, &mut svg)
        .map_err(|e| RenderError::Fallback(format!("failed to build SVG text: {}", e)))?;
    Ok(svg)
}
