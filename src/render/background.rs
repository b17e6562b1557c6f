//! White-background normalization for SVG produced by the external renderer.
//!
//! Dark themes are overridden: the root background and any canvas-filling
//! first `<rect>` end up white whatever colour the renderer chose.

use crate::xml::{parse_length, parse_view_box};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

const WHITE: &str = "#FFFFFF";
const BACKGROUND_STYLE: &str = "background:#FFFFFF;";

/// A start tag as found in the source text.
struct Tag {
    /// Byte range of `<name ...>` in the source.
    start: usize,
    end: usize,
    name: String,
    /// Raw (still escaped) attribute values, in document order.
    attrs: Vec<(String, String)>,
    self_closing: bool,
}

impl Tag {
    fn read(svg: &str, element: &BytesStart, end: usize, self_closing: bool) -> Option<Self> {
        let start = svg.get(..end)?.rfind('<')?;
        let attrs = element
            .attributes()
            .flatten()
            .map(|a| {
                (
                    String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                    String::from_utf8_lossy(&a.value).into_owned(),
                )
            })
            .collect();
        Some(Self {
            start,
            end,
            name: String::from_utf8_lossy(element.name().as_ref()).into_owned(),
            attrs,
            self_closing,
        })
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Replace `name`'s value in place, or add it (first when `prepend`).
    fn set_attr(&mut self, name: &str, value: String, prepend: bool) {
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None if prepend => self.attrs.insert(0, (name.to_string(), value)),
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(key, _)| key != name);
    }

    fn render(&self, self_closing: bool) -> String {
        let mut out = format!("<{}", self.name);
        for (key, value) in &self.attrs {
            let quote = if value.contains('"') { '\'' } else { '"' };
            out.push_str(&format!(" {}={}{}{}", key, quote, value, quote));
        }
        out.push_str(if self_closing { "/>" } else { ">" });
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Canvas {
    Box { x: f64, y: f64, width: f64, height: f64 },
    Unknown,
}

fn canvas_of(root: &Tag) -> Canvas {
    if let Some((x, y, width, height)) = root.attr("viewBox").and_then(parse_view_box) {
        return Canvas::Box { x, y, width, height };
    }
    let width = root.attr("width").and_then(parse_length);
    let height = root.attr("height").and_then(parse_length);
    match (width, height) {
        (Some(width), Some(height)) => Canvas::Box {
            x: 0.0,
            y: 0.0,
            width,
            height,
        },
        _ => Canvas::Unknown,
    }
}

/// `prop:value` pairs of a style attribute, with the property lowercased.
fn declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            Some((prop.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}

fn style_value(style: Option<&str>, props: &[&str]) -> Option<String> {
    declarations(style?)
        .into_iter()
        .rev()
        .find(|(prop, _)| props.contains(&prop.as_str()))
        .map(|(_, value)| value)
}

/// Rebuild `style` without the given properties.
fn strip_declarations(style: &str, props: &[&str]) -> String {
    style
        .split(';')
        .filter(|decl| !decl.trim().is_empty())
        .filter(|decl| {
            let prop = decl.split(':').next().unwrap_or_default();
            !props.contains(&prop.trim().to_ascii_lowercase().as_str())
        })
        .map(|decl| format!("{};", decl.trim()))
        .collect()
}

fn is_white(color: &str) -> bool {
    let compact: String = color
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    matches!(
        compact.as_str(),
        "white" | "#fff" | "#ffffff" | "#ffff" | "#ffffffff" | "rgb(255,255,255)"
    )
}

fn covers(value: Option<&str>, extent: Option<f64>) -> bool {
    let Some(value) = value else {
        return false;
    };
    if value.trim() == "100%" {
        return true;
    }
    match (parse_length(value), extent) {
        (Some(v), Some(extent)) => v >= extent,
        _ => false,
    }
}

fn fills_canvas(rect: &Tag, canvas: Canvas) -> bool {
    let (width, height) = match canvas {
        Canvas::Box { width, height, .. } => (Some(width), Some(height)),
        Canvas::Unknown => (None, None),
    };
    covers(rect.attr("width"), width) && covers(rect.attr("height"), height)
}

/// Effective fill of a rect. SVG paints a rect without any fill black.
fn rect_fill(rect: &Tag) -> String {
    style_value(rect.attr("style"), &["fill"])
        .or_else(|| rect.attr("fill").map(str::to_string))
        .unwrap_or_else(|| "black".to_string())
}

/// The root `<svg>` tag and, when it is a canvas-filling rect, its first child.
fn find_root(svg: &str) -> Option<(Tag, Option<Tag>)> {
    let mut reader = Reader::from_str(svg);

    let root = loop {
        let (element, self_closing) = match reader.read_event() {
            Ok(Event::Start(element)) => (element, false),
            Ok(Event::Empty(element)) => (element, true),
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => continue,
        };
        if element.local_name().as_ref() != b"svg" {
            return None;
        }
        let end = reader.buffer_position() as usize;
        break Tag::read(svg, &element, end, self_closing)?;
    };

    if root.self_closing {
        return Some((root, None));
    }

    let canvas = canvas_of(&root);
    let first_rect = loop {
        let (element, self_closing) = match reader.read_event() {
            Ok(Event::Start(element)) => (element, false),
            Ok(Event::Empty(element)) => (element, true),
            Ok(Event::Text(_)) | Ok(Event::Comment(_)) => continue,
            _ => break None,
        };
        if element.local_name().as_ref() != b"rect" {
            break None;
        }
        let end = reader.buffer_position() as usize;
        break Tag::read(svg, &element, end, self_closing).filter(|r| fills_canvas(r, canvas));
    };

    Some((root, first_rect))
}

fn canvas_rect(canvas: Canvas) -> String {
    match canvas {
        Canvas::Box {
            x,
            y,
            width,
            height,
        } => format!(
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
            x, y, width, height, WHITE
        ),
        Canvas::Unknown => format!(r#"<rect x="0" y="0" width="100%" height="100%" fill="{}"/>"#, WHITE),
    }
}

/// Guarantee an opaque white background on a rendered SVG:
///
/// - the root element's style declares `background:#FFFFFF`, replacing any
///   other background colour;
/// - the first child is a white rect covering the view box: an existing
///   canvas-filling rect is repainted white, otherwise one is inserted right
///   after the root tag.
///
/// Input that does not start with an `<svg>` root is returned unchanged.
pub fn ensure_white_background(svg: &str) -> String {
    let Some((mut root, canvas_fill)) = find_root(svg) else {
        log::debug!("No <svg> root found, leaving output untouched");
        return svg.to_string();
    };

    let background = style_value(root.attr("style"), &["background", "background-color"]);
    let root_is_white = background.as_deref().is_some_and(is_white);
    let rect_is_white = canvas_fill.as_ref().is_some_and(|r| is_white(&rect_fill(r)));

    if root_is_white && rect_is_white {
        return svg.to_string();
    }

    let root_tag = if root_is_white {
        svg[root.start..root.end].to_string()
    } else {
        let rest = root
            .attr("style")
            .map(|s| strip_declarations(s, &["background", "background-color"]))
            .unwrap_or_default();
        root.set_attr("style", format!("{}{}", BACKGROUND_STYLE, rest), true);
        root.render(root.self_closing)
    };

    let mut out = String::with_capacity(svg.len() + 128);
    out.push_str(&svg[..root.start]);

    if root.self_closing {
        let open = match root_tag.strip_suffix("/>") {
            Some(open) => format!("{}>", open.trim_end()),
            None => root_tag,
        };
        out.push_str(&open);
        out.push_str(&canvas_rect(canvas_of(&root)));
        out.push_str(&format!("</{}>", root.name));
        out.push_str(&svg[root.end..]);
        return out;
    }

    out.push_str(&root_tag);
    match canvas_fill {
        Some(mut rect) if !rect_is_white => {
            out.push_str(&svg[root.end..rect.start]);
            if let Some(style) = rect.attr("style").map(|s| strip_declarations(s, &["fill"])) {
                if style.is_empty() {
                    rect.remove_attr("style");
                } else {
                    rect.set_attr("style", style, false);
                }
            }
            rect.set_attr("fill", WHITE.to_string(), false);
            out.push_str(&rect.render(rect.self_closing));
            out.push_str(&svg[rect.end..]);
        }
        Some(_) => out.push_str(&svg[root.end..]),
        None => {
            out.push_str(&canvas_rect(canvas_of(&root)));
            out.push_str(&svg[root.end..]);
        }
    }
    out
}
