//! SVG to raster conversion.
//!
//! Capabilities are tried in the configured order; the first one that is
//! available and succeeds wins. Every path composites onto opaque white.

use super::error::RenderError;
use super::process::{self, Invocation};
use crate::config::{Config, ConverterKind};
use crate::format::OutputFormat;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use resvg::tiny_skia::{Color, Pixmap, Transform};
use resvg::usvg;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

const JPEG_QUALITY: u8 = 90;
const MAX_DIMENSION: u32 = 16_384;

/// System fonts are expensive to load, so the database is shared by every conversion.
static FONTDB: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    configure_font_fallbacks(&mut db);
    log::debug!("Loaded {} font faces for SVG rasterization", db.len());
    Arc::new(db)
});

/// Point the generic families PlantUML emits at installed faces, preferring
/// the usual metric-compatible ones.
fn configure_font_fallbacks(fontdb: &mut usvg::fontdb::Database) {
    let families: Vec<String> = fontdb
        .faces()
        .flat_map(|face| face.families.iter().map(|(name, _)| name.clone()))
        .collect();

    let pick = |preferred: &[&str], exclude: &[&str]| -> Option<String> {
        preferred
            .iter()
            .find_map(|wanted| {
                families.iter().find(|family| {
                    let lower = family.to_ascii_lowercase();
                    lower.contains(wanted) && !exclude.iter().any(|x| lower.contains(x))
                })
            })
            .cloned()
    };

    let Some(sans) = pick(&["dejavu sans", "liberation sans", "arial", "helvetica", "sans"], &["mono"])
        .or_else(|| families.first().cloned())
    else {
        log::warn!("No system fonts found, diagram text will not be rasterized");
        return;
    };
    let serif = pick(&["serif"], &["sans", "mono"]).unwrap_or_else(|| sans.clone());
    let mono = pick(&["mono", "courier", "code"], &[]).unwrap_or_else(|| sans.clone());

    log::debug!("Generic fonts: sans-serif={}, serif={}, monospace={}", sans, serif, mono);
    fontdb.set_sans_serif_family(sans);
    fontdb.set_serif_family(serif);
    fontdb.set_monospace_family(mono);
}

/// Raster bytes plus the capability that produced them.
#[derive(Debug, Clone)]
pub struct Converted {
    pub bytes: Vec<u8>,
    pub method: &'static str,
}

#[derive(Debug, Clone)]
pub struct FormatConverter {
    kinds: Vec<ConverterKind>,
    rsvg_convert: String,
    magick: String,
    timeout: Duration,
}

impl FormatConverter {
    pub fn new(kinds: Vec<ConverterKind>, rsvg_convert: String, magick: String, timeout: Duration) -> Self {
        Self {
            kinds,
            rsvg_convert,
            magick,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.converters.clone(),
            config.rsvg_convert.clone(),
            config.magick.clone(),
            config.timeout(),
        )
    }

    pub fn is_available(&self, kind: ConverterKind) -> bool {
        match kind {
            ConverterKind::Resvg => true,
            ConverterKind::RsvgConvert => which::which(&self.rsvg_convert).is_ok(),
            ConverterKind::ImageMagick => which::which(&self.magick).is_ok(),
        }
    }

    /// Capability names a deployment could enable to make conversion work.
    fn required(&self) -> Vec<String> {
        let kinds = if self.kinds.is_empty() {
            vec![
                ConverterKind::Resvg,
                ConverterKind::RsvgConvert,
                ConverterKind::ImageMagick,
            ]
        } else {
            self.kinds.clone()
        };
        kinds.into_iter().map(|k| k.name().to_string()).collect()
    }

    pub fn convert(&self, svg: &str, target: &OutputFormat) -> Result<Converted, RenderError> {
        if !target.is_raster() {
            return Err(RenderError::ConversionFailed {
                target: target.clone(),
                detail: "only PNG and JPEG targets are supported".to_string(),
            });
        }

        let mut last_error: Option<String> = None;
        for &kind in &self.kinds {
            if !self.is_available(kind) {
                log::debug!("Converter {} is not available", kind.name());
                continue;
            }

            let result = match kind {
                ConverterKind::Resvg => self.with_resvg(svg, target),
                ConverterKind::RsvgConvert => self.with_command(
                    Invocation::new(
                        self.rsvg_convert.clone(),
                        vec!["-f".into(), "png".into(), "-b".into(), "white".into()],
                    ),
                    svg,
                    target,
                ),
                ConverterKind::ImageMagick => self.with_command(
                    Invocation::new(
                        self.magick.clone(),
                        vec![
                            "-background".into(),
                            "white".into(),
                            "svg:-".into(),
                            "-flatten".into(),
                            "png:-".into(),
                        ],
                    ),
                    svg,
                    target,
                ),
            };

            match result {
                Ok(bytes) => {
                    log::info!(
                        "Converted SVG to {} with {} ({} bytes)",
                        target,
                        kind.name(),
                        bytes.len()
                    );
                    return Ok(Converted {
                        bytes,
                        method: kind.name(),
                    });
                }
                Err(e) => {
                    log::warn!("Converter {} failed: {}", kind.name(), e);
                    last_error = Some(format!("{}: {}", kind.name(), e));
                }
            }
        }

        match last_error {
            Some(detail) => Err(RenderError::ConversionFailed {
                target: target.clone(),
                detail,
            }),
            None => Err(RenderError::ConversionUnavailable {
                target: target.clone(),
                required: self.required(),
            }),
        }
    }

    fn with_resvg(&self, svg: &str, target: &OutputFormat) -> Result<Vec<u8>, String> {
        let opts = usvg::Options {
            fontdb: FONTDB.clone(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(svg, &opts).map_err(|e| format!("Failed to parse SVG: {}", e))?;

        let width = tree.size().width().ceil() as u32;
        let height = tree.size().height().ceil() as u32;
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(format!("SVG dimensions out of range: {}x{}", width, height));
        }

        let mut pixmap = Pixmap::new(width, height).ok_or("Failed to create pixmap")?;
        pixmap.fill(Color::WHITE);
        resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

        match target {
            OutputFormat::Jpeg => {
                // Opaque white fill means alpha is always 255 and can be dropped.
                let rgb: Vec<u8> = pixmap
                    .data()
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect();
                encode_jpeg(&rgb, width, height)
            }
            _ => pixmap
                .encode_png()
                .map_err(|e| format!("Failed to encode PNG: {}", e)),
        }
    }

    fn with_command(
        &self,
        invocation: Invocation,
        svg: &str,
        target: &OutputFormat,
    ) -> Result<Vec<u8>, String> {
        let output = process::run(&invocation, Some(svg.as_bytes()), self.timeout).map_err(|e| e.to_string())?;
        if !output.status.success() {
            return Err(format!("exited with {}: {}", output.status, output.stderr.trim()));
        }
        if output.stdout.is_empty() {
            return Err("produced no output".to_string());
        }

        match target {
            OutputFormat::Jpeg => {
                let decoded = image::load_from_memory(&output.stdout)
                    .map_err(|e| format!("Failed to decode PNG: {}", e))?;
                let rgb = decoded.to_rgb8();
                encode_jpeg(rgb.as_raw(), rgb.width(), rgb.height())
            }
            _ => Ok(output.stdout),
        }
    }
}

fn encode_jpeg(rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode(rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| format!("Failed to encode JPEG: {}", e))?;
    Ok(out)
}
