use proptest::prelude::*;
use pumlview::config::{Config, ConverterKind, ToolConfig};
use pumlview::render::RenderError;
use pumlview::{OutputFormat, Pipeline, RenderOptions, RenderRequest};
use std::path::Path;
use std::sync::Arc;

const DEMO: &str = "@startuml\ntitle Demo\nclass A\nclass B\nA -> B\n@enduml";

fn offline(scratch: &Path) -> Config {
    Config {
        tool: ToolConfig::executable("/nonexistent/plantuml"),
        layout_helpers: Vec::new(),
        scratch_root: scratch.to_path_buf(),
        ..Config::default()
    }
}

#[test]
fn demo_scenario_without_renderer() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let pipeline = Pipeline::with_helpers(offline(tmp.path()), Vec::new());

    let result = pipeline
        .render(&RenderRequest::new(DEMO, OutputFormat::Svg))
        .expect("svg always renders");

    assert!(result.is_fallback);
    assert_eq!(result.content_type(), "image/svg+xml");
    let svg = result.text();
    for expected in ["Demo", "class A", "class B", "A \u{2192} B"] {
        assert!(svg.contains(expected), "missing {expected:?}");
    }
}

#[test]
fn fallback_status_is_stable_across_calls() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let pipeline = Pipeline::with_helpers(offline(tmp.path()), Vec::new());
    let request = RenderRequest::new(DEMO, OutputFormat::Svg);

    let first = pipeline.render(&request).expect("first");
    let second = pipeline.render(&request).expect("second");
    assert_eq!(first.is_fallback, second.is_fallback);
    assert_eq!(first.content, second.content);
}

#[test]
fn png_without_capabilities_lists_what_to_install() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = Config {
        converters: vec![ConverterKind::RsvgConvert, ConverterKind::ImageMagick],
        rsvg_convert: "/nonexistent/rsvg-convert".to_string(),
        magick: "/nonexistent/magick".to_string(),
        ..offline(tmp.path())
    };
    let pipeline = Pipeline::with_helpers(config, Vec::new());

    let err = pipeline
        .render(&RenderRequest::new(DEMO, OutputFormat::Png))
        .expect_err("no converter");
    match &err {
        RenderError::ConversionUnavailable { required, .. } => {
            assert_eq!(required, &["rsvg-convert", "imagemagick"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn jpeg_request_converts_fallback() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let pipeline = Pipeline::with_helpers(offline(tmp.path()), Vec::new());

    let result = pipeline
        .render(&RenderRequest::new(DEMO, OutputFormat::Jpeg))
        .expect("jpeg");
    assert!(result.is_fallback);
    assert_eq!(result.content_type(), "image/jpeg");
    assert!(result.content.starts_with(&[0xFF, 0xD8, 0xFF]));
    assert_eq!(result.method, "SVG->JPEG via resvg (fallback)");
}

#[test]
fn concurrent_fallbacks_keep_their_own_titles() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let pipeline = Arc::new(Pipeline::with_helpers(offline(tmp.path()), Vec::new()));

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            std::thread::spawn(move || {
                let title = format!("Title-{i:02}");
                let result = pipeline
                    .render(&RenderRequest::new(
                        format!("@startuml\ntitle {title}\nclass C{i}\n@enduml"),
                        OutputFormat::Svg,
                    ))
                    .expect("fallback");
                (i, result)
            })
        })
        .collect();

    for handle in handles {
        let (i, result) = handle.join().expect("thread");
        assert!(result.is_fallback);
        let svg = result.text();
        assert!(svg.contains(&format!(">Title-{i:02}</text>")));
        assert_eq!(svg.matches("Title-").count(), 1);
    }
}

#[test]
fn empty_source_is_an_error() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let pipeline = Pipeline::with_helpers(offline(tmp.path()), Vec::new());
    assert!(matches!(
        pipeline.render(&RenderRequest::new("", OutputFormat::Svg)),
        Err(RenderError::EmptySource)
    ));
}

#[cfg(unix)]
mod fake_renderer {
    use super::*;

    /// A renderer that prints a bare SVG whose only text is the diagram title.
    fn title_echo(dir: &Path) -> ToolConfig {
        let script = dir.join("renderer.sh");
        std::fs::write(
            &script,
            "title=$(sed -n 's/^title //p')\nprintf '<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 120 40\"><text>%s</text></svg>' \"$title\"\n",
        )
        .expect("write script");
        ToolConfig {
            program: "/bin/sh".to_string(),
            args: vec![script.to_string_lossy().into_owned()],
        }
    }

    fn genuine(dir: &Path) -> Pipeline {
        let config = Config {
            tool: title_echo(dir),
            ..offline(&dir.join("scratch"))
        };
        Pipeline::with_helpers(config, Vec::new())
    }

    #[test]
    fn genuine_svg_gets_white_background() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let pipeline = genuine(tmp.path());

        let result = pipeline
            .render(&RenderRequest::new("@startuml\ntitle Real\n@enduml", OutputFormat::Svg))
            .expect("renders");

        assert!(!result.is_fallback);
        assert_eq!(result.attempts.len(), 1);
        let svg = result.text();
        assert!(svg.contains("background:#FFFFFF;"));
        assert!(svg.contains(
            r##"<rect x="0" y="0" width="120" height="40" fill="#FFFFFF"/><text>Real</text>"##
        ));
    }

    #[test]
    fn enlarge_fonts_rewrites_source_before_rendering() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let script = tmp.path().join("renderer.sh");
        // Echo the received source back inside the SVG.
        std::fs::write(
            &script,
            "src=$(cat)\nprintf '<svg xmlns=\"http://www.w3.org/2000/svg\"><desc>%s</desc></svg>' \"$src\"\n",
        )
        .expect("write script");
        let config = Config {
            tool: ToolConfig {
                program: "/bin/sh".to_string(),
                args: vec![script.to_string_lossy().into_owned()],
            },
            ..offline(&tmp.path().join("scratch"))
        };
        let pipeline = Pipeline::with_helpers(config, Vec::new());

        let request = RenderRequest::new(
            "@startuml\n!theme dark\nscale 2\nA -> B\n@enduml",
            OutputFormat::Svg,
        )
        .with_options(RenderOptions { enlarge_fonts: true });
        let svg = pipeline.render(&request).expect("renders").text().into_owned();

        assert!(svg.contains("@startuml\nscale 1.5\nskinparam backgroundColor #FFFFFF\nA -> B"));
        assert!(!svg.contains("!theme"));
        assert!(!svg.contains("scale 2"));
    }

    /// Emits a dark-themed SVG for `-tsvg` and fails every raster format.
    fn dark_theme(dir: &Path) -> Pipeline {
        let script = dir.join("renderer.sh");
        std::fs::write(
            &script,
            r##"cat >/dev/null
case " $* " in
  *" -tsvg "*) ;;
  *) echo 'raster output unavailable' >&2; exit 1 ;;
esac
printf '<svg xmlns="http://www.w3.org/2000/svg" style="width:40px;height:20px;background:#000000;" width="40" height="20" viewBox="0 0 40 20"><rect width="40" height="20" fill="#000000"/><rect x="30" y="5" width="5" height="5" fill="#00FF00"/></svg>'
"##,
        )
        .expect("write script");
        let config = Config {
            tool: ToolConfig {
                program: "/bin/sh".to_string(),
                args: vec![script.to_string_lossy().into_owned()],
            },
            ..offline(&dir.join("scratch"))
        };
        Pipeline::with_helpers(config, Vec::new())
    }

    #[test]
    fn dark_theme_svg_is_repainted_white() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let pipeline = dark_theme(tmp.path());

        let result = pipeline
            .render(&RenderRequest::new("@startuml\n!theme dark\nA -> B\n@enduml", OutputFormat::Svg))
            .expect("renders");
        assert!(!result.is_fallback);
        let svg = result.text();
        assert!(svg.contains(r#"style="background:#FFFFFF;width:40px;height:20px;""#));
        assert!(svg.contains(r##"<rect width="40" height="20" fill="#FFFFFF"/>"##));
        assert!(!svg.contains("#000000"));
    }

    #[test]
    fn dark_theme_png_has_white_canvas() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let pipeline = dark_theme(tmp.path());

        let result = pipeline
            .render(&RenderRequest::new("@startuml\n!theme dark\nA -> B\n@enduml", OutputFormat::Png))
            .expect("converted");
        assert!(!result.is_fallback);
        assert_eq!(result.method, "SVG->PNG via resvg");

        let img = image::load_from_memory(&result.content).expect("decodes").to_rgba8();
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(32, 7).0, [0, 255, 0, 255]);
    }

    #[test]
    fn png_bytes_for_jpeg_fall_through_to_conversion() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let script = tmp.path().join("renderer.sh");
        // PNG signature for -tjpg, a plain SVG otherwise.
        std::fs::write(
            &script,
            r##"cat >/dev/null
case " $* " in
  *" -tjpg "*) printf '\211PNG\r\n\032\n'; head -c 2000 /dev/zero; exit 0 ;;
esac
printf '<svg xmlns="http://www.w3.org/2000/svg" width="20" height="20" viewBox="0 0 20 20"><g/></svg>'
"##,
        )
        .expect("write script");
        let config = Config {
            tool: ToolConfig {
                program: "/bin/sh".to_string(),
                args: vec![script.to_string_lossy().into_owned()],
            },
            ..offline(&tmp.path().join("scratch"))
        };
        let pipeline = Pipeline::with_helpers(config, Vec::new());

        let result = pipeline
            .render(&RenderRequest::new("@startuml\nA -> B\n@enduml", OutputFormat::Jpeg))
            .expect("converted");
        assert_eq!(result.content_type(), "image/jpeg");
        assert!(result.content.starts_with(&[0xFF, 0xD8, 0xFF]));
        assert_eq!(result.method, "SVG->JPEG via resvg");
    }

    #[test]
    fn concurrent_requests_do_not_mix() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let pipeline = Arc::new(genuine(tmp.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pipeline = Arc::clone(&pipeline);
                std::thread::spawn(move || {
                    let title = format!("Diagram{i}");
                    let source = format!("@startuml\ntitle {title}\n@enduml");
                    let result = pipeline
                        .render(&RenderRequest::new(source, OutputFormat::Svg))
                        .expect("renders");
                    (title, result.text().into_owned())
                })
            })
            .collect();

        for handle in handles {
            let (title, svg) = handle.join().expect("thread");
            assert!(svg.contains(&format!("<text>{title}</text>")), "{title} not in {svg}");
            for other in 0..8 {
                let other_title = format!("Diagram{other}");
                if other_title != title {
                    assert!(!svg.contains(&format!("<text>{other_title}</text>")));
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn svg_requests_always_produce_svg(source in "[a-zA-Z0-9 <>&\"'\\-\\n]{1,200}") {
        prop_assume!(!source.trim().is_empty());
        let tmp = tempfile::tempdir().expect("tempdir");
        let pipeline = Pipeline::with_helpers(offline(tmp.path()), Vec::new());

        let result = pipeline
            .render(&RenderRequest::new(source, OutputFormat::Svg))
            .expect("svg always renders");
        prop_assert!(result.is_fallback);
        prop_assert!(result.text().starts_with("<svg"));
        prop_assert!(result.text().ends_with("</svg>"));
    }
}
