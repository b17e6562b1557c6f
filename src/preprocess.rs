//! Source rewriting applied before a diagram reaches the renderer.

/// Scale injected by [`enlarge_fonts`].
pub const ENLARGE_SCALE: &str = "1.5";

const WHITE_BACKGROUND_DIRECTIVE: &str = "skinparam backgroundColor #FFFFFF";

/// Directives that would fight with the injected scale/background, matched
/// case-insensitively against the trimmed line.
const CONFLICTING_PREFIXES: &[&str] = &[
    "!theme",
    "scale ",
    "skinparam backgroundcolor",
    "skinparam dpi",
    "!pragma layout",
    "left to right direction",
    "top to bottom direction",
];

fn is_conflicting(line: &str) -> bool {
    let lower = line.trim().to_ascii_lowercase();
    CONFLICTING_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

fn is_start_declaration(line: &str) -> bool {
    line.trim_start().to_ascii_lowercase().starts_with("@start")
}

/// Strip theme/layout/background directives and inject a scale directive plus
/// an explicit white background right after the opening `@start...` line.
/// Sources without an opening declaration get the directives at the top.
pub fn enlarge_fonts(source: &str) -> String {
    let injected = [format!("scale {}", ENLARGE_SCALE), WHITE_BACKGROUND_DIRECTIVE.to_string()];

    let mut out: Vec<String> = Vec::new();
    let mut injected_done = false;

    for line in source.lines() {
        if is_conflicting(line) {
            continue;
        }
        out.push(line.to_string());
        if !injected_done && is_start_declaration(line) {
            out.extend(injected.iter().cloned());
            injected_done = true;
        }
    }

    if !injected_done {
        let mut with_header: Vec<String> = injected.to_vec();
        with_header.extend(out);
        out = with_header;
    }

    let mut result = out.join("\n");
    if source.ends_with('\n') {
        result.push('\n');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::enlarge_fonts;

    #[test]
    fn replaces_theme_with_scale_and_white_background() {
        let source = "@startuml\n!theme cerulean\nclass A\n@enduml";
        let processed = enlarge_fonts(source);

        assert!(!processed.contains("!theme"));
        assert_eq!(
            processed,
            "@startuml\nscale 1.5\nskinparam backgroundColor #FFFFFF\nclass A\n@enduml"
        );
    }

    #[test]
    fn strips_existing_scale_background_and_direction() {
        let source = "@startuml\nscale 2\nSkinParam BackgroundColor black\nleft to right direction\nA -> B\n@enduml\n";
        let processed = enlarge_fonts(source);

        assert!(!processed.contains("scale 2"));
        assert!(!processed.contains("black"));
        assert!(!processed.contains("direction"));
        assert!(processed.contains("A -> B"));
        assert!(processed.ends_with("@enduml\n"));
    }

    #[test]
    fn injects_at_top_without_start_declaration() {
        let processed = enlarge_fonts("class A");
        assert!(processed.starts_with("scale 1.5\nskinparam backgroundColor #FFFFFF\n"));
        assert!(processed.ends_with("class A"));
    }

    #[test]
    fn injects_only_once() {
        let processed = enlarge_fonts("@startuml\n@enduml\n@startuml\n@enduml");
        assert_eq!(processed.matches("scale 1.5").count(), 1);
    }
}
