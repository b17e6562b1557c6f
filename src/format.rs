use std::fmt;
use std::str::FromStr;

/// Output encodings a render request can ask for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Svg,
    Png,
    Jpeg,
    /// Anything else the external tool may understand (e.g. `eps`, `txt`).
    Other(String),
}

impl OutputFormat {
    /// Value passed to the external tool as `-t<flag>`.
    pub fn tool_flag(&self) -> &str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Other(name) => name,
        }
    }

    /// File extensions an artifact of this format may carry, preferred first.
    pub fn extensions(&self) -> Vec<&str> {
        match self {
            OutputFormat::Svg => vec!["svg"],
            OutputFormat::Png => vec!["png"],
            OutputFormat::Jpeg => vec!["jpg", "jpeg"],
            OutputFormat::Other(name) => vec![name.as_str()],
        }
    }

    pub fn content_type(&self) -> String {
        match self {
            OutputFormat::Svg => "image/svg+xml".to_string(),
            OutputFormat::Png => "image/png".to_string(),
            OutputFormat::Jpeg => "image/jpeg".to_string(),
            OutputFormat::Other(name) => format!("image/{}", name),
        }
    }

    pub fn is_raster(&self) -> bool {
        matches!(self, OutputFormat::Png | OutputFormat::Jpeg)
    }

    /// Guess the format from an output path's extension.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "" => Err("Output format must not be empty".to_string()),
            "svg" => Ok(OutputFormat::Svg),
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            other if other.chars().all(|c| c.is_ascii_alphanumeric()) => {
                Ok(OutputFormat::Other(other.to_string()))
            }
            other => Err(format!("Invalid output format: {}", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jpeg => f.write_str("jpeg"),
            other => f.write_str(other.tool_flag()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OutputFormat;
    use std::path::Path;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("SVG".parse::<OutputFormat>(), Ok(OutputFormat::Svg));
        assert_eq!("jpg".parse::<OutputFormat>(), Ok(OutputFormat::Jpeg));
        assert_eq!("JPEG".parse::<OutputFormat>(), Ok(OutputFormat::Jpeg));
        assert_eq!(
            "eps".parse::<OutputFormat>(),
            Ok(OutputFormat::Other("eps".to_string()))
        );
    }

    #[test]
    fn rejects_empty_and_path_like_names() {
        assert!("".parse::<OutputFormat>().is_err());
        assert!("../svg".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn content_types_follow_format() {
        assert_eq!(OutputFormat::Svg.content_type(), "image/svg+xml");
        assert_eq!(OutputFormat::Jpeg.content_type(), "image/jpeg");
        assert_eq!(
            OutputFormat::Other("eps".to_string()).content_type(),
            "image/eps"
        );
    }

    #[test]
    fn format_from_output_path() {
        assert_eq!(
            OutputFormat::from_path(Path::new("out/diagram.PNG")),
            Some(OutputFormat::Png)
        );
        assert_eq!(OutputFormat::from_path(Path::new("diagram")), None);
    }
}
