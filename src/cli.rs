//! Flags shared by both binaries.

use crate::config::{Config, ToolConfig};
use crate::logging;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Config file (TOML or YAML)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Path to plantuml.jar, launched with `java -jar`
    #[arg(long, value_name = "JAR", global = true, conflicts_with = "tool")]
    pub jar: Option<PathBuf>,

    /// Standalone renderer executable to launch instead of java
    #[arg(long, value_name = "PROGRAM", global = true)]
    pub tool: Option<String>,

    /// Layout helper candidate; repeat to try several (replaces the defaults)
    #[arg(long = "dot", value_name = "PATH", global = true)]
    pub dot: Vec<String>,

    /// Per-invocation timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Directory for run-scoped scratch files
    #[arg(long, value_name = "DIR", global = true)]
    pub scratch_dir: Option<PathBuf>,

    /// Directory of .puml files
    #[arg(long, value_name = "DIR", global = true)]
    pub diagram_dir: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Also append log records to this file
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,
}

impl CommonArgs {
    pub fn init_logging(&self) -> Result<(), String> {
        let level = match self.log_level.as_deref() {
            Some(value) => Some(
                logging::parse_level(value).ok_or_else(|| format!("Invalid log level: {}", value))?,
            ),
            None => None,
        };
        logging::init(level, self.log_file.as_deref())
    }

    /// Load the config file if given, then apply flag overrides.
    pub fn config(&self) -> Result<Config, String> {
        let mut config = match &self.config {
            Some(path) => {
                if !path.is_file() {
                    return Err(format!("Config file not found: {}", path.display()));
                }
                Config::load(path).map_err(|e| e.to_string())?
            }
            None => Config::default(),
        };

        if let Some(jar) = &self.jar {
            config.tool = ToolConfig::java_jar(jar);
        }
        if let Some(tool) = &self.tool {
            config.tool = ToolConfig::executable(tool.clone());
        }
        if !self.dot.is_empty() {
            config.layout_helpers = self.dot.clone();
        }
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least one second".to_string());
            }
            config.timeout_secs = timeout;
        }
        if let Some(dir) = &self.scratch_dir {
            config.scratch_root = dir.clone();
        }
        if let Some(dir) = &self.diagram_dir {
            config.diagram_dir = dir.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::CommonArgs;
    use std::path::PathBuf;

    #[test]
    fn flags_override_defaults() {
        let args = CommonArgs {
            tool: Some("plantuml".to_string()),
            dot: vec!["/usr/bin/dot".to_string()],
            timeout: Some(5),
            scratch_dir: Some(PathBuf::from("/tmp/puml-scratch")),
            ..CommonArgs::default()
        };
        let config = args.config().unwrap();
        assert_eq!(config.tool.program, "plantuml");
        assert!(config.tool.args.is_empty());
        assert_eq!(config.layout_helpers, vec!["/usr/bin/dot"]);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.scratch_root, PathBuf::from("/tmp/puml-scratch"));
    }

    #[test]
    fn jar_flag_uses_java() {
        let args = CommonArgs {
            jar: Some(PathBuf::from("/opt/plantuml/plantuml.jar")),
            ..CommonArgs::default()
        };
        let config = args.config().unwrap();
        assert_eq!(config.tool.program, "java");
        assert_eq!(config.tool.args, vec!["-jar", "/opt/plantuml/plantuml.jar"]);
    }

    #[test]
    fn zero_timeout_and_missing_config_are_errors() {
        let args = CommonArgs {
            timeout: Some(0),
            ..CommonArgs::default()
        };
        assert!(args.config().is_err());

        let args = CommonArgs {
            config: Some(PathBuf::from("/nonexistent/pumlview.toml")),
            ..CommonArgs::default()
        };
        assert!(args.config().unwrap_err().contains("not found"));
    }
}
