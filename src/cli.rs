use crate::config::ModelerConfigOverrides;
use crate::logging::LogFormat;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

const DEFAULT_FRAMES: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOverrides {
    config: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    imports: Vec<PathBuf>,
    export: Option<PathBuf>,
    frames: u64,
    log_format: LogFormat,
}

impl Default for CliOverrides {
    fn default() -> Self {
        Self {
            config: None,
            width: None,
            height: None,
            imports: Vec::new(),
            export: None,
            frames: DEFAULT_FRAMES,
            log_format: LogFormat::default(),
        }
    }
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. Flags take the form --name value.");
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config = Some(PathBuf::from(value)),
                "width" => {
                    overrides.width =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid width '{value}'"))?);
                }
                "height" => {
                    overrides.height =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid height '{value}'"))?);
                }
                "import" => overrides.imports.push(PathBuf::from(value)),
                "export" => overrides.export = Some(PathBuf::from(value)),
                "frames" => {
                    overrides.frames = value.parse::<u64>().with_context(|| format!("Invalid frame count '{value}'"))?;
                }
                "log-format" => overrides.log_format = value.parse()?,
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --config, --width, --height, --import, --export, --frames, --log-format."
                ),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    pub fn imports(&self) -> &[PathBuf] {
        &self.imports
    }

    pub fn export(&self) -> Option<&PathBuf> {
        self.export.as_ref()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    pub fn config_overrides(&self) -> ModelerConfigOverrides {
        ModelerConfigOverrides { width: self.width, height: self.height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size_frames_and_format() {
        let args = ["modeler", "--width", "1600", "--height", "900", "--frames", "4", "--log-format", "json"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        let config = overrides.config_overrides();
        assert_eq!((config.width, config.height), (Some(1600), Some(900)));
        assert_eq!(overrides.frames(), 4);
        assert_eq!(overrides.log_format(), LogFormat::Json);
    }

    #[test]
    fn imports_accumulate_and_latest_scalar_wins() {
        let args = ["modeler", "--import", "a.kmodel", "--width", "800", "--import", "b.json", "--width", "1920"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(overrides.imports(), &[PathBuf::from("a.kmodel"), PathBuf::from("b.json")]);
        assert_eq!(overrides.config_overrides().width, Some(1920));
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOverrides::parse(["modeler", "--width"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags() {
        let err = CliOverrides::parse(["modeler", "--vsync", "on"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
    }
}
