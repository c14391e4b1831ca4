//! Runtime settings read from the manifest's `Customize.*` sections.
//!
//! Built once per command and passed down explicitly; nothing in the engine
//! reads customization from global state.

use std::time::Duration;

use ship_schema::{Manifest, Section};
use tracing::warn;

const TEXT_SECTION: &str = "Customize.text";
const COLORS_SECTION: &str = "Customize.colors";
const LIMITS_SECTION: &str = "Customize.limits";

/// Named console color. Rendering is up to the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Default,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Purple,
    Cyan,
    White,
    Reset,
}

impl Color {
    /// Look up a color by its configuration name. Unknown names yield `None`,
    /// which renders uncolored.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "default" => Some(Self::Default),
            "black" => Some(Self::Black),
            "red" => Some(Self::Red),
            "green" => Some(Self::Green),
            "yellow" => Some(Self::Yellow),
            "blue" => Some(Self::Blue),
            "purple" => Some(Self::Purple),
            "cyan" => Some(Self::Cyan),
            "white" => Some(Self::White),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// One message severity's prefix and its color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    pub text: String,
    pub color: Option<Color>,
}

impl Prefix {
    fn new(text: &str, color: Color) -> Self {
        Self {
            text: text.to_string(),
            color: Some(color),
        }
    }
}

/// Console prefixes, colors and line suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStyle {
    pub info: Prefix,
    pub success: Prefix,
    pub warning: Prefix,
    pub error: Prefix,
    /// Appended to every message (`LoggingEnd`).
    pub suffix: String,
    pub suffix_color: Option<Color>,
}

impl Default for LogStyle {
    fn default() -> Self {
        Self {
            info: Prefix::new("I", Color::Blue),
            success: Prefix::new("OK", Color::Green),
            warning: Prefix::new("W", Color::Yellow),
            error: Prefix::new("E", Color::Red),
            suffix: String::new(),
            suffix_color: None,
        }
    }
}

/// Timeouts and loop bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Whole-request timeout for index and archive downloads.
    pub download_timeout: Duration,
    /// Per-server reachability probe timeout.
    pub probe_timeout: Duration,
    /// Build script wall clock limit.
    pub build_timeout: Duration,
    /// Time between SIGTERM and SIGKILL for a timed out build script.
    pub kill_grace: Duration,
    /// Upper bound on sync passes.
    pub max_passes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            download_timeout: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(5),
            build_timeout: Duration::from_secs(1800),
            kill_grace: Duration::from_secs(10),
            max_passes: 16,
        }
    }
}

/// Everything configurable about a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub style: LogStyle,
    pub limits: Limits,
}

impl Settings {
    /// Read settings from a manifest. Missing keys keep their defaults;
    /// unparsable numbers are logged and ignored.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut settings = Self::default();

        if let Some(text) = manifest.section(TEXT_SECTION) {
            let style = &mut settings.style;
            for (key, slot) in [
                ("InfoPrefix", &mut style.info.text),
                ("SuccessPrefix", &mut style.success.text),
                ("WarningPrefix", &mut style.warning.text),
                ("ErrorPrefix", &mut style.error.text),
                ("LoggingEnd", &mut style.suffix),
            ] {
                if let Some(value) = text.get(key) {
                    *slot = value.to_string();
                }
            }
        }

        if let Some(colors) = manifest.section(COLORS_SECTION) {
            let style = &mut settings.style;
            for (key, slot) in [
                ("InfoPrefixColor", &mut style.info.color),
                ("SuccessPrefixColor", &mut style.success.color),
                ("WarningPrefixColor", &mut style.warning.color),
                ("ErrorPrefixColor", &mut style.error.color),
                ("LoggingEndColor", &mut style.suffix_color),
            ] {
                if let Some(value) = colors.get(key) {
                    *slot = Color::from_name(value);
                }
            }
        }

        if let Some(limits) = manifest.section(LIMITS_SECTION) {
            let l = &mut settings.limits;
            read_secs(limits, "DownloadTimeout", &mut l.download_timeout);
            read_secs(limits, "ProbeTimeout", &mut l.probe_timeout);
            read_secs(limits, "BuildTimeout", &mut l.build_timeout);
            read_secs(limits, "KillGrace", &mut l.kill_grace);
            if let Some(n) = read_number(limits, "MaxPasses") {
                l.max_passes = usize::try_from(n).unwrap_or(usize::MAX).max(1);
            }
        }

        settings
    }
}

fn read_secs(section: &Section, key: &str, slot: &mut Duration) {
    if let Some(secs) = read_number(section, key) {
        *slot = Duration::from_secs(secs);
    }
}

fn read_number(section: &Section, key: &str) -> Option<u64> {
    let raw = section.get_non_empty(key)?;
    match raw.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(key, value = raw, "ignoring non-numeric limit");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_customize_sections() {
        let manifest = Manifest::parse("[Servers]\nofficial = http://x\n").unwrap();
        let settings = Settings::from_manifest(&manifest);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.style.error.text, "E");
        assert_eq!(settings.style.error.color, Some(Color::Red));
        assert_eq!(settings.limits.max_passes, 16);
    }

    #[test]
    fn test_customized_prefixes_and_colors() {
        let manifest = Manifest::parse(
            "[Customize.text]\nInfoPrefix = info\nLoggingEnd = \" !\"\n\
             [Customize.colors]\nInfoPrefixColor = cyan\nErrorPrefixColor = magenta\nLoggingEndColor = white\n",
        )
        .unwrap();
        let style = Settings::from_manifest(&manifest).style;

        assert_eq!(style.info.text, "info");
        assert_eq!(style.info.color, Some(Color::Cyan));
        assert_eq!(style.suffix, " !");
        assert_eq!(style.suffix_color, Some(Color::White));
        // Unknown color names render uncolored.
        assert_eq!(style.error.color, None);
        assert_eq!(style.warning.text, "W");
    }

    #[test]
    fn test_limits_fall_back_on_garbage() {
        let manifest = Manifest::parse(
            "[Customize.limits]\nBuildTimeout = 60\nProbeTimeout = soon\nMaxPasses = 0\n",
        )
        .unwrap();
        let limits = Settings::from_manifest(&manifest).limits;

        assert_eq!(limits.build_timeout, Duration::from_secs(60));
        assert_eq!(limits.probe_timeout, Duration::from_secs(5));
        assert_eq!(limits.max_passes, 1);
    }
}
