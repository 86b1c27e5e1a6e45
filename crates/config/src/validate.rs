//! Sanity checks run on a loaded configuration before the daemon starts.

use std::collections::HashSet;

use crate::schema::MotifiniConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "console.contact"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Check `config` and normalise `temp_dir` in place.
pub fn validate(config: &mut MotifiniConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.temp_dir.as_os_str().is_empty() {
        config.temp_dir = std::env::temp_dir();
        result.push(
            Severity::Info,
            "temp_dir",
            format!("empty, using {}", config.temp_dir.display()),
        );
    }

    if config.state_file.as_os_str().is_empty() {
        result.push(
            Severity::Warning,
            "state_file",
            "empty, subscriber state will not be saved",
        );
    }

    if config.console.contact.trim().is_empty() {
        result.push(Severity::Error, "console.contact", "must not be empty");
    }

    if config.default_delay_secs == 0 {
        result.push(
            Severity::Warning,
            "default_delay_secs",
            "0 sends a notification for every event without pause",
        );
    }

    let mut seen = HashSet::new();
    for (i, camera) in config.cameras.iter().enumerate() {
        let path = format!("cameras[{i}]");
        if camera.trim().is_empty() {
            result.push(Severity::Error, &path, "camera name must not be empty");
        } else if !seen.insert(camera.to_lowercase()) {
            result.push(
                Severity::Error,
                &path,
                format!("duplicate camera name: {camera}"),
            );
        }
    }

    for (i, api) in config.enabled_apis.iter().enumerate() {
        if api.is_empty() {
            result.push(
                Severity::Warning,
                &format!("enabled_apis[{i}]"),
                "empty entry matches every API",
            );
        }
    }
    if config.enabled_apis.len() > 1
        && config
            .enabled_apis
            .iter()
            .any(|a| a.eq_ignore_ascii_case("all") || a.eq_ignore_ascii_case("any"))
    {
        result.push(
            Severity::Info,
            "enabled_apis",
            "'all' enables every API, other entries are redundant",
        );
    }

    result
}
