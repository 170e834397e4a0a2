//! Compiler configuration.
//!
//! Settings may be built in code or read from a small `name = value` file:
//!
//! | Setting | Default | Effect |
//! |---------|---------|--------|
//! | `max_nesting_depth` | `32` | deepest allowed block nesting (at most 256) |
//! | `strict_jumps` | `true` | reject `break`/`continue` outside a loop or switch |
//!
//! Lines starting with `;` or `#` are comments.

use std::path::Path;

use crate::error::ConfigError;

/// Largest `max_nesting_depth` a configuration file may ask for.
pub const NESTING_DEPTH_LIMIT: usize = 256;

/// Settings consulted by the statement compilers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Deepest permitted nesting of block statements.
    pub max_nesting_depth: usize,
    /// When set, `break` must sit inside a loop or switch and `continue`
    /// inside a loop.
    pub strict_jumps: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 32,
            strict_jumps: true,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration string.
    ///
    /// Bad lines are reported and skipped; the remaining settings still apply
    /// on top of the defaults.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = CompilerConfig::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                errors.push(ConfigError {
                    line: lineno,
                    message: format!("expected 'name = value', got '{line}'"),
                });
                continue;
            };

            if let Err(message) = config.apply(key.trim(), value.trim()) {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (config, errors)
    }

    /// Read and parse a configuration file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key.to_ascii_lowercase().as_str() {
            "max_nesting_depth" => {
                let depth: usize = value
                    .parse()
                    .map_err(|_| format!("max_nesting_depth: invalid number '{value}'"))?;
                if !(1..=NESTING_DEPTH_LIMIT).contains(&depth) {
                    return Err(format!("max_nesting_depth must be between 1 and {NESTING_DEPTH_LIMIT}"));
                }
                self.max_nesting_depth = depth;
            }
            "strict_jumps" => {
                self.strict_jumps = parse_bool(value)
                    .ok_or_else(|| format!("strict_jumps: expected on/off, got '{value}'"))?;
            }
            other => return Err(format!("unknown setting '{other}'")),
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Some(true),
        "0" | "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.max_nesting_depth, 32);
        assert!(config.strict_jumps);
    }

    #[test]
    fn parses_settings() {
        let (config, errors) = CompilerConfig::load_str("max_nesting_depth = 8\nstrict_jumps = off\n");
        assert!(errors.is_empty());
        assert_eq!(config.max_nesting_depth, 8);
        assert!(!config.strict_jumps);
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let src = "; compiler settings\n\n# depth\nmax_nesting_depth=4";
        let (config, errors) = CompilerConfig::load_str(src);
        assert!(errors.is_empty());
        assert_eq!(config.max_nesting_depth, 4);
    }

    #[test]
    fn bad_lines_reported_with_line_numbers() {
        let src = "max_nesting_depth = lots\nstrict_jumps\ncolour = red\nstrict_jumps = no";
        let (config, errors) = CompilerConfig::load_str(src);
        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
        assert_eq!(config.max_nesting_depth, 32);
        assert!(!config.strict_jumps);
    }

    #[test]
    fn depth_out_of_range_rejected() {
        for value in ["0", "257", "1000000"] {
            let (config, errors) = CompilerConfig::load_str(&format!("max_nesting_depth = {value}"));
            assert_eq!(errors.len(), 1, "{value}");
            assert_eq!(config.max_nesting_depth, 32);
        }
        let (config, errors) = CompilerConfig::load_str("max_nesting_depth = 256");
        assert!(errors.is_empty());
        assert_eq!(config.max_nesting_depth, 256);
    }

    #[test]
    fn load_file_reads_disk() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_nesting_depth = 12").unwrap();
        let (config, errors) = CompilerConfig::load_file(file.path()).unwrap();
        assert!(errors.is_empty());
        assert_eq!(config.max_nesting_depth, 12);
    }
}
