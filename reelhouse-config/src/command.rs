//! Converter command files.
//!
//! A command file holds a [`ProcessExecutorConfig`] on its own so the
//! converter invocation can be swapped without touching `reelhouse.toml`:
//!
//! ```toml
//! program = "ffmpeg"
//! args = ["-i", "{input}", "-c:v", "libx264", "{output}"]
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use reelhouse_core::adapters::ProcessExecutorConfig;

pub fn load_from_file(path: &Path) -> anyhow::Result<ProcessExecutorConfig> {
    let contents = fs::read_to_string(path).with_context(|| {
        format!("failed to read converter command from {}", path.display())
    })?;

    let command: ProcessExecutorConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&contents)
            .with_context(|| format!("invalid converter command {}", path.display()))?,
        _ => toml::from_str(&contents).map_err(|err| {
            anyhow!("invalid converter command {}: {}", path.display(), err)
        })?,
    };

    if command.program.trim().is_empty() {
        return Err(anyhow!(
            "converter command {} names no program",
            path.display()
        ));
    }
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_toml_and_json_commands() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("convert.toml");
        fs::write(
            &toml_path,
            "program = \"ffmpeg\"\nargs = [\"-i\", \"{input}\", \"{output}\"]\n",
        )
        .unwrap();
        let json_path = dir.path().join("convert.json");
        fs::write(&json_path, r#"{"program": "HandBrakeCLI"}"#).unwrap();

        let from_toml = load_from_file(&toml_path).unwrap();
        assert_eq!(from_toml.program, "ffmpeg");
        assert_eq!(from_toml.args, vec!["-i", "{input}", "{output}"]);

        // Missing fields keep the defaults.
        let from_json = load_from_file(&json_path).unwrap();
        assert_eq!(from_json.args, ProcessExecutorConfig::default().args);
    }

    #[test]
    fn rejects_blank_program_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("convert.toml");
        fs::write(&path, "program = \"  \"\n").unwrap();

        assert!(load_from_file(&path).is_err());
        let err = load_from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read converter command"));
    }
}
