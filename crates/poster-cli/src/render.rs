use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use poster_core::{PosterError, PosterResult, RenderConfig};

/// A renderer invocation built from the `[render]` configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub program: String,
    pub args: Vec<String>,
    pub output: PathBuf,
    pub resolution: u32,
}

impl RenderJob {
    pub fn new(config: &RenderConfig, scene: &Path, output: &Path, resolution: u32) -> Self {
        let scene = scene.to_string_lossy();
        let out = output.to_string_lossy();
        let res = resolution.to_string();
        let args = config
            .args
            .iter()
            .map(|a| {
                a.replace("{scene}", &scene)
                    .replace("{output}", &out)
                    .replace("{resolution}", &res)
            })
            .collect();
        Self {
            program: config.program.clone(),
            args,
            output: output.to_path_buf(),
            resolution,
        }
    }

    /// The command line as it would be run.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check if the renderer can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    pub fn run(&self) -> PosterResult<()> {
        if !self.is_available() {
            return Err(PosterError::Render(format!(
                "renderer '{}' not found in PATH; set [render] program in poster.toml",
                self.program
            )));
        }
        if let Some(parent) = self.output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!("running {}", self.command_line());
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| PosterError::Render(format!("failed to start '{}': {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PosterError::Render(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_substitution() {
        let job = RenderJob::new(
            &RenderConfig::default(),
            Path::new("out/scene.json"),
            Path::new("out/poster.png"),
            7200,
        );
        assert_eq!(
            job.args,
            vec!["--scene", "out/scene.json", "--output", "out/poster.png", "--resolution", "7200"]
        );
        assert!(job.command_line().starts_with("poster-render --scene"));
    }

    #[test]
    fn test_missing_renderer_is_a_render_error() {
        let config = RenderConfig {
            program: "poster-render-does-not-exist".into(),
            ..RenderConfig::default()
        };
        let job = RenderJob::new(&config, Path::new("s.json"), Path::new("p.png"), 10);
        assert!(matches!(job.run(), Err(PosterError::Render(_))));
    }
}
