use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::audio::wav::write_wav;
use crate::production::{ProductionOutput, ProductionRun};
use crate::providers::mock::MockVoiceGenerator;
use crate::providers::sound_library::SoundLibrary;
use crate::script::Production;

/// Where a render writes its results
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargets {
    pub audio: PathBuf,
    pub report: Option<PathBuf>,
}

impl RenderTargets {
    /// `<script stem>.wav` next to the script, unless overridden
    pub fn for_script(script: &Path, audio: Option<PathBuf>, report: Option<PathBuf>) -> Self {
        let audio = audio.unwrap_or_else(|| script.with_extension("wav"));
        Self { audio, report }
    }
}

/// Main application controller for rendering scripts
pub struct Controller {
    config: Config,
    sounds_dir: Option<PathBuf>,
}

impl Controller {
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self {
            config,
            sounds_dir: None,
        })
    }

    /// Use the WAV files under `dir` as the sound library
    pub fn with_sounds(mut self, dir: PathBuf) -> Self {
        self.sounds_dir = Some(dir);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn sound_library(&self) -> Result<SoundLibrary> {
        let output = &self.config.output;
        let mut library = SoundLibrary::new(&self.config.sounds, output.sample_rate, output.channels);
        if let Some(dir) = &self.sounds_dir {
            if !dir.is_dir() {
                return Err(anyhow!("Sound library directory does not exist: {:?}", dir));
            }
            let count = library
                .load_dir(dir)
                .with_context(|| format!("Failed to load sound library from {:?}", dir))?;
            info!("Loaded {} sound(s) from {:?}", count, dir);
        } else {
            info!("No sound library given, all sounds will be generated");
        }
        Ok(library)
    }

    /// Render a script file and write the audio and, when asked, the report
    pub async fn run(&self, script: &Path, targets: &RenderTargets) -> Result<ProductionOutput> {
        let start_time = std::time::Instant::now();

        if !script.exists() {
            return Err(anyhow!("Script file does not exist: {:?}", script));
        }
        let production = Production::from_file(script)?;
        info!("Rendering '{}' ({} scene(s))", production.title, production.scenes.len());

        let progress_bar = ProgressBar::new(production.scenes.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} scenes ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));

        let bar = progress_bar.clone();
        let mut run = ProductionRun::new(
            self.config.clone(),
            Arc::new(MockVoiceGenerator::preview()),
            Arc::new(self.sound_library()?),
        )
        .with_progress(move |done, _, summary| {
            bar.set_position(done as u64);
            bar.set_message(summary.id.clone());
        });

        let result = run.run(&production).await;
        progress_bar.finish_and_clear();
        let output = result.with_context(|| format!("Production of {:?} failed", script))?;

        for warning in &output.report.warnings {
            warn!("{}", warning);
        }

        write_wav(&targets.audio, &output.audio, self.config.output.bit_depth)
            .with_context(|| format!("Failed to write audio to {:?}", targets.audio))?;
        info!("Wrote {:?}", targets.audio);

        if let Some(report_path) = &targets.report {
            let json = output.report.to_json().context("Failed to serialize run report")?;
            std::fs::write(report_path, json)
                .with_context(|| format!("Failed to write run report to {:?}", report_path))?;
            info!("Wrote run report to {:?}", report_path);
        }

        info!(
            "Done in {}: {:.1}s of audio, {} warning(s)",
            Self::format_duration(start_time.elapsed()),
            output.report.total_duration,
            output.report.warnings.len()
        );
        Ok(output)
    }

    fn format_duration(duration: std::time::Duration) -> String {
        let secs = duration.as_secs();
        if secs >= 60 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}.{:03}s", secs, duration.subsec_millis())
        }
    }
}
