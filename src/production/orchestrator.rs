/*!
 * Production run orchestration.
 *
 * A `ProductionRun` drives one script through the whole pipeline and tracks
 * where it is:
 *
 * `Initialized → Building(scene i) → Placed → Processed → Rendered → Finalized`
 *
 * Structural errors (bad region nesting, unknown effects or speakers) and
 * render errors end in `Failed`. Per-line synthesis failures do not: they are
 * collected in the run report and the run still finalizes.
 */

use log::{error, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::cache::SynthesisCache;
use super::renderer::{master, process_tracks};
use super::report::{RunReport, RunWarning, SceneSummary};
use super::resolver::Resolver;
use super::session::Session;
use super::timeline::{plan_scene, ScenePlan, TimelineBuilder};
use crate::app_config::Config;
use crate::audio::buffer::AudioBuffer;
use crate::effects::catalog::EffectCatalog;
use crate::errors::ProductionError;
use crate::providers::{SoundManager, VoiceGenerator};
use crate::script::Production;

/// Why a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Structure,
    Render,
    Cancelled,
}

/// Lifecycle of a production run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initialized,
    Building { scene: usize },
    Placed,
    Processed,
    Rendered,
    Finalized,
    Failed(FailureReason),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Building { scene } => write!(f, "building scene {}", scene),
            Self::Placed => write!(f, "placed"),
            Self::Processed => write!(f, "processed"),
            Self::Rendered => write!(f, "rendered"),
            Self::Finalized => write!(f, "finalized"),
            Self::Failed(reason) => write!(f, "failed ({:?})", reason),
        }
    }
}

/// Cloneable cancellation flag shared with in-flight work
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Called after each scene is placed: (scenes done, scene count, summary)
pub type ProgressCallback = Box<dyn Fn(usize, usize, &SceneSummary) + Send + Sync>;

/// Mastered audio plus what happened while producing it
#[derive(Debug, Clone)]
pub struct ProductionOutput {
    pub audio: AudioBuffer,
    pub report: RunReport,
}

/// One production run over a script
pub struct ProductionRun {
    id: Uuid,
    config: Config,
    voice: Arc<dyn VoiceGenerator>,
    sounds: Arc<dyn SoundManager>,
    cache: SynthesisCache,
    cancel: CancelHandle,
    state: RunState,
    session: Option<Session>,
    progress: Option<ProgressCallback>,
}

impl ProductionRun {
    pub fn new(config: Config, voice: Arc<dyn VoiceGenerator>, sounds: Arc<dyn SoundManager>) -> Self {
        let cache = SynthesisCache::new(config.synthesis.cache_enabled);
        Self {
            id: Uuid::new_v4(),
            config,
            voice,
            sounds,
            cache,
            cancel: CancelHandle::new(),
            state: RunState::Initialized,
            session: None,
            progress: None,
        }
    }

    /// Report per-scene progress to `callback`
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize, &SceneSummary) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Handle that cancels this run from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The session as built so far; kept after failures for inspection
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn cache(&self) -> &SynthesisCache {
        &self.cache
    }

    fn fail(&mut self, err: ProductionError) -> ProductionError {
        let reason = match &err {
            ProductionError::Structure { .. } | ProductionError::Catalog(_) => FailureReason::Structure,
            ProductionError::Render(_) => FailureReason::Render,
            ProductionError::Cancelled { .. } => FailureReason::Cancelled,
        };
        match reason {
            FailureReason::Cancelled => warn!("Run {} cancelled: {}", self.id, err),
            _ => error!("Run {} failed: {}", self.id, err),
        }
        self.state = RunState::Failed(reason);
        err
    }

    /// Build, render and master a production
    pub async fn run(&mut self, production: &Production) -> Result<ProductionOutput, ProductionError> {
        self.state = RunState::Initialized;
        info!(
            "Run {}: '{}' with {} scene(s)",
            self.id,
            production.title,
            production.scenes.len()
        );

        let mut report = RunReport::new(self.id, &production.title);

        let catalog = match EffectCatalog::with_presets(&production.effects) {
            Ok(catalog) => catalog,
            Err(e) => return Err(self.fail(ProductionError::Catalog(e))),
        };
        report.warnings.extend(catalog.clamps().iter().map(RunWarning::from));

        let mut session = match Session::new(&self.config, &catalog) {
            Ok(session) => session,
            Err(e) => return Err(self.fail(ProductionError::Catalog(e))),
        };

        // Every scene is validated before the first request goes out
        let plans = match self.plan(production, &catalog) {
            Ok(plans) => plans,
            Err(e) => return Err(self.fail(e)),
        };

        if let Err(e) = self.build(&plans, &mut session, &mut report).await {
            self.session = Some(session);
            return Err(self.fail(e));
        }
        self.state = RunState::Placed;

        let rendered = match process_tracks(&session) {
            Ok(buses) => {
                self.state = RunState::Processed;
                master(&session, buses)
            }
            Err(e) => Err(e),
        };
        self.session = Some(session);
        let audio = match rendered {
            Ok(audio) => audio,
            Err(e) => return Err(self.fail(ProductionError::Render(e))),
        };
        self.state = RunState::Rendered;

        let (hits, misses, _) = self.cache.stats();
        report.cache_hits = hits;
        report.cache_misses = misses;
        report.total_duration = audio.duration_secs();
        self.state = RunState::Finalized;

        info!(
            "Run {} finalized: {:.2}s, {} warning(s)",
            self.id,
            report.total_duration,
            report.warnings.len()
        );
        Ok(ProductionOutput { audio, report })
    }

    fn plan(&self, production: &Production, catalog: &EffectCatalog) -> Result<Vec<ScenePlan>, ProductionError> {
        production
            .scenes
            .iter()
            .enumerate()
            .map(|(i, scene)| {
                plan_scene(
                    i,
                    scene,
                    production,
                    catalog,
                    self.voice.as_ref(),
                    &self.config.timing,
                )
            })
            .collect()
    }

    async fn build(
        &mut self,
        plans: &[ScenePlan],
        session: &mut Session,
        report: &mut RunReport,
    ) -> Result<(), ProductionError> {
        let resolver = Resolver::new(
            self.voice.clone(),
            self.sounds.clone(),
            self.cache.clone(),
            self.config.synthesis.clone(),
            session.sample_rate(),
            session.channels(),
            self.cancel.clone(),
        );
        let mut builder = TimelineBuilder::new(self.config.timing.clone(), resolver);

        for (i, plan) in plans.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(ProductionError::Cancelled { completed_scenes: i });
            }
            self.state = RunState::Building { scene: i };

            let summary = builder
                .build_scene(plan, i + 1 < plans.len(), session, &mut report.warnings)
                .await?;
            if let Some(progress) = &self.progress {
                progress(i + 1, plans.len(), &summary);
            }
            report.scenes.push(summary);
        }
        Ok(())
    }
}
