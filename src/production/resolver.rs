/*!
 * Concurrent resolution of synthesis and retrieval requests.
 *
 * Requests are independent, so they are issued concurrently up to the
 * configured pool size. Each call is bounded by a timeout and retried with
 * exponential backoff. Results are returned sorted by event index, whatever
 * order they completed in, so placement stays in document order.
 */

use futures::stream::{self, StreamExt};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::cache::{CacheKey, CachedAudio, SynthesisCache};
use super::orchestrator::CancelHandle;
use crate::app_config::SynthesisConfig;
use crate::audio::buffer::AudioBuffer;
use crate::effects::catalog::EffectChain;
use crate::effects::processor::apply_chain;
use crate::errors::{ProviderError, ResolutionError};
use crate::providers::{SoundManager, SoundSource, VoiceGenerator, VoiceProfile};

/// One pending call to an external generator
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Voice {
        text: String,
        profile: VoiceProfile,
        emotion: Option<String>,
        chain: EffectChain,
    },
    Sound {
        description: String,
        category: Option<String>,
        target_secs: Option<f64>,
        chain: EffectChain,
    },
}

impl Request {
    fn cache_key(&self) -> CacheKey {
        match self {
            Self::Voice {
                text,
                profile,
                emotion,
                chain,
            } => CacheKey::voice(text, profile, emotion.as_deref(), chain),
            Self::Sound {
                description,
                category,
                target_secs,
                chain,
            } => CacheKey::sound(description, category.as_deref(), *target_secs, chain),
        }
    }

    fn chain(&self) -> &EffectChain {
        match self {
            Self::Voice { chain, .. } | Self::Sound { chain, .. } => chain,
        }
    }

    fn label(&self) -> &str {
        match self {
            Self::Voice { text, .. } => text,
            Self::Sound { description, .. } => description,
        }
    }
}

/// A resolved buffer in output format with its effect chain applied
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub buffer: AudioBuffer,
    pub source: Option<SoundSource>,
}

/// Bounded worker pool over the voice and sound collaborators
#[derive(Clone)]
pub struct Resolver {
    voice: Arc<dyn VoiceGenerator>,
    sounds: Arc<dyn SoundManager>,
    cache: SynthesisCache,
    settings: SynthesisConfig,
    sample_rate: u32,
    channels: u16,
    cancel: CancelHandle,
}

impl Resolver {
    pub fn new(
        voice: Arc<dyn VoiceGenerator>,
        sounds: Arc<dyn SoundManager>,
        cache: SynthesisCache,
        settings: SynthesisConfig,
        sample_rate: u32,
        channels: u16,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            voice,
            sounds,
            cache,
            settings,
            sample_rate,
            channels,
            cancel,
        }
    }

    pub fn cache(&self) -> &SynthesisCache {
        &self.cache
    }

    /// Resolve every request; results are sorted by the given index
    pub async fn resolve_all(
        &self,
        requests: Vec<(usize, Request)>,
    ) -> Vec<(usize, Result<Resolved, ResolutionError>)> {
        let workers = self.settings.max_concurrent_requests.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));

        let mut results: Vec<(usize, Result<Resolved, ResolutionError>)> = stream::iter(requests)
            .map(|(index, request)| {
                let semaphore = semaphore.clone();
                async move {
                    let _permit = semaphore.acquire().await.ok();
                    (index, self.resolve_one(&request).await)
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        results
    }

    /// Resolve a single request through the cache
    pub async fn resolve_one(&self, request: &Request) -> Result<Resolved, ResolutionError> {
        if self.cancel.is_cancelled() {
            return Err(ResolutionError::Cancelled);
        }

        let key = request.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Resolved {
                buffer: cached.buffer,
                source: cached.source,
            });
        }

        let (dry, source) = self.call_with_retry(request).await?;

        let mut buffer = apply_chain(&dry.conformed(self.sample_rate, self.channels), request.chain());
        // Sounds with a target length are held to it exactly, after any stretch
        if let Request::Sound {
            target_secs: Some(secs),
            ..
        } = request
        {
            buffer.fit_to_duration(*secs);
        }

        self.cache.store(
            key,
            CachedAudio {
                buffer: buffer.clone(),
                source: source.clone(),
            },
        );
        Ok(Resolved { buffer, source })
    }

    async fn call(&self, request: &Request) -> Result<(AudioBuffer, Option<SoundSource>), ProviderError> {
        match request {
            Request::Voice {
                text,
                profile,
                emotion,
                chain,
            } => {
                let buffer = self
                    .voice
                    .synthesize(text, profile, emotion.as_deref(), chain)
                    .await?;
                Ok((buffer, None))
            }
            Request::Sound {
                description,
                category,
                target_secs,
                ..
            } => {
                let resolution = self
                    .sounds
                    .resolve_sound(description, category.as_deref(), *target_secs)
                    .await?;
                Ok((resolution.buffer, Some(resolution.source)))
            }
        }
    }

    async fn call_with_retry(
        &self,
        request: &Request,
    ) -> Result<(AudioBuffer, Option<SoundSource>), ResolutionError> {
        let timeout = Duration::from_secs(self.settings.timeout_secs);
        let attempts = self.settings.retry_count + 1;
        let mut last_error = ResolutionError::Cancelled;

        for attempt in 0..attempts {
            if self.cancel.is_cancelled() {
                return Err(ResolutionError::Cancelled);
            }
            if attempt > 0 {
                let backoff = self.settings.retry_backoff_ms.saturating_mul(1 << (attempt - 1).min(16));
                debug!(
                    "Retrying '{}' in {}ms (attempt {}/{})",
                    request.label(),
                    backoff,
                    attempt + 1,
                    attempts
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            match tokio::time::timeout(timeout, self.call(request)).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    warn!("Request for '{}' failed: {}", request.label(), e);
                    last_error = ResolutionError::Provider(e);
                }
                Err(_) => {
                    warn!(
                        "Request for '{}' timed out after {}s",
                        request.label(),
                        self.settings.timeout_secs
                    );
                    last_error = ResolutionError::Timeout {
                        secs: self.settings.timeout_secs,
                    };
                }
            }
        }

        Err(last_error)
    }
}
