// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Blind multi-model sampling.
//!
//! Answers one query with several randomly chosen models and tags each answer
//! with its model only, so a human rater cannot tell which provider produced
//! it.

use futures::future::try_join_all;
use querysmith::{Error, ModelRegistry, Result};
use querysmith_client::{single_user_turn, TransportSource};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Accepted number of samples per request
pub const SAMPLE_RANGE: RangeInclusive<usize> = 2..=4;

/// One blind answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSample {
    /// Model that produced the answer
    pub model: String,
    /// Answer text
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    provider: String,
    model: String,
}

/// Draws blind samples from the models of a set of providers.
pub struct BlindSampler {
    transports: Arc<dyn TransportSource>,
    models: Arc<dyn ModelRegistry>,
    providers: Vec<String>,
    seed: Option<u64>,
}

impl BlindSampler {
    /// Create a sampler over the models listed for `providers`
    pub fn new(
        transports: Arc<dyn TransportSource>,
        models: Arc<dyn ModelRegistry>,
        providers: Vec<String>,
    ) -> Self {
        Self {
            transports,
            models,
            providers,
            seed: None,
        }
    }

    /// Make model selection deterministic
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Distinct (provider, model) pairs available for sampling
    fn candidate_pool(&self) -> Vec<Candidate> {
        let mut pool: Vec<Candidate> = Vec::new();
        for provider in &self.providers {
            for model in self.models.list_models(provider) {
                let candidate = Candidate {
                    provider: provider.clone(),
                    model,
                };
                if !pool.contains(&candidate) {
                    pool.push(candidate);
                }
            }
        }
        pool
    }

    fn choose(&self, pool: &[Candidate], count: usize) -> Vec<Candidate> {
        match self.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                pool.choose_multiple(&mut rng, count).cloned().collect()
            }
            None => pool
                .choose_multiple(&mut rand::thread_rng(), count)
                .cloned()
                .collect(),
        }
    }

    /// Answer `query` with `sample_count` distinct models chosen at random.
    pub async fn generate_blind_samples(
        &self,
        query: &str,
        sample_count: usize,
    ) -> Result<Vec<BlindSample>> {
        if !SAMPLE_RANGE.contains(&sample_count) {
            return Err(Error::InvalidSampleCount {
                requested: sample_count,
                min: *SAMPLE_RANGE.start(),
                max: *SAMPLE_RANGE.end(),
            });
        }

        let pool = self.candidate_pool();
        if pool.len() < sample_count {
            return Err(Error::InsufficientModelPool {
                requested: sample_count,
                available: pool.len(),
            });
        }

        let chosen = self.choose(&pool, sample_count);
        let transports = chosen
            .iter()
            .map(|c| self.transports.transport_for(&c.provider))
            .collect::<querysmith_client::Result<Vec<_>>>()?;

        tracing::info!(
            samples = sample_count,
            pool = pool.len(),
            "generating blind samples"
        );

        let turns = single_user_turn(query);
        let calls = chosen.iter().zip(&transports).map(|(candidate, transport)| {
            let turns = &turns;
            async move {
                let completion = transport.call_chat_completion(&candidate.model, turns).await?;
                Ok::<_, Error>(BlindSample {
                    model: candidate.model.clone(),
                    text: completion.text,
                })
            }
        });
        try_join_all(calls).await
    }
}
