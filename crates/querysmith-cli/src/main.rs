// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Querysmith CLI tool

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::{AppConfig, EnvCredentials};
use querysmith::{RefinementSession, TemplateRenderer};
use querysmith_client::{TransportRegistry, TransportSource};
use querysmith_eval::{BlindSampler, Evaluator};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "querysmith")]
#[command(about = "Refine and evaluate prompts with language models", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Target {
    /// Provider name (defaults to the configured provider)
    #[arg(long)]
    provider: Option<String>,

    /// Model identifier or alias (defaults to the provider's first model)
    #[arg(long)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Refine a query with an optimization technique
    Optimize {
        /// Query to refine
        #[arg(short, long)]
        query: String,

        /// Technique template key (CoT, SC, PC, ...)
        #[arg(short, long)]
        technique: String,

        /// Refinement passes / candidate versions
        #[arg(short, long, default_value_t = 3)]
        iterations: u32,

        /// Also score the query before and after refinement
        #[arg(long)]
        evaluate: bool,

        /// Score with the human-authored rubric (with --evaluate)
        #[arg(long)]
        human: bool,

        #[command(flatten)]
        target: Target,
    },

    /// Score a query against a rubric
    Evaluate {
        /// Query to score
        #[arg(short, long)]
        query: String,

        /// Use the human-authored rubric
        #[arg(long)]
        human: bool,

        #[command(flatten)]
        target: Target,
    },

    /// Answer two queries side by side
    Compare {
        /// First query
        #[arg(short, long)]
        a: String,

        /// Second query
        #[arg(short, long)]
        b: String,

        #[command(flatten)]
        target: Target,
    },

    /// Answer a query with randomly chosen models, hiding providers
    Blind {
        /// Query to answer
        #[arg(short, long)]
        query: String,

        /// Number of samples (2-4)
        #[arg(short, long, default_value_t = 2)]
        samples: usize,

        /// Seed for model selection
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Judge a model's answer to a query
    Judge {
        /// Original query
        #[arg(short, long)]
        query: String,

        /// Answer to judge
        #[arg(short, long)]
        response: String,

        #[command(flatten)]
        target: Target,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

struct App {
    config: AppConfig,
    transports: Arc<TransportRegistry>,
    renderer: Arc<TemplateRenderer>,
}

impl App {
    fn new(config: AppConfig) -> anyhow::Result<Self> {
        let credentials = Arc::new(EnvCredentials::new(config.api_keys.clone()));
        let transports = Arc::new(TransportRegistry::new(
            credentials,
            config.transport_config()?,
        ));
        let renderer = Arc::new(TemplateRenderer::new(Arc::new(config.template_store())).with_cache(64));
        Ok(Self {
            config,
            transports,
            renderer,
        })
    }

    fn evaluator(&self, target: &Target) -> anyhow::Result<Evaluator> {
        let (provider, model) = self
            .config
            .select(target.provider.as_deref(), target.model.as_deref())?;
        let transport = self.transports.transport_for(&provider)?;
        Ok(Evaluator::new(transport, self.renderer.clone(), model))
    }

    async fn run(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Optimize {
                query,
                technique,
                iterations,
                evaluate,
                human,
                target,
            } => {
                let (provider, model) = self
                    .config
                    .select(target.provider.as_deref(), target.model.as_deref())?;
                let session = RefinementSession::connect(
                    self.transports.as_ref(),
                    query,
                    provider,
                    model.clone(),
                    self.renderer.clone(),
                )?;
                if evaluate {
                    let evaluator = Evaluator::new(session.transport().clone(), self.renderer.clone(), model);
                    let report = evaluator
                        .refine_and_evaluate(&session, &technique, iterations, human, None)
                        .await?;
                    print_json(&report)
                } else {
                    let output = session.optimize(&technique, iterations).await?;
                    print_json(&output)
                }
            }
            Commands::Evaluate {
                query,
                human,
                target,
            } => {
                let verdict = self.evaluator(&target)?.evaluate(&query, human).await?;
                print_json(&verdict)
            }
            Commands::Compare { a, b, target } => {
                let comparison = self.evaluator(&target)?.compare(&a, &b).await?;
                print_json(&comparison)
            }
            Commands::Blind {
                query,
                samples,
                seed,
            } => {
                let mut sampler = BlindSampler::new(
                    self.transports.clone(),
                    Arc::new(self.config.model_registry()),
                    self.config.blind_providers(),
                );
                if let Some(seed) = seed {
                    sampler = sampler.with_seed(seed);
                }
                let samples = sampler.generate_blind_samples(&query, samples).await?;
                print_json(&samples)
            }
            Commands::Judge {
                query,
                response,
                target,
            } => {
                let judgement = self
                    .evaluator(&target)?
                    .judge_answer(&query, &response)
                    .await?;
                print_json(&judgement)
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("could not load {}", cli.config.display()))?;
    let app = App::new(config)?;
    app.run(cli.command).await
}
