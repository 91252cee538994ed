// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Evaluation engine for Querysmith
//!
//! Scores queries against rubric templates, compares two queries side by
//! side, judges model answers and draws blind multi-model samples.

pub mod blind;
pub mod evaluator;
pub mod report;

pub use blind::{BlindSample, BlindSampler, SAMPLE_RANGE};
pub use evaluator::{AnswerJudgement, Comparison, Criteria, EvaluationVerdict, Evaluator};
pub use report::RefinementReport;
