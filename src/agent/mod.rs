//! LLM modules for review analysis.
//!
//! This module provides the provider clients and the analysis tasks
//! built on top of them.

pub mod analyst;
pub mod client;

pub use analyst::{AnalysisKind, AnalysisSections, ReviewAnalysis, ReviewAnalyst, DEFAULT_SAMPLE_SIZE};
pub use client::{LanguageModelClient, ModelSettings, Provider};
