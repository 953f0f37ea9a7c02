//! buglocator: rank the files of a repository by how likely they are to
//! contain the fix for a bug report.

pub mod bug_report;
pub mod cli;
pub mod collaborative;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod features;
pub mod folds;
pub mod git;
pub mod history;
pub mod index;
pub mod learner;
pub mod metrics;
pub mod ranker;
pub mod scanner;
pub mod similarity;
pub mod tokenizer;
pub mod weighting;
