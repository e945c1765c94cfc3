//! Simtrans - Translation submission and completeness reports
//!
//! Translators submit localized strings for a catalog of simulations; each
//! submission is merged into per-repository translation files that keep their
//! full edit history, and per-language completeness reports are computed and
//! cached for maintainers.

pub mod categorize;
pub mod cli;
pub mod config;
pub mod error;
pub mod form;
pub mod keys;
pub mod merge;
pub mod report;
pub mod sources;
pub mod translation;
pub mod workflow;
