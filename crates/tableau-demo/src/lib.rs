#![forbid(unsafe_code)]

//! Tableau demo application.
//!
//! Three toy screens behind the runtime shell, driven headlessly by a
//! manual clock so runs are reproducible and can be recorded.

pub mod cli;
pub mod overlay;
pub mod runner;
pub mod screens;
