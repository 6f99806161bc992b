// src/services/mod.rs

pub mod mastery;
pub mod mastery_query;
pub mod notifier;
pub mod progress;
pub mod topics;
