// src/models/mod.rs

pub mod assessment;
pub mod course;
pub mod mastery;
pub mod progress;
pub mod topic;
pub mod user;
