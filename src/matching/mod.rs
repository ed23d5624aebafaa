// src/matching/mod.rs
pub mod cache;
pub mod engine;
pub mod policy;
pub mod similarity;
