pub mod cache;
pub mod compare;
pub mod config;
pub mod domain;
pub mod ingest;
pub mod llm;
pub mod recommend;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod time;
