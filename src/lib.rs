//! pdb-advisor - PodDisruptionBudget advisory tool server
//!
//! Serves availability analysis and policy management tools over an
//! MCP-style JSON dispatch endpoint, proxies chat completions to several
//! LLM providers, and guards both behind rate limiting, authentication,
//! CORS and an audit trail.

pub mod api;
pub mod audit;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod domain;
pub mod logging;
pub mod mcp;
pub mod provider;
pub mod ratelimit;
pub mod tools;
