//! Documentation MCP Service
//!
//! This crate provides a Model Context Protocol (MCP) server over a fixed set of
//! `llms.txt` documentation sources. Hosts can list the sources and fetch their
//! content, along with any linked page whose domain is allowed.
//!
//! # Features
//!
//! - Named remote and local documentation sources from YAML, JSON or the CLI
//! - Automatic allowance of each remote source's domain, plus explicit extras
//! - HTML pages returned as markdown
//! - stdio and SSE transports
//!
//! # Modules
//!
//! - [`allowlist`]: Host allowlist gating remote fetches
//! - [`config`]: Startup configuration and source parsing
//! - [`docs_fetcher`]: Domain-gated fetching of documentation
//! - [`html`]: HTML detection and markdown rendering
//! - [`http`]: HTTP client abstraction
//! - [`mcp`]: MCP server implementation and protocol handling
//! - [`server`]: Transport startup

pub mod allowlist;
pub mod config;
pub mod docs_fetcher;
pub mod html;
pub mod http;
pub mod mcp;
pub mod server;
