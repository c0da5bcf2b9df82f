//! # TradeFlow Integrations Library
//!
//! Provider connectors (CRM, project boards, Microsoft 365), the factory that
//! builds them, webhook processing, and the HTTP API exposing both.

pub mod auth;
pub mod automation;
pub mod config;
pub mod connectors;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub mod webhook_service;
