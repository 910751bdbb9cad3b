//! Legal Intake API Library
//!
//! This library provides the core functionality for the Hebrew legal-intake
//! service: the scripted conversation controller, document field extraction,
//! case persistence, and the external reasoning-service and CRM clients.
//!
//! # Modules
//!
//! - `assistant`: Reasoning-service (chat completions) client.
//! - `config`: Configuration management.
//! - `conversation`: Scripted-intake conversation state machine.
//! - `crm`: Best-effort HubSpot lead sync.
//! - `documents`: Upload storage and PDF field extraction.
//! - `errors`: Error handling types.
//! - `extractor`: Pattern-based field extractor.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `storage`: Database connection and case/contact persistence.
//! - `ticket`: Branching upload/manual flow for the traffic category.
//! - `topics`: Static per-category intake question catalog.

pub mod assistant;
pub mod config;
pub mod conversation;
pub mod crm;
pub mod documents;
pub mod errors;
pub mod extractor;
pub mod handlers;
pub mod models;
pub mod storage;
pub mod ticket;
pub mod topics;
