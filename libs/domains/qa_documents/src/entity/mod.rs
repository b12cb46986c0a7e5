//! Sea-ORM entities for the owner configuration and QA entry tables

pub mod app_model_config;
pub mod qa_document;
