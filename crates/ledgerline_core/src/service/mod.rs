//! Use-case services orchestrating repositories and collaborators.
//!
//! # Responsibility
//! - Provide the caller-facing API of the core: views, requests, errors.
//! - Keep orchestration (token decode, audit notification) out of repos.

pub mod document_service;
pub mod line_item_service;
