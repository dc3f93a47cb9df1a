//! Dataverse - spreadsheet upload and chart analytics backend
//!
//! This library provides the core components for the Dataverse server.

pub mod api;
pub mod auth;
pub mod chart;
pub mod completion;
pub mod config;
pub mod entity;
pub mod sheet;
pub mod storage;
pub mod system;
