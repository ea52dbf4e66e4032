// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod curriculum;
pub mod dashboard;
pub mod notification;
pub mod query;
pub mod quiz;
pub mod report;
