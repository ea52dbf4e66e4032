// src/models/mod.rs

pub mod activity;
pub mod curriculum;
pub mod notification;
pub mod query;
pub mod quiz;
pub mod report;
pub mod result;
pub mod user;
