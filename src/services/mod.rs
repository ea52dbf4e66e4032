// src/services/mod.rs
//
// Domain logic shared by handlers: grading, report rollups, notification
// fan-out, certificate rendering and login analytics.

pub mod accounts;
pub mod activity;
pub mod attempts;
pub mod certificate;
pub mod dispatch;
pub mod notify;
pub mod reports;
pub mod scoring;
