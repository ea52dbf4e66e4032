// src/utils/mod.rs

pub mod client;
pub mod hash;
pub mod html;
pub mod jwt;
pub mod slug;
