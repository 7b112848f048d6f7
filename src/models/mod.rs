// src/models/mod.rs

pub mod comment;
pub mod communication;
pub mod interaction;
pub mod local_service;
pub mod location;
pub mod message;
pub mod notification;
pub mod organization;
pub mod pagination;
pub mod phone;
pub mod post;
pub mod project;
pub mod representative;
pub mod survey;
pub mod user;
pub mod verification;
