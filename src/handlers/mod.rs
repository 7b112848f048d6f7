// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod citizen;
pub mod communications;
pub mod forum;
pub mod local_services;
pub mod locations;
pub mod messages;
pub mod notifications;
pub mod organizations;
pub mod phone;
pub mod projects;
pub mod representatives;
pub mod stats;
pub mod surveys;
pub mod uploads;
pub mod users;
pub mod verification;
pub mod ws;
