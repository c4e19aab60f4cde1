//! Job board domain: postings, applications, moderation, billing and the
//! workflows that drive a listing from payment to expiry.

pub mod access;
pub mod domain;
pub mod http;
pub mod lifecycle;
pub mod memory;
pub mod notifications;
pub mod payments;
pub mod pricing;
pub mod rate_limit;
pub mod repository;
pub mod service;
pub mod validation;
pub mod webhook;
pub mod workflow;
