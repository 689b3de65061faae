//! Marketplace domain: booking lifecycle, payment reconciliation, notifications,
//! and the audit trail backing them.

pub mod access;
pub mod audit;
pub mod bookings;
pub mod domain;
pub mod fault;
pub mod notifications;
pub mod payments;
pub mod tokens;
