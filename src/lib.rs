//! LendingDesk Backend Library
//!
//! Loan lifecycle and borrowing eligibility for a school lending desk:
//! eligibility checks, loan creation and return, live overdue tracking, and
//! period statistics, served over a small JSON API.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod loan;
pub mod loan_service;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
