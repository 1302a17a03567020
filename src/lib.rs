// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Gym-Ledger: training-session ledger and staff management for gyms
//!
//! This crate provides the backend API for scheduling personal-training
//! sessions, completing them against members' session credits, and managing
//! trainers, managers and gyms.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::GymStore;
use services::{
    AccessControl, AuditTrail, FirebaseTokenVerifier, MemberService, ScheduleService,
    SessionLedger, StaffService,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn GymStore>,
    pub verifier: Arc<FirebaseTokenVerifier>,
    pub access: AccessControl,
    pub ledger: SessionLedger,
    pub staff: StaffService,
    pub schedules: ScheduleService,
    pub members: MemberService,
}

impl AppState {
    /// Wire every service onto one store handle.
    pub fn new(
        config: Config,
        store: Arc<dyn GymStore>,
        verifier: Arc<FirebaseTokenVerifier>,
    ) -> Self {
        let access = AccessControl::new(store.clone());
        let audit = AuditTrail::new(store.clone());
        Self {
            ledger: SessionLedger::new(store.clone(), access.clone()),
            staff: StaffService::new(store.clone(), audit),
            schedules: ScheduleService::new(store.clone(), access.clone()),
            members: MemberService::new(store.clone(), access.clone()),
            access,
            config,
            store,
            verifier,
        }
    }
}
