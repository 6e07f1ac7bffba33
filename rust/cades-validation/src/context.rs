// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-verification time state.

use chrono::{DateTime, Utc};

/// Time references for one `verify` call.
///
/// The main reference starts at the wall clock and is replaced by the time of the
/// most authoritative validated time-stamp. Basic signature time-stamps only fill
/// the temporary reference, which feeds the revocation grace-period comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationContext {
    wall_clock: DateTime<Utc>,
    main_time_reference: DateTime<Utc>,
    main_from_timestamp: bool,
    temporary_time_reference: Option<DateTime<Utc>>,
}

impl VerificationContext {
    pub fn new(wall_clock: DateTime<Utc>) -> Self {
        Self {
            wall_clock,
            main_time_reference: wall_clock,
            main_from_timestamp: false,
            temporary_time_reference: None,
        }
    }

    pub fn wall_clock(&self) -> DateTime<Utc> {
        self.wall_clock
    }

    pub fn main_time_reference(&self) -> DateTime<Utc> {
        self.main_time_reference
    }

    pub fn temporary_time_reference(&self) -> Option<DateTime<Utc>> {
        self.temporary_time_reference
    }

    /// True once a validated time-stamp has replaced the wall clock.
    pub fn main_from_timestamp(&self) -> bool {
        self.main_from_timestamp
    }

    pub fn set_main_time_reference(&mut self, time: DateTime<Utc>) {
        self.main_time_reference = time;
        self.main_from_timestamp = true;
    }

    pub fn set_temporary_time_reference(&mut self, time: DateTime<Utc>) {
        self.temporary_time_reference = Some(time);
    }

    pub fn reset_to_wall_clock(&mut self) {
        self.main_time_reference = self.wall_clock;
        self.main_from_timestamp = false;
    }

    /// Time compared against a revocation instant: the basic time-stamp if any, else the main reference.
    pub fn grace_time(&self) -> DateTime<Utc> {
        self.temporary_time_reference.unwrap_or(self.main_time_reference)
    }
}
