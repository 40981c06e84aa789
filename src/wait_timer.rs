/*
 Copyright 2018 Intel Corporation

 Licensed under the Apache License, Version 2.0 (the "License");
 you may not use this file except in compliance with the License.
 You may obtain a copy of the License at

     http://www.apache.org/licenses/LICENSE-2.0

 Unless required by applicable law or agreed to in writing, software
 distributed under the License is distributed on an "AS IS" BASIS,
 WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 See the License for the specific language governing permissions and
 limitations under the License.
------------------------------------------------------------------------------
*/

use crate::error::PoetError;
use crate::signing_context::SigningContext;
use rand::distributions::{Distribution, Exp};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sentinel identifier denoting "no previous certificate" (genesis).
pub const NULL_IDENTIFIER: &str = "0000000000000000";
pub const IDENTIFIER_LENGTH: usize = 16;

// Timers, once expired, should not be usable indefinitely. This constant
// allows a 30-second window after expiration for which a timer may be
// used to create a wait certificate.
pub const TIMER_TIMEOUT_PERIOD: f64 = 30.0;

pub(crate) fn current_wall_clock() -> f64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Clock is before UNIX epoch");
    since_epoch.as_secs() as f64 + f64::from(since_epoch.subsec_nanos()) * 1e-9
}

/// The randomized delay commitment chained to the previous certificate.
/// Canonical serialization is a flat JSON document whose keys are
/// emitted in fixed lexicographic order (enforced by field order here),
/// so signature computation is deterministic across implementations.
/// The signature is detached and never part of the document.
///
/// A timer is a single-use immutable value object: it is either consumed
/// into a wait certificate or discarded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WaitTimer {
    #[serde(rename = "Duration")]
    pub duration: f64,
    #[serde(rename = "LocalMean")]
    pub local_mean: f64,
    #[serde(rename = "PreviousCertID")]
    pub previous_certificate_id: String,
    #[serde(rename = "RequestTime")]
    pub request_time: f64,
    #[serde(rename = "ValidatorAddress")]
    pub validator_address: String,
    #[serde(skip)]
    pub signature: String,
}

impl WaitTimer {
    /// Creates a wait timer chained to ```previous_certificate_id``` and
    /// signs it with the wait-timer key. ```duration``` is
    /// ```minimum_wait_time``` plus an exponential sample with rate
    /// ```1/local_mean```, drawn from a per-call source seeded from the
    /// high-resolution clock. The sample is not cryptographically
    /// secure; unpredictability comes from the enclave boundary and the
    /// certificate chaining, not from the RNG alone.
    pub fn create(
        context: &SigningContext,
        validator_address: &str,
        previous_certificate_id: &str,
        local_mean: f64,
        minimum_wait_time: f64,
    ) -> Result<WaitTimer, PoetError> {
        if !local_mean.is_finite() || local_mean <= 0.0 {
            return Err(PoetError::ValueError(format!(
                "Local mean must be positive and finite: {}",
                local_mean
            )));
        }
        if minimum_wait_time < 0.0 {
            return Err(PoetError::ValueError(format!(
                "Minimum wait time must not be negative: {}",
                minimum_wait_time
            )));
        }
        if previous_certificate_id.len() != IDENTIFIER_LENGTH {
            return Err(PoetError::ValueError(format!(
                "Previous certificate id must have length {}: {}",
                IDENTIFIER_LENGTH, previous_certificate_id
            )));
        }

        let request_time = current_wall_clock();
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Clock is before UNIX epoch");
        let mut random_source =
            StdRng::seed_from_u64(seed.as_secs() ^ u64::from(seed.subsec_nanos()));
        let duration =
            minimum_wait_time + Exp::new(1.0 / local_mean).sample(&mut random_source);

        let mut wait_timer = WaitTimer {
            duration,
            local_mean,
            previous_certificate_id: previous_certificate_id.to_string(),
            request_time,
            validator_address: validator_address.to_string(),
            signature: String::new(),
        };
        // The identity key must never be used here
        wait_timer.signature = context.sign_timer(wait_timer.serialize()?.as_bytes())?;
        debug!(
            "Created wait timer: duration {:.3}, previous cert {}",
            duration, previous_certificate_id
        );
        Ok(wait_timer)
    }

    /// True iff the committed delay has elapsed.
    pub fn is_expired(&self) -> bool {
        self.request_time + self.duration < current_wall_clock()
    }

    /// True once the post-expiry usage window has also elapsed.
    pub fn has_timed_out(&self) -> bool {
        self.request_time + self.duration + TIMER_TIMEOUT_PERIOD < current_wall_clock()
    }

    /// Canonical serialization, signature excluded.
    pub fn serialize(&self) -> Result<String, PoetError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses the canonical document and verifies the detached signature
    /// against the known wait-timer public key. All fields are
    /// mandatory; a missing one is a ```ValueError``` naming it. A
    /// signature mismatch is a hard ```ValueError``` and the timer is
    /// not constructed.
    pub fn deserialize(
        serialized: &str,
        signature: &str,
        wait_timer_public_key: &str,
    ) -> Result<WaitTimer, PoetError> {
        let mut wait_timer: WaitTimer = serde_json::from_str(serialized)?;
        if !SigningContext::verify(serialized.as_bytes(), signature, wait_timer_public_key)? {
            return Err(PoetError::ValueError(
                "Wait timer signature does not match".to_string(),
            ));
        }
        wait_timer.signature = signature.to_string();
        Ok(wait_timer)
    }
}
