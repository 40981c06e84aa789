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

use crate::enclave::EnclaveBackend;
use crate::error::PoetError;
use crate::ias_client::IasClient;
use std::time::{Duration, Instant};

/// How long an installed signature revocation list stays fresh. Bounds
/// how long a compromised identity can keep participating.
pub const SIG_RL_REFRESH_PERIOD: Duration = Duration::from_secs(8 * 60 * 60);

/// Keeps the enclave's signature revocation list fresh. The EPID group
/// id is fetched once and cached; the list itself is re-fetched every
/// refresh period. Process-wide state; callers serialize access.
pub struct RevocationRefresher {
    last_refresh: Option<Instant>,
    epid_group: Option<String>,
}

impl RevocationRefresher {
    pub fn new() -> Self {
        RevocationRefresher {
            last_refresh: None,
            epid_group: None,
        }
    }

    fn is_stale(&self) -> bool {
        match self.last_refresh {
            Some(refreshed_at) => refreshed_at.elapsed() > SIG_RL_REFRESH_PERIOD,
            None => true,
        }
    }

    /// Re-fetches and installs the signature revocation list if no
    /// refresh has occurred yet or the last one is older than the
    /// refresh period. In simulated mode the first call installs an
    /// empty list and later calls are no-ops. Failures are transient and
    /// do not invalidate already-issued certificates.
    pub fn refresh_if_stale(
        &mut self,
        backend: &dyn EnclaveBackend,
        ias_client: &IasClient,
    ) -> Result<(), PoetError> {
        if !self.is_stale() {
            return Ok(());
        }

        if backend.is_simulator() {
            if self.last_refresh.is_none() {
                backend.set_signature_revocation_list("")?;
                self.last_refresh = Some(Instant::now());
            }
            return Ok(());
        }

        if self.epid_group.is_none() {
            self.epid_group = Some(backend.get_epid_group()?);
        }
        let epid_group = self
            .epid_group
            .clone()
            .expect("EPID group was just cached");

        let sig_rl =
            ias_client.get_signature_revocation_list(Some(epid_group.as_str()), None)?;
        debug!("Received SigRL of {} length", sig_rl.len());
        backend.set_signature_revocation_list(sig_rl.as_str())?;
        self.last_refresh = Some(Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enclave::SimulatedEnclave;

    #[test]
    fn test_new_refresher_is_stale() {
        let refresher = RevocationRefresher::new();
        assert!(refresher.is_stale());
    }

    #[test]
    fn test_simulator_refresh_is_idempotent() {
        let enclave = SimulatedEnclave::new();
        let ias_client = IasClient::default();
        let mut refresher = RevocationRefresher::new();
        refresher.refresh_if_stale(&enclave, &ias_client).unwrap();
        assert!(!refresher.is_stale());
        let first_refresh = refresher.last_refresh;
        refresher.refresh_if_stale(&enclave, &ias_client).unwrap();
        assert_eq!(refresher.last_refresh, first_refresh);
    }
}
