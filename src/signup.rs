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

use crate::avr::check_verification_report;
use crate::enclave::EnclaveBackend;
use crate::error::{PoetError, SignupError};
use crate::ias_client::IasClient;
use crate::poet_config::PoetConfig;
use crate::poet_util::{read_binary_file, read_file_as_string};
use crate::sealed_storage;
use crate::sig_rl::RevocationRefresher;
use crate::signing_context::SigningContext;
use openssl::pkey::{PKey, Public};
use std::thread;
use std::time::Duration;

// A validator must not proceed with stale or absent revocation data, so
// bootstrap retrieval retries in a blocking loop
const SIG_RL_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// A validator's enrolled PoET identity plus attestation proof. The
/// sealed signup data is supplied by the enclave, attached
/// post-construction and local-only: it must never appear on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignupInfo {
    // Encoded public key corresponding to the private key used by PoET
    // to sign wait certificates
    pub poet_public_key: String,

    // Information that can be used to verify the validity of the signup
    // information, stored as an opaque JSON string
    pub proof_data: String,

    // The anti-Sybil ID for the enclave that generated the signup
    // information
    pub anti_sybil_id: String,

    // Must match the nonce provided when the signup info was created
    pub nonce: String,

    #[serde(skip)]
    pub sealed_signup_data: Vec<u8>,
}

impl SignupInfo {
    fn new(poet_public_key: String, proof_data: String, anti_sybil_id: String, nonce: String) -> Self {
        SignupInfo {
            poet_public_key,
            proof_data,
            anti_sybil_id,
            nonce,
            sealed_signup_data: vec![],
        }
    }
}

/// Attestation proof packaged into ```SignupInfo::proof_data```.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignupProofData {
    pub evidence_payload: EvidencePayload,
    pub verification_report: String,
    pub signature: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EvidencePayload {
    pub pse_manifest: String,
}

/// Orchestrates enrollment: drives the enclave backend, the attestation
/// client and the revocation refresher to produce a ```SignupInfo```
/// bound to the originator's public key hash, and manages sealed signup
/// state across restarts.
pub struct SignupManager {
    config: PoetConfig,
    ias_client: IasClient,
    refresher: RevocationRefresher,
    backend: Box<dyn EnclaveBackend>,
}

impl SignupManager {
    /// Builds a manager over the configured backend. The IAS client is
    /// only materialized when running against real hardware; the
    /// simulator never contacts the attestation service.
    pub fn new(config: PoetConfig, backend: Box<dyn EnclaveBackend>) -> Result<Self, PoetError> {
        let mut ias_client = IasClient::default();
        if !backend.is_simulator() {
            ias_client.set_ias_url(config.get_ias_url());
            ias_client.set_spid_cert(read_binary_file(config.get_spid_cert_file().as_str())?);
            ias_client.set_password(config.get_password());
        }
        Ok(SignupManager {
            config,
            ias_client,
            refresher: RevocationRefresher::new(),
            backend,
        })
    }

    /// Ensures the enclave holds a fresh signature revocation list,
    /// blocking with a fixed backoff until retrieval succeeds. Fatal
    /// attestation failures are not retried.
    fn refresh_sig_rl_blocking(&mut self) -> Result<(), SignupError> {
        loop {
            match self
                .refresher
                .refresh_if_stale(self.backend.as_ref(), &self.ias_client)
            {
                Ok(()) => return Ok(()),
                Err(PoetError::Transient(msg)) | Err(PoetError::Io(msg)) => {
                    warn!(
                        "Error fetching signature revocation list ({}); retrying in {}s",
                        msg,
                        SIG_RL_RETRY_BACKOFF.as_secs()
                    );
                    thread::sleep(SIG_RL_RETRY_BACKOFF);
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    fn load_report_public_key(&self) -> Result<PKey<Public>, PoetError> {
        let pem = read_file_as_string(self.config.get_ias_report_key_file().as_str())?;
        PKey::public_key_from_pem(pem.as_bytes()).map_err(|error| {
            PoetError::ValueError(format!("Invalid attestation report key: {}", error))
        })
    }

    /// Enrolls the validator: produces signup data in the enclave bound
    /// to ```originator_public_key_hash```, and — when running against
    /// real hardware — has it attested and validates the verification
    /// report. Retryable and fatal failures are distinguished so a
    /// caller cannot mistake a revoked EPID group for an IAS hiccup.
    pub fn create_signup_info(
        &mut self,
        context: &mut SigningContext,
        originator_public_key_hash: &str,
        nonce: &str,
    ) -> Result<SignupInfo, SignupError> {
        // Update SigRL before getting the quote
        self.refresh_sig_rl_blocking()?;

        info!("creating signup info");
        let signup_data = self
            .backend
            .create_signup_data(context, originator_public_key_hash)?;

        let (proof_data, anti_sybil_id) = if self.backend.is_simulator() {
            // Not attested; placeholders only
            (String::new(), originator_public_key_hash.to_string())
        } else {
            let response = self.ias_client.post_verify_attestation(
                signup_data.enclave_quote.as_bytes(),
                Some(signup_data.pse_manifest.as_str()),
                Some(nonce),
            )?;

            let report_public_key = self.load_report_public_key().map_err(SignupError::from)?;
            let report = check_verification_report(
                response.verification_report.as_str(),
                response.signature.as_str(),
                &report_public_key,
            )?;
            debug!("Verification successful");

            let proof_data_struct = SignupProofData {
                evidence_payload: EvidencePayload {
                    pse_manifest: signup_data.pse_manifest.clone(),
                },
                verification_report: response.verification_report,
                signature: response.signature,
            };
            let proof_data = serde_json::to_string(&proof_data_struct)
                .map_err(|error| SignupError::Fatal(error.to_string()))?;
            (proof_data, report.epid_pseudonym)
        };

        let mut signup_info = SignupInfo::new(
            signup_data.poet_public_key,
            proof_data,
            anti_sybil_id,
            nonce.to_string(),
        );
        // Attached out-of-band; the serde representation skips it
        signup_info.sealed_signup_data = signup_data.sealed_signup_data;
        Ok(signup_info)
    }

    /// Recovers the PoET identity bound inside a sealed blob after a
    /// restart, without re-running attestation. Returns the recovered
    /// PoET public key.
    pub fn unseal_signup_data(
        &self,
        context: &mut SigningContext,
        sealed_signup_data: &[u8],
    ) -> Result<String, PoetError> {
        let unsealed = self.backend.unseal_signup_data(sealed_signup_data)?;
        context.set_identity_key_from_hex(unsealed.poet_private_key.as_str())?;
        Ok(unsealed.poet_public_key)
    }

    /// Invalidates enclave resources tied to a sealed blob. Must be
    /// called before the blob is discarded.
    pub fn release_signup_data(&self, sealed_signup_data: &[u8]) -> Result<(), PoetError> {
        self.backend.release_signup_data(sealed_signup_data)
    }

    /// Persists the sealed blob to the configured file.
    pub fn save_sealed_signup_data(&self, sealed_signup_data: &[u8]) -> Result<(), PoetError> {
        sealed_storage::write_sealed_data(
            self.config.get_sealed_signup_data_file().as_str(),
            sealed_signup_data,
        )
    }

    /// Loads the sealed blob from the configured file; a missing or
    /// malformed file yields a blank blob ("no prior state").
    pub fn load_sealed_signup_data(&self) -> Vec<u8> {
        sealed_storage::read_sealed_data(self.config.get_sealed_signup_data_file().as_str())
    }
}
