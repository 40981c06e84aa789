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
use crate::poet_util::sha256_from_str;
use crate::signing_context::SigningContext;
use crate::wait_timer::{WaitTimer, IDENTIFIER_LENGTH, NULL_IDENTIFIER};

/// The finalized, peer-verifiable claim that a validator's wait elapsed,
/// entitling it to publish a block. Extends the wait timer's committed
/// fields with the candidate block hash; the timer's ephemeral signature
/// is discarded and the certificate is signed with the validator's
/// persistent identity key.
///
/// Canonical key order is lexicographic, enforced by field order here;
/// the signature is detached. Immutable once signed; broadcast with the
/// block and retained as long as the block is.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WaitCertificate {
    #[serde(rename = "BlockHash")]
    pub block_hash: String,
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

impl WaitCertificate {
    /// Finalizes an expired (or genesis) wait timer into a certificate
    /// for ```block_hash```.
    ///
    /// Fails with ```ValueError``` when the timer's signature does not
    /// verify under the wait-timer key, when a non-genesis timer has not
    /// expired, or when a non-genesis timer has outlived its post-expiry
    /// usage window.
    pub fn create(
        context: &SigningContext,
        timer: &WaitTimer,
        block_hash: &str,
    ) -> Result<WaitCertificate, PoetError> {
        let serialized_timer = timer.serialize()?;
        if !SigningContext::verify(
            serialized_timer.as_bytes(),
            timer.signature.as_str(),
            context.wait_timer_public_key()?.as_str(),
        )? {
            return Err(PoetError::ValueError(
                "Wait timer signature does not match".to_string(),
            ));
        }

        let is_not_genesis = timer.previous_certificate_id != NULL_IDENTIFIER;
        if is_not_genesis && !timer.is_expired() {
            return Err(PoetError::ValueError(
                "Cannot create wait certificate because timer has not expired".to_string(),
            ));
        }
        if is_not_genesis && timer.has_timed_out() {
            return Err(PoetError::ValueError(
                "Cannot create wait certificate because timer has timed out".to_string(),
            ));
        }

        let mut wait_certificate = WaitCertificate {
            block_hash: block_hash.to_string(),
            duration: timer.duration,
            local_mean: timer.local_mean,
            previous_certificate_id: timer.previous_certificate_id.clone(),
            request_time: timer.request_time,
            validator_address: timer.validator_address.clone(),
            signature: String::new(),
        };
        wait_certificate.signature =
            context.sign_certificate(wait_certificate.serialize()?.as_bytes())?;
        info!(
            "Created wait certificate {} for block hash {}",
            wait_certificate.identifier(),
            block_hash
        );
        Ok(wait_certificate)
    }

    /// Identifier chaining certificates into a sequence mirroring the
    /// block chain. A pure function of the signature: the null sentinel
    /// for an unsigned certificate, otherwise the leading 16 hex
    /// characters of SHA256(signature).
    pub fn identifier(&self) -> String {
        if self.signature.is_empty() {
            return NULL_IDENTIFIER.to_string();
        }
        sha256_from_str(self.signature.as_str())[..IDENTIFIER_LENGTH].to_string()
    }

    /// Canonical serialization, signature excluded.
    pub fn serialize(&self) -> Result<String, PoetError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Checks the detached signature over the canonical serialization
    /// against the claimant's PoET public key. An invalid signature is
    /// an error, not a soft boolean: callers must treat it as rejection
    /// of the claim.
    pub fn verify(&self, poet_public_key: &str) -> Result<(), PoetError> {
        let serialized = self.serialize()?;
        if !SigningContext::verify(
            serialized.as_bytes(),
            self.signature.as_str(),
            poet_public_key,
        )? {
            return Err(PoetError::ValueError(
                "Wait certificate signature does not match".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses a received canonical document. All fields are mandatory; a
    /// missing one is a ```ValueError``` naming it. The claimant's public
    /// key is unknown at this point, so the caller must follow up with
    /// ```verify```.
    pub fn deserialize(serialized: &str, signature: &str) -> Result<WaitCertificate, PoetError> {
        let mut wait_certificate: WaitCertificate = serde_json::from_str(serialized)?;
        wait_certificate.signature = signature.to_string();
        Ok(wait_certificate)
    }
}
