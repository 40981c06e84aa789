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
use std::str;
use std::sync::Mutex;

/// Fixed length of the sealed signup data blob. On-disk blobs of any
/// other length are discarded and reinitialized (see sealed_storage).
pub const SEALED_SIGNUP_DATA_LENGTH: usize = 1024;

const SIMULATOR_EPID_GROUP: &str = "00000000";
const SIMULATOR_PSE_MANIFEST: &str = "Do you believe in manifest destiny?";

/// Signup material produced by the enclave, bound to the originator's
/// public key hash. The sealed blob is local-only.
#[derive(Debug, Clone, PartialEq)]
pub struct EnclaveSignupData {
    pub poet_public_key: String,
    pub pse_manifest: String,
    pub enclave_quote: String,
    pub sealed_signup_data: Vec<u8>,
}

/// Key material recovered from a sealed blob.
pub struct UnsealedSignupData {
    pub poet_public_key: String,
    pub(crate) poet_private_key: String,
}

#[derive(Serialize, Deserialize)]
struct SealedPayload {
    poet_public_key: String,
    poet_private_key: String,
}

/// Capability interface over the trusted execution environment. An SGX
/// hardware backend and the simulator share this seam; the backend is
/// selected once at startup by configuration.
pub trait EnclaveBackend {
    /// Produces signup data bound to the originator's public key hash.
    /// The context's identity key pair is regenerated for the new
    /// enrollment.
    fn create_signup_data(
        &self,
        context: &mut SigningContext,
        originator_public_key_hash: &str,
    ) -> Result<EnclaveSignupData, PoetError>;

    /// Recovers the PoET key pair bound inside an opaque sealed blob.
    fn unseal_signup_data(&self, sealed: &[u8]) -> Result<UnsealedSignupData, PoetError>;

    /// Invalidates enclave-held resources tied to a sealed blob. Must be
    /// called before discarding the blob.
    fn release_signup_data(&self, sealed: &[u8]) -> Result<(), PoetError>;

    fn get_epid_group(&self) -> Result<String, PoetError>;

    fn set_signature_revocation_list(&self, sig_rl: &str) -> Result<(), PoetError>;

    fn is_simulator(&self) -> bool;
}

/// Enclave backend for running without trusted hardware. Mirrors the
/// shape of the SGX flow: the quote commits to
/// SHA256(OPK_HASH + PPK) and sealing is a reversible local encoding of
/// the key pair. None of it is attestable; signup built on this backend
/// carries placeholder proof data.
pub struct SimulatedEnclave {
    sig_rl: Mutex<String>,
    sealed_handles: Mutex<Vec<Vec<u8>>>,
}

impl SimulatedEnclave {
    pub fn new() -> Self {
        SimulatedEnclave {
            sig_rl: Mutex::new(String::new()),
            sealed_handles: Mutex::new(vec![]),
        }
    }

    fn seal(payload: &SealedPayload) -> Result<Vec<u8>, PoetError> {
        let serialized = serde_json::to_string(payload)?;
        let mut sealed = base64::encode(serialized.as_bytes()).into_bytes();
        if sealed.len() > SEALED_SIGNUP_DATA_LENGTH {
            return Err(PoetError::ValueError(format!(
                "Sealed payload exceeds fixed length: {}",
                sealed.len()
            )));
        }
        sealed.resize(SEALED_SIGNUP_DATA_LENGTH, 0);
        Ok(sealed)
    }

    fn unseal(sealed: &[u8]) -> Result<SealedPayload, PoetError> {
        // zero padding is not part of the base64 payload
        let end = sealed
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or_else(|| sealed.len());
        if end == 0 {
            return Err(PoetError::ValueError(
                "Sealed signup data is blank".to_string(),
            ));
        }
        let encoded = str::from_utf8(&sealed[..end]).map_err(|error| {
            PoetError::ValueError(format!("Sealed signup data is not UTF-8: {}", error))
        })?;
        let serialized = base64::decode(encoded)?;
        let payload: SealedPayload = serde_json::from_slice(&serialized)?;
        Ok(payload)
    }
}

impl EnclaveBackend for SimulatedEnclave {
    fn create_signup_data(
        &self,
        context: &mut SigningContext,
        originator_public_key_hash: &str,
    ) -> Result<EnclaveSignupData, PoetError> {
        context.regenerate_identity_key()?;
        let poet_public_key = context.identity_public_key()?;
        let poet_private_key = context.identity_private_key_hex()?;

        let sealed_signup_data = SimulatedEnclave::seal(&SealedPayload {
            poet_public_key: poet_public_key.clone(),
            poet_private_key,
        })?;
        self.sealed_handles
            .lock()
            .expect("sealed handle lock poisoned")
            .push(sealed_signup_data.clone());

        // The quote commits to the originator and the new PoET key, the
        // same binding the hardware report data carries
        let report_data = format!(
            "{}{}",
            originator_public_key_hash.to_uppercase(),
            poet_public_key.to_uppercase()
        );
        let quote = serde_json::json!({
            "report_body": sha256_from_str(report_data.as_str())
        });
        let enclave_quote = base64::encode(serde_json::to_string(&quote)?.as_bytes());
        let pse_manifest = base64::encode(SIMULATOR_PSE_MANIFEST.as_bytes());

        info!("Created simulated signup data");
        Ok(EnclaveSignupData {
            poet_public_key,
            pse_manifest,
            enclave_quote,
            sealed_signup_data,
        })
    }

    fn unseal_signup_data(&self, sealed: &[u8]) -> Result<UnsealedSignupData, PoetError> {
        let payload = SimulatedEnclave::unseal(sealed)?;
        self.sealed_handles
            .lock()
            .expect("sealed handle lock poisoned")
            .push(sealed.to_vec());
        Ok(UnsealedSignupData {
            poet_public_key: payload.poet_public_key,
            poet_private_key: payload.poet_private_key,
        })
    }

    fn release_signup_data(&self, sealed: &[u8]) -> Result<(), PoetError> {
        let mut handles = self
            .sealed_handles
            .lock()
            .expect("sealed handle lock poisoned");
        match handles.iter().position(|handle| handle == sealed) {
            Some(index) => {
                handles.remove(index);
                Ok(())
            }
            None => {
                warn!("Releasing sealed signup data that is not held");
                Ok(())
            }
        }
    }

    fn get_epid_group(&self) -> Result<String, PoetError> {
        Ok(SIMULATOR_EPID_GROUP.to_string())
    }

    fn set_signature_revocation_list(&self, sig_rl: &str) -> Result<(), PoetError> {
        *self.sig_rl.lock().expect("sig_rl lock poisoned") = sig_rl.to_string();
        debug!("Signature revocation list has been updated");
        Ok(())
    }

    fn is_simulator(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPK_HASH: &str = "2f77668a9dfbf8d5848b9eeb4a7145ca94c6ed9236e4a773f6dcafa5132b2f91";

    #[test]
    fn test_signup_data_has_fixed_length_sealed_blob() {
        let enclave = SimulatedEnclave::new();
        let mut context = SigningContext::new().unwrap();
        let signup_data = enclave.create_signup_data(&mut context, OPK_HASH).unwrap();
        assert_eq!(signup_data.sealed_signup_data.len(), SEALED_SIGNUP_DATA_LENGTH);
        assert_eq!(signup_data.poet_public_key, context.identity_public_key().unwrap());
    }

    #[test]
    fn test_unseal_recovers_poet_public_key() {
        let enclave = SimulatedEnclave::new();
        let mut context = SigningContext::new().unwrap();
        let signup_data = enclave.create_signup_data(&mut context, OPK_HASH).unwrap();
        let unsealed = enclave
            .unseal_signup_data(&signup_data.sealed_signup_data)
            .unwrap();
        assert_eq!(unsealed.poet_public_key, signup_data.poet_public_key);
    }

    #[test]
    fn test_blank_sealed_data_is_rejected() {
        let enclave = SimulatedEnclave::new();
        let blank = vec![0u8; SEALED_SIGNUP_DATA_LENGTH];
        match enclave.unseal_signup_data(&blank) {
            Err(PoetError::ValueError(_)) => (),
            _ => panic!("expected ValueError"),
        }
    }

    #[test]
    fn test_release_signup_data() {
        let enclave = SimulatedEnclave::new();
        let mut context = SigningContext::new().unwrap();
        let signup_data = enclave.create_signup_data(&mut context, OPK_HASH).unwrap();
        enclave
            .release_signup_data(&signup_data.sealed_signup_data)
            .unwrap();
        // releasing again is not fatal
        enclave
            .release_signup_data(&signup_data.sealed_signup_data)
            .unwrap();
    }

    #[test]
    fn test_quote_commits_to_originator_and_key() {
        let enclave = SimulatedEnclave::new();
        let mut context = SigningContext::new().unwrap();
        let signup_data = enclave.create_signup_data(&mut context, OPK_HASH).unwrap();
        let decoded = base64::decode(signup_data.enclave_quote.as_str()).unwrap();
        let quote: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        let expected = sha256_from_str(
            format!(
                "{}{}",
                OPK_HASH.to_uppercase(),
                signup_data.poet_public_key.to_uppercase()
            )
            .as_str(),
        );
        assert_eq!(quote["report_body"], serde_json::json!(expected));
    }
}
