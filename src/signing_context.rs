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
use crate::poet_util::{from_hex_string, to_hex_string};
use crypto::digest::Digest;
use crypto::sha2::Sha256;
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey, EcPoint, PointConversionForm};
use openssl::ecdsa::EcdsaSig;
use openssl::nid::Nid;
use openssl::pkey::{Private, Public};

/// Holds the two ECDSA key pairs backing PoET operations: the long-lived
/// identity key (signs signup data and wait certificates) and the
/// short-lived wait-timer key (signs wait timers only). Constructed once
/// at validator startup and passed by reference into the signup, timer
/// and certificate operations; the underlying key material is not
/// reentrant, callers serialize access.
pub struct SigningContext {
    identity_key: EcKey<Private>,
    wait_timer_key: EcKey<Private>,
}

fn poet_curve() -> Result<EcGroup, PoetError> {
    Ok(EcGroup::from_curve_name(Nid::SECP256K1)?)
}

fn sha256_digest(message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.input(message);
    let mut digest = [0u8; 32];
    hasher.result(&mut digest);
    digest
}

fn generate_key() -> Result<EcKey<Private>, PoetError> {
    Ok(EcKey::generate(poet_curve()?.as_ref())?)
}

fn public_key_hex(key: &EcKey<Private>) -> Result<String, PoetError> {
    let group = poet_curve()?;
    let mut ctx = BigNumContext::new()?;
    let point_bytes =
        key.public_key()
            .to_bytes(group.as_ref(), PointConversionForm::UNCOMPRESSED, &mut ctx)?;
    Ok(to_hex_string(&point_bytes))
}

fn public_key_from_hex(public_key: &str) -> Result<EcKey<Public>, PoetError> {
    let group = poet_curve()?;
    let mut ctx = BigNumContext::new()?;
    let point_bytes = from_hex_string(public_key)?;
    let point = EcPoint::from_bytes(group.as_ref(), &point_bytes, &mut ctx)
        .map_err(|error| PoetError::ValueError(format!("Invalid public key: {}", error)))?;
    Ok(EcKey::from_public_key(group.as_ref(), &point)?)
}

fn sign_with_key(key: &EcKey<Private>, message: &[u8]) -> Result<String, PoetError> {
    let digest = sha256_digest(message);
    let signature = EcdsaSig::sign(&digest, key)?;
    Ok(base64::encode(&signature.to_der()?))
}

impl SigningContext {
    /// Generates fresh identity and wait-timer key pairs.
    pub fn new() -> Result<Self, PoetError> {
        Ok(SigningContext {
            identity_key: generate_key()?,
            wait_timer_key: generate_key()?,
        })
    }

    /// Signs the canonical serialization of a wait timer. The identity
    /// key must never be used for timers.
    pub fn sign_timer(&self, message: &[u8]) -> Result<String, PoetError> {
        sign_with_key(&self.wait_timer_key, message)
    }

    /// Signs wait certificates and signup data with the validator's
    /// persistent PoET identity key.
    pub fn sign_certificate(&self, message: &[u8]) -> Result<String, PoetError> {
        sign_with_key(&self.identity_key, message)
    }

    /// Checks ```signature``` (base64 DER) over the SHA256 digest of
    /// ```message``` under the hex-encoded public key. A mismatched
    /// signature is ```Ok(false)```; a malformed signature or key
    /// encoding is a ```ValueError```.
    pub fn verify(
        message: &[u8],
        signature: &str,
        public_key: &str,
    ) -> Result<bool, PoetError> {
        let decoded_signature = base64::decode(signature)?;
        let ecdsa_signature = EcdsaSig::from_der(&decoded_signature)
            .map_err(|error| PoetError::ValueError(format!("Invalid signature: {}", error)))?;
        let key = public_key_from_hex(public_key)?;
        let digest = sha256_digest(message);
        Ok(ecdsa_signature.verify(&digest, &key)?)
    }

    pub fn identity_public_key(&self) -> Result<String, PoetError> {
        public_key_hex(&self.identity_key)
    }

    pub fn wait_timer_public_key(&self) -> Result<String, PoetError> {
        public_key_hex(&self.wait_timer_key)
    }

    /// Replaces the identity key pair with a newly generated one. Called
    /// at enrollment; the previous PoET identity is discarded.
    pub fn regenerate_identity_key(&mut self) -> Result<(), PoetError> {
        self.identity_key = generate_key()?;
        Ok(())
    }

    /// Installs an identity key recovered from unsealed signup data, so
    /// the validator keeps its PoET identity across restarts without
    /// re-running attestation.
    pub fn set_identity_key_from_hex(&mut self, private_key: &str) -> Result<(), PoetError> {
        let group = poet_curve()?;
        let ctx = BigNumContext::new()?;
        let private_number = BigNum::from_hex_str(private_key)
            .map_err(|error| PoetError::ValueError(format!("Invalid private key: {}", error)))?;
        let mut public_point = EcPoint::new(group.as_ref())?;
        public_point.mul_generator(group.as_ref(), &private_number, &ctx)?;
        self.identity_key =
            EcKey::from_private_components(group.as_ref(), &private_number, &public_point)?;
        Ok(())
    }

    pub(crate) fn identity_private_key_hex(&self) -> Result<String, PoetError> {
        Ok(self.identity_key.private_key().to_hex_str()?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = b"Duration and LocalMean and PreviousCertID";

    #[test]
    fn test_sign_and_verify_with_identity_key() {
        let context = SigningContext::new().unwrap();
        let signature = context.sign_certificate(MESSAGE).unwrap();
        let public_key = context.identity_public_key().unwrap();
        assert!(SigningContext::verify(MESSAGE, &signature, &public_key).unwrap());
    }

    #[test]
    fn test_sign_and_verify_with_wait_timer_key() {
        let context = SigningContext::new().unwrap();
        let signature = context.sign_timer(MESSAGE).unwrap();
        let public_key = context.wait_timer_public_key().unwrap();
        assert!(SigningContext::verify(MESSAGE, &signature, &public_key).unwrap());
    }

    #[test]
    fn test_keys_are_not_interchangeable() {
        let context = SigningContext::new().unwrap();
        let signature = context.sign_timer(MESSAGE).unwrap();
        let identity_key = context.identity_public_key().unwrap();
        assert!(!SigningContext::verify(MESSAGE, &signature, &identity_key).unwrap());
    }

    #[test]
    fn test_tampered_message_does_not_verify() {
        let context = SigningContext::new().unwrap();
        let signature = context.sign_certificate(MESSAGE).unwrap();
        let public_key = context.identity_public_key().unwrap();
        assert!(!SigningContext::verify(b"tampered", &signature, &public_key).unwrap());
    }

    #[test]
    fn test_malformed_signature_encoding_is_value_error() {
        let context = SigningContext::new().unwrap();
        let public_key = context.identity_public_key().unwrap();
        match SigningContext::verify(MESSAGE, "%%% not base64 %%%", &public_key) {
            Err(PoetError::ValueError(_)) => (),
            _ => panic!("expected ValueError"),
        }
        // valid base64 that is not a DER signature
        match SigningContext::verify(MESSAGE, base64::encode(b"junk").as_str(), &public_key) {
            Err(PoetError::ValueError(_)) => (),
            _ => panic!("expected ValueError"),
        }
    }

    #[test]
    fn test_identity_key_round_trip_through_hex() {
        let mut context = SigningContext::new().unwrap();
        let signature = context.sign_certificate(MESSAGE).unwrap();
        let public_key = context.identity_public_key().unwrap();
        let private_key = context.identity_private_key_hex().unwrap();

        context.regenerate_identity_key().unwrap();
        assert_ne!(context.identity_public_key().unwrap(), public_key);

        context.set_identity_key_from_hex(private_key.as_str()).unwrap();
        assert_eq!(context.identity_public_key().unwrap(), public_key);
        assert!(SigningContext::verify(MESSAGE, &signature, &public_key).unwrap());
    }
}
