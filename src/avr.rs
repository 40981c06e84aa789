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
use crate::poet_util::verify_message_signature;
use openssl::pkey::{PKey, Public};

const QUOTE_STATUS_OK: &str = "OK";
const QUOTE_STATUS_GROUP_OUT_OF_DATE: &str = "GROUP_OUT_OF_DATE";

/// Attestation Verification Report as returned by the attestation
/// service. All fields except ```revocationReason``` are mandatory;
/// deserialization fails naming the first missing field.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub id: String,
    #[serde(rename = "revocationReason")]
    pub revocation_reason: Option<String>,
    #[serde(rename = "isvEnclaveQuoteStatus")]
    pub isv_enclave_quote_status: String,
    #[serde(rename = "isvEnclaveQuoteBody")]
    pub isv_enclave_quote_body: String,
    #[serde(rename = "pseManifestStatus")]
    pub pse_manifest_status: String,
    #[serde(rename = "pseManifestHash")]
    pub pse_manifest_hash: String,
    #[serde(rename = "epidPseudonym")]
    pub epid_pseudonym: String,
    pub nonce: String,
}

fn check_status(status: &str, what: &str) -> Result<(), PoetError> {
    if status.to_uppercase() == QUOTE_STATUS_OK {
        return Ok(());
    }
    // Allow out of date severity issues to pass; the machine likely
    // requires a BIOS update for SGX compliance.
    if status.to_uppercase() == QUOTE_STATUS_GROUP_OUT_OF_DATE {
        warn!("AVR {} is GROUP_OUT_OF_DATE; accepting", what);
        return Ok(());
    }
    error!("AVR {} is bad: {}", what, status);
    Err(PoetError::Environment(format!(
        "AVR {} is {} (i.e., not OK)",
        what, status
    )))
}

/// Function to verify that the attestation verification report is valid.
/// Performs RSA-SHA256 signature verification under the well-known
/// attestation-service report key, then checks the report contents:
/// presence of id, enclave quote status/body, PSE manifest status/hash,
/// EPID pseudonym and nonce, and absence of a revocation reason.
///
/// A failed signature or missing field is a ```ValueError```; a revoked
/// EPID group or a fatal quote/manifest status is an ```Environment```
/// error and must stop enrollment.
pub fn check_verification_report(
    verification_report: &str,
    signature: &str,
    report_public_key: &PKey<Public>,
) -> Result<VerificationReport, PoetError> {
    // First thing is to verify the signature over the verification
    // report. The signature uses RSA-SHA256.
    let decoded_signature = base64::decode(signature)?;
    if !verify_message_signature(
        report_public_key,
        verification_report.as_bytes(),
        &decoded_signature,
    )? {
        error!("Verification report signature does not match");
        return Err(PoetError::ValueError(
            "Verification report signature does not match".to_string(),
        ));
    }

    // Single-pass schema validation; serde reports the missing field by
    // name
    let report: VerificationReport = serde_json::from_str(verification_report)?;

    if let Some(ref reason) = report.revocation_reason {
        error!("AVR indicates the EPID group has been revoked: {}", reason);
        return Err(PoetError::Environment(format!(
            "EPID group has been revoked: {}",
            reason
        )));
    }

    check_status(report.isv_enclave_quote_status.as_str(), "enclave quote status")?;
    check_status(report.pse_manifest_status.as_str(), "PSE manifest status")?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::{hash::MessageDigest, rsa::Rsa, sign::Signer};
    use serde_json::{json, Value};

    fn report_key_pair() -> (PKey<openssl::pkey::Private>, PKey<Public>) {
        let rsa = Rsa::generate(2048).unwrap();
        let private_key = PKey::from_rsa(rsa).unwrap();
        let public_key =
            PKey::public_key_from_pem(&private_key.public_key_to_pem().unwrap()).unwrap();
        (private_key, public_key)
    }

    fn sign_report(report: &str, private_key: &PKey<openssl::pkey::Private>) -> String {
        let mut signer = Signer::new(MessageDigest::sha256(), private_key).unwrap();
        signer.update(report.as_bytes()).unwrap();
        base64::encode(&signer.sign_to_vec().unwrap())
    }

    fn good_report() -> Value {
        json!({
            "id": "avr-0001",
            "isvEnclaveQuoteStatus": "OK",
            "isvEnclaveQuoteBody": "cXVvdGUgYm9keQ==",
            "pseManifestStatus": "OK",
            "pseManifestHash": "bWFuaWZlc3QgaGFzaA==",
            "epidPseudonym": "pseudonym-0001",
            "nonce": "0000000000000000"
        })
    }

    fn check(report: Value) -> Result<VerificationReport, PoetError> {
        let (private_key, public_key) = report_key_pair();
        let serialized = serde_json::to_string(&report).unwrap();
        let signature = sign_report(serialized.as_str(), &private_key);
        check_verification_report(serialized.as_str(), signature.as_str(), &public_key)
    }

    #[test]
    fn test_valid_report_is_accepted() {
        let report = check(good_report()).expect("report should be accepted");
        assert_eq!(report.epid_pseudonym, "pseudonym-0001");
        assert_eq!(report.nonce, "0000000000000000");
    }

    #[test]
    fn test_bad_signature_is_rejected() {
        let (private_key, public_key) = report_key_pair();
        let serialized = serde_json::to_string(&good_report()).unwrap();
        let signature = sign_report("some other report", &private_key);
        match check_verification_report(serialized.as_str(), signature.as_str(), &public_key) {
            Err(PoetError::ValueError(msg)) => assert!(msg.contains("signature")),
            _ => panic!("expected ValueError"),
        }
    }

    #[test]
    fn test_malformed_signature_encoding_is_rejected() {
        let (_, public_key) = report_key_pair();
        let serialized = serde_json::to_string(&good_report()).unwrap();
        match check_verification_report(serialized.as_str(), "%%%", &public_key) {
            Err(PoetError::ValueError(_)) => (),
            _ => panic!("expected ValueError"),
        }
    }

    #[test]
    fn test_revocation_reason_is_fatal() {
        let mut report = good_report();
        report["revocationReason"] = json!("6");
        match check(report) {
            Err(PoetError::Environment(msg)) => assert!(msg.contains("revoked")),
            _ => panic!("expected Environment error"),
        }
    }

    #[test]
    fn test_group_out_of_date_is_accepted() {
        let mut report = good_report();
        report["isvEnclaveQuoteStatus"] = json!("GROUP_OUT_OF_DATE");
        assert!(check(report).is_ok());
        let mut report = good_report();
        report["pseManifestStatus"] = json!("GROUP_OUT_OF_DATE");
        assert!(check(report).is_ok());
    }

    #[test]
    fn test_bad_quote_status_is_fatal() {
        let mut report = good_report();
        report["isvEnclaveQuoteStatus"] = json!("SIGNATURE_INVALID");
        match check(report) {
            Err(PoetError::Environment(_)) => (),
            _ => panic!("expected Environment error"),
        }
    }

    #[test]
    fn test_bad_pse_manifest_status_is_fatal() {
        let mut report = good_report();
        report["pseManifestStatus"] = json!("INVALID");
        match check(report) {
            Err(PoetError::Environment(_)) => (),
            _ => panic!("expected Environment error"),
        }
    }

    #[test]
    fn test_each_missing_field_is_named() {
        for field in &[
            "id",
            "isvEnclaveQuoteStatus",
            "isvEnclaveQuoteBody",
            "pseManifestStatus",
            "pseManifestHash",
            "epidPseudonym",
            "nonce",
        ] {
            let mut report = good_report();
            report.as_object_mut().unwrap().remove(*field);
            match check(report) {
                Err(PoetError::ValueError(msg)) => assert!(
                    msg.contains(field),
                    "error {:?} should name field {}",
                    msg,
                    field
                ),
                _ => panic!("expected ValueError for missing {}", field),
            }
        }
    }
}
