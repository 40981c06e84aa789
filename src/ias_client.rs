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

use crate::client_utils::{get_client, read_body_as_string, read_response_future};
use crate::error::PoetError;
use hyper::{header, header::HeaderValue, Body, Method, Request, Uri};
use std::{collections::HashMap, str, time::Duration};

/// Structure for storing IAS connection information
#[derive(Debug, Clone)]
pub struct IasClient {
    // IAS URL to connect to
    ias_url: String,
    // Client certificate in PKCS12 format
    spid_cert: Vec<u8>,
    // Password for PKCS12 format file
    password: String,
    // Timeout for the client requests in seconds
    timeout: Duration,
}

/// Attestation verification response: the AVR body together with the
/// detached report signature taken from the response header.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationResponse {
    pub verification_report: String,
    pub signature: String,
}

const SIGRL_LINK: &str = "/attestation/sgx/v2/sigrl";
const AVR_LINK: &str = "/attestation/sgx/v2/report";
const IAS_REPORT_SIGNATURE: &str = "x-iasreport-signature";
const ISV_ENCLAVE_QUOTE: &str = "isvEnclaveQuote";
const PSE_MANIFEST: &str = "pseManifest";
const NONCE: &str = "nonce";
// timeout constants
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_TIMEOUT_NANO_SECS: u32 = 0;

impl IasClient {
    /// default constructor for IasClient, remember to use setters later
    pub fn default() -> Self {
        IasClient {
            ias_url: String::new(),
            spid_cert: vec![],
            password: String::new(),
            timeout: Duration::new(DEFAULT_TIMEOUT_SECS, DEFAULT_TIMEOUT_NANO_SECS),
        }
    }

    /// constructor for IasClient
    pub fn new(url: String, cert: Vec<u8>, passwd: String, time: Option<u64>) -> Self {
        IasClient {
            ias_url: url,
            spid_cert: cert,
            password: passwd,
            timeout: Duration::new(
                time.unwrap_or(DEFAULT_TIMEOUT_SECS),
                DEFAULT_TIMEOUT_NANO_SECS,
            ),
        }
    }

    /// Setters for IasClient structure
    pub fn set_ias_url(&mut self, url: String) {
        self.ias_url = url;
    }

    pub fn set_spid_cert(&mut self, cert: Vec<u8>) {
        self.spid_cert = cert;
    }

    pub fn set_password(&mut self, passwd: String) {
        self.password = passwd;
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Get request to receive the signature revocation list for the input
    /// EPID group id. Accepts optional 'gid' and optional 'api_path' for
    /// the case of a proxy which appends the gid itself.
    ///
    /// return: the SigRL response body.
    pub fn get_signature_revocation_list(
        &self,
        gid: Option<&str>,
        api_path: Option<&str>,
    ) -> Result<String, PoetError> {
        let mut final_path = String::new();
        final_path.push_str(self.ias_url.as_str());
        final_path.push_str(api_path.unwrap_or(SIGRL_LINK));
        if let Some(gid_present) = gid {
            final_path.push_str("/");
            final_path.push_str(gid_present);
        }
        let url = final_path
            .parse::<Uri>()
            .map_err(|error| PoetError::ValueError(format!("Invalid SigRL URI: {}", error)))?;
        debug!("Fetching SigRL from: {}", url);

        let client = get_client(&self.spid_cert, self.password.as_str())?;
        let response = read_response_future(client.get(url))?;
        read_body_as_string(response.body)
    }

    /// Post request to send the Attestation Evidence Payload and receive
    /// the Attestation Verification Report. Accepts quote and optional
    /// pse_manifest, nonce as input.
    ///
    /// return: An AttestationResponse holding the AVR body (JSON) and
    ///     the base64-encoded RSA-SHA256 report signature read from the
    ///     response header.
    pub fn post_verify_attestation(
        &self,
        quote: &[u8],
        manifest: Option<&str>,
        nonce: Option<&str>,
    ) -> Result<AttestationResponse, PoetError> {
        let mut final_path = String::new();
        final_path.push_str(self.ias_url.as_str());
        final_path.push_str(AVR_LINK);
        let url = final_path
            .parse::<Uri>()
            .map_err(|error| PoetError::ValueError(format!("Invalid AVR URI: {}", error)))?;
        debug!("Posting attestation verification request to: {}", url);

        // Construct AEP, the request parameter. A HashMap instead of a
        // structure so that absent optional keys stay out of the json.
        let mut request_aep: HashMap<String, String> = HashMap::new();
        request_aep.insert(
            String::from(ISV_ENCLAVE_QUOTE),
            str::from_utf8(quote)
                .map_err(|error| {
                    PoetError::ValueError(format!("Quote is not valid UTF-8: {}", error))
                })?
                .to_owned(),
        );
        if let Some(manifest_present) = manifest {
            request_aep.insert(String::from(PSE_MANIFEST), manifest_present.to_owned());
        }
        if let Some(nonce_present) = nonce {
            request_aep.insert(String::from(NONCE), nonce_present.to_string());
        }

        let mut req = Request::new(Body::from(serde_json::to_string(&request_aep)?));
        *req.method_mut() = Method::POST;
        *req.uri_mut() = url.clone();
        req.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let client = get_client(&self.spid_cert, self.password.as_str())?;
        let response = read_response_future(client.request(req))?;
        let signature = response
            .header_map
            .get(IAS_REPORT_SIGNATURE)
            .ok_or_else(|| {
                PoetError::ValueError("Response has no report signature header".to_string())
            })?
            .to_str()
            .map_err(|error| {
                PoetError::ValueError(format!("Report signature header is not a string: {}", error))
            })?
            .to_string();
        let verification_report = read_body_as_string(response.body)?;
        Ok(AttestationResponse {
            verification_report,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_DURATION: u64 = 300;
    const DUMMY_DURATION: u64 = 0;
    const DUMMY_URL: &str = "dummy.url";
    const DUMMY_PASSWORD: &str = "dummy password";
    lazy_static! {
        static ref DUMMY_CERT: Vec<u8> = vec![1, 2, 3, 4];
    }

    #[test]
    fn test_default_ias_client_creation() {
        let default_client = IasClient::default();
        assert_eq!(default_client.ias_url, "");
        assert_eq!(default_client.spid_cert.len(), 0);
        assert_eq!(default_client.timeout.as_secs(), DEFAULT_DURATION);
    }

    #[test]
    fn test_new_ias_client_creation() {
        let new_ias_client = IasClient::new(
            DUMMY_URL.to_string(),
            DUMMY_CERT.to_vec(),
            DUMMY_PASSWORD.to_string(),
            Option::from(DUMMY_DURATION),
        );
        assert_eq!(new_ias_client.ias_url, DUMMY_URL);
        assert_eq!(new_ias_client.spid_cert.len(), DUMMY_CERT.len());
        assert_eq!(new_ias_client.timeout.as_secs(), DUMMY_DURATION);
    }

    #[test]
    fn test_new_ias_client_with_assignment() {
        let mut default_client = IasClient::default();
        default_client.set_ias_url(DUMMY_URL.to_string());
        default_client.set_spid_cert(DUMMY_CERT.to_vec());
        default_client.set_password(DUMMY_PASSWORD.to_string());
        default_client.set_timeout(Duration::new(DUMMY_DURATION, 0));
        assert_eq!(default_client.ias_url, DUMMY_URL);
        assert_eq!(default_client.spid_cert.len(), DUMMY_CERT.len());
        assert_eq!(default_client.password, DUMMY_PASSWORD);
        assert_eq!(default_client.timeout.as_secs(), DUMMY_DURATION);
    }
    // Reading from response / body, reading of headers are covered in
    // client_utils.rs tests
}
