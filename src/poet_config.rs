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
use crate::poet_util::read_file_as_string;

/// Structure to read PoET configuration from toml file
#[derive(Debug, Deserialize, Clone)]
pub struct PoetConfig {
    // Service provider ID registered with the attestation service, dummy
    // values are accepted when running in simulator mode
    spid: String,
    ias_url: String,
    // PKCS12 client certificate presented to the attestation service
    spid_cert_file: String,
    password: String,
    // PEM file holding the well-known attestation report signing key
    ias_report_key_file: String,
    // File backing the sealed signup data across restarts
    sealed_signup_data_file: String,
}

impl PoetConfig {
    pub fn new(
        spid: String,
        ias_url: String,
        spid_cert_file: String,
        password: String,
        ias_report_key_file: String,
        sealed_signup_data_file: String,
    ) -> Self {
        PoetConfig {
            spid,
            ias_url,
            spid_cert_file,
            password,
            ias_report_key_file,
            sealed_signup_data_file,
        }
    }

    /// Reads the configuration toml file from given path
    pub fn load_from_file(config_file: &str) -> Result<Self, PoetError> {
        let config_contents = read_file_as_string(config_file)?;
        toml::from_str(config_contents.as_str())
            .map_err(|error| PoetError::ValueError(format!("Invalid config file: {}", error)))
    }

    /// Getters for the members
    pub fn get_spid(&self) -> String {
        self.spid.clone()
    }

    pub fn get_ias_url(&self) -> String {
        self.ias_url.clone()
    }

    pub fn get_spid_cert_file(&self) -> String {
        self.spid_cert_file.clone()
    }

    pub fn get_password(&self) -> String {
        self.password.clone()
    }

    pub fn get_ias_report_key_file(&self) -> String {
        self.ias_report_key_file.clone()
    }

    pub fn get_sealed_signup_data_file(&self) -> String {
        self.sealed_signup_data_file.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMMY_CONFIG: &str = r#"
        spid = "simulator-spid"
        ias_url = "https://dummy.ias"
        spid_cert_file = "/etc/sawtooth/ias_client.pfx"
        password = ""
        ias_report_key_file = "/etc/sawtooth/ias_report_key.pem"
        sealed_signup_data_file = "/var/lib/sawtooth/poet_sealed.dat"
    "#;

    #[test]
    fn test_config_deserialization() {
        let config: PoetConfig = toml::from_str(DUMMY_CONFIG).expect("Error parsing config");
        assert_eq!(config.get_spid(), "simulator-spid");
        assert_eq!(config.get_ias_url(), "https://dummy.ias");
        assert_eq!(config.get_spid_cert_file(), "/etc/sawtooth/ias_client.pfx");
        assert_eq!(config.get_password(), "");
        assert_eq!(
            config.get_ias_report_key_file(),
            "/etc/sawtooth/ias_report_key.pem"
        );
        assert_eq!(
            config.get_sealed_signup_data_file(),
            "/var/lib/sawtooth/poet_sealed.dat"
        );
    }

    #[test]
    fn test_incomplete_config_is_rejected() {
        match PoetConfig::load_from_file("non_existing_path/poet.toml") {
            Err(PoetError::Io(_)) => (),
            _ => panic!("expected Io error"),
        }
        let missing_fields = toml::from_str::<PoetConfig>("spid = \"only-spid\"");
        assert!(missing_fields.is_err());
    }
}
