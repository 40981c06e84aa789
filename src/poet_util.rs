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
use crypto::digest::Digest;
use crypto::sha2::Sha256;
use openssl::{
    hash::MessageDigest,
    pkey::{PKey, Public},
    sign::Verifier,
};
use std::fs::File;
use std::io::Read;

pub fn to_hex_string(bytes: &[u8]) -> String {
    let strs: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    strs.join("")
}

pub fn from_hex_string(hex: &str) -> Result<Vec<u8>, PoetError> {
    if hex.len() % 2 != 0 {
        return Err(PoetError::ValueError(format!(
            "Odd-length hex string: {}",
            hex.len()
        )));
    }
    (0..hex.len())
        .step_by(2)
        .map(|index| {
            u8::from_str_radix(&hex[index..index + 2], 16).map_err(|error| {
                PoetError::ValueError(format!("Invalid hex encoding: {}", error))
            })
        })
        .collect()
}

/// Returns SHA256 of input &str in hex
pub fn sha256_from_str(input_value: &str) -> String {
    let mut sha256_calculator = Sha256::new();
    sha256_calculator.input_str(input_value);
    sha256_calculator.result_str()
}

/// Reads the given file as string
pub fn read_file_as_string(filename: &str) -> Result<String, PoetError> {
    let mut file_handler = File::open(filename)?;
    let mut read_contents = String::new();
    file_handler.read_to_string(&mut read_contents)?;
    Ok(read_contents)
}

/// Reads binary file and returns vector of u8
pub fn read_binary_file(filename: &str) -> Result<Vec<u8>, PoetError> {
    let mut file = File::open(filename)?;
    let mut buffer = vec![];
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Function to verify signature of a message, accepts message, signature and public key as input.
/// Checks if message digest is signed using private key associated with the public key supplied
/// as input.
///
/// Note: SHA256 algorithm is used to find message digest. This is used for the RSA signature
/// over attestation verification reports.
pub fn verify_message_signature(
    pub_key: &PKey<Public>,
    message: &[u8],
    signature: &[u8],
) -> Result<bool, PoetError> {
    let mut verifier = Verifier::new(MessageDigest::sha256(), pub_key)?;
    verifier.update(message)?;
    Ok(verifier.verify(signature)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::{rsa::Rsa, sign::Signer};

    #[test]
    fn test_sha256_from_str() {
        let sha256_of_validator_tp = "6a437209808cff53912c184ab0d3742d47c601c32367e8c34dbe34e9b923e147";
        let sha256_calculated = sha256_from_str("validator_registry");
        assert_eq!(sha256_of_validator_tp, sha256_calculated)
    }

    #[test]
    fn test_to_hex_string() {
        let dummy_string = "This is dummy string";
        let dummy_string_in_hex = "546869732069732064756d6d7920737472696e67";
        let what_is_returned_from_fun = to_hex_string(dummy_string.as_bytes());
        assert_eq!(dummy_string_in_hex, what_is_returned_from_fun);
    }

    #[test]
    fn test_hex_round_trip() {
        let bytes = vec![0u8, 1, 171, 255];
        let decoded = from_hex_string(to_hex_string(&bytes).as_str()).unwrap();
        assert_eq!(bytes, decoded);
    }

    #[test]
    fn test_invalid_hex_is_value_error() {
        match from_hex_string("zz") {
            Err(PoetError::ValueError(_)) => (),
            _ => panic!("expected ValueError"),
        }
        match from_hex_string("abc") {
            Err(PoetError::ValueError(_)) => (),
            _ => panic!("expected ValueError"),
        }
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        match read_file_as_string("non_existing_path/non_existing_file") {
            Err(PoetError::Io(_)) => (),
            _ => panic!("expected Io error"),
        }
    }

    #[test]
    fn test_verify_message_signature() {
        let rsa = Rsa::generate(2048).unwrap();
        let private_key = PKey::from_rsa(rsa).unwrap();
        let public_key =
            PKey::public_key_from_pem(&private_key.public_key_to_pem().unwrap()).unwrap();

        let message = b"attestation verification report";
        let mut signer = Signer::new(MessageDigest::sha256(), &private_key).unwrap();
        signer.update(message).unwrap();
        let signature = signer.sign_to_vec().unwrap();

        assert!(verify_message_signature(&public_key, message, &signature).unwrap());
        assert!(!verify_message_signature(&public_key, b"tampered", &signature).unwrap_or(false));
    }
}
