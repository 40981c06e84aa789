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

use std::error::Error;
use std::fmt;
use std::io;

/// Errors raised by the PoET consensus core.
///
/// ```ValueError``` covers malformed or incomplete serialized documents,
/// invalid signature encodings and invalid parameters. ```Environment```
/// covers unrecoverable platform/attestation failures such as a revoked
/// EPID group; these must stop enrollment rather than be retried.
/// ```Transient``` covers TLS/timeout/HTTP failures contacting the
/// attestation service. ```Io``` covers sealed-storage access problems,
/// which callers treat as "no prior state".
#[derive(Debug, Clone, PartialEq)]
pub enum PoetError {
    ValueError(String),
    Environment(String),
    Transient(String),
    Io(String),
}

impl fmt::Display for PoetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PoetError::ValueError(ref msg) => write!(f, "Value error: {}", msg),
            PoetError::Environment(ref msg) => write!(f, "Environment error: {}", msg),
            PoetError::Transient(ref msg) => write!(f, "Transient error: {}", msg),
            PoetError::Io(ref msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl Error for PoetError {}

impl From<io::Error> for PoetError {
    fn from(error: io::Error) -> Self {
        PoetError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for PoetError {
    // serde names the offending field ("missing field `Duration`"), keep
    // that text intact for diagnosis
    fn from(error: serde_json::Error) -> Self {
        PoetError::ValueError(error.to_string())
    }
}

impl From<openssl::error::ErrorStack> for PoetError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        PoetError::ValueError(error.to_string())
    }
}

impl From<base64::DecodeError> for PoetError {
    fn from(error: base64::DecodeError) -> Self {
        PoetError::ValueError(format!("Invalid base64 encoding: {}", error))
    }
}

/// Outcome classification for enrollment. A retryable failure (for
/// example IAS was unreachable) may be attempted again later; a fatal
/// failure (for example the EPID group has been revoked) must not be.
#[derive(Debug, Clone, PartialEq)]
pub enum SignupError {
    Retryable(String),
    Fatal(String),
}

impl fmt::Display for SignupError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SignupError::Retryable(ref msg) => write!(f, "Retryable signup failure: {}", msg),
            SignupError::Fatal(ref msg) => write!(f, "Fatal signup failure: {}", msg),
        }
    }
}

impl Error for SignupError {}

impl From<PoetError> for SignupError {
    fn from(error: PoetError) -> Self {
        match error {
            PoetError::Environment(msg) => SignupError::Fatal(msg),
            PoetError::ValueError(msg) => SignupError::Fatal(msg),
            PoetError::Transient(msg) => SignupError::Retryable(msg),
            PoetError::Io(msg) => SignupError::Retryable(msg),
        }
    }
}
