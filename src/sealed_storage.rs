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

use crate::enclave::SEALED_SIGNUP_DATA_LENGTH;
use crate::error::PoetError;
use crate::poet_util::read_binary_file;
use std::fs;
use std::path::Path;

/// Returns true when the blob holds no sealed state.
pub fn is_blank(blob: &[u8]) -> bool {
    blob.iter().all(|&byte| byte == 0)
}

/// Reads the sealed signup data blob from disk. An unreadable file is
/// treated as "no prior state" and a blob whose size does not match the
/// expected sealed-data length is discarded; both cases return a
/// zero-filled buffer of the correct length rather than attempting
/// migration.
pub fn read_sealed_data(path: &str) -> Vec<u8> {
    match read_binary_file(path) {
        Ok(blob) => {
            if blob.len() == SEALED_SIGNUP_DATA_LENGTH {
                blob
            } else {
                warn!(
                    "Sealed data at {} has length {}, expected {}; reinitializing",
                    path,
                    blob.len(),
                    SEALED_SIGNUP_DATA_LENGTH
                );
                vec![0u8; SEALED_SIGNUP_DATA_LENGTH]
            }
        }
        Err(_) => {
            info!("No sealed data at {}; starting blank", path);
            vec![0u8; SEALED_SIGNUP_DATA_LENGTH]
        }
    }
}

/// Writes the sealed signup data blob atomically: the blob is written to
/// a temporary file next to the target and renamed over it.
pub fn write_sealed_data(path: &str, blob: &[u8]) -> Result<(), PoetError> {
    if blob.len() != SEALED_SIGNUP_DATA_LENGTH {
        return Err(PoetError::ValueError(format!(
            "Sealed data has length {}, expected {}",
            blob.len(),
            SEALED_SIGNUP_DATA_LENGTH
        )));
    }
    let temp_path = format!("{}.new", path);
    fs::write(Path::new(&temp_path), blob)?;
    fs::rename(Path::new(&temp_path), Path::new(path))?;
    Ok(())
}
