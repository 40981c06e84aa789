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

extern crate base64;
extern crate crypto;
extern crate futures;
extern crate hyper;
extern crate openssl;
extern crate rand;
extern crate serde;
#[cfg(test)]
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate tokio;
extern crate toml;

pub mod avr;
pub mod client_utils;
pub mod enclave;
pub mod error;
pub mod ias_client;
pub mod poet_config;
pub mod poet_util;
pub mod sealed_storage;
pub mod sig_rl;
pub mod signing_context;
pub mod signup;
pub mod wait_certificate;
pub mod wait_timer;
