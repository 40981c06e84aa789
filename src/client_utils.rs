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

extern crate hyper_proxy;
extern crate hyper_tls;
extern crate native_tls;

use self::hyper_proxy::{Intercept, Proxy, ProxyConnector};
use self::hyper_tls::HttpsConnector;
use self::native_tls::{Identity, TlsConnector};
use crate::error::PoetError;
use futures::{future, future::Future, stream::Stream};
use hyper::{
    client::{HttpConnector, ResponseFuture},
    header::HeaderMap,
    Body, Client, Error, StatusCode, Uri,
};
use std::env;
use tokio::runtime::current_thread::Runtime;

/// ```read_response_future()``` returns a ClientResponse holding the
/// ```hyper::Body``` and the response ```HeaderMap```.
#[derive(Debug)]
pub struct ClientResponse {
    pub body: Body,
    pub header_map: HeaderMap,
}

/// Function to get a http and https compatible client to connect to the
/// attestation service.
///
/// Accepts the PKCS12 client certificate as byte array. Returns a
/// ```hyper::Client``` that can connect to a URI with either http or
/// https prefix, honoring the ```http_proxy``` environment variable.
pub fn get_client(
    der_cert: &[u8],
    password: &str,
) -> Result<Client<ProxyConnector<HttpsConnector<HttpConnector>>, Body>, PoetError> {
    let identity = Identity::from_pkcs12(der_cert, password)
        .map_err(|error| PoetError::ValueError(format!("Invalid client certificate: {}", error)))?;
    let tls_connector = TlsConnector::builder()
        .identity(identity)
        .build()
        .map_err(|error| PoetError::Transient(format!("Unable to build TLS connector: {}", error)))?;

    let mut http = HttpConnector::new(1);
    // do not enforce http only URI, the TlsConnector covers https
    http.enforce_http(false);
    let https = HttpsConnector::from((http, tls_connector.clone()));
    let mut proxy_connector = ProxyConnector::new(https.clone())
        .map_err(|error| PoetError::Transient(format!("Error constructing client: {}", error)))?;
    if let Ok(http_proxy) = env::var("http_proxy") {
        let read_proxy = http_proxy
            .parse::<Uri>()
            .map_err(|error| PoetError::ValueError(format!("Invalid proxy setting: {}", error)))?;
        let proxy = Proxy::new(Intercept::All, read_proxy);
        proxy_connector = ProxyConnector::from_proxy(https, proxy)
            .map_err(|error| PoetError::Transient(format!("Error constructing client: {}", error)))?;
        debug!("Using proxy");
    }
    proxy_connector.set_tls(Some(tls_connector));
    Ok(Client::builder().build::<_, Body>(proxy_connector))
}

/// Drives a ```hyper::client::ResponseFuture``` to completion on a
/// current-thread runtime. Blocking from the caller's point of view;
/// there is no cancellation primitive for an in-flight call.
///
/// A response status >= 400 and any transport failure are both
/// ```Transient``` errors.
pub fn read_response_future(response_fut: ResponseFuture) -> Result<ClientResponse, PoetError> {
    let future_response = response_fut.then(move |response_obj| match response_obj {
        Ok(response) => {
            debug!("Received response result code: {}", response.status());
            if response.status() >= StatusCode::BAD_REQUEST {
                return Err(PoetError::Transient(format!(
                    "Response status is not successful: {}",
                    response.status()
                )));
            }
            let header_map = response.headers().to_owned();
            let body = response.into_body();
            Ok(ClientResponse { body, header_map })
        }
        Err(error) => Err(PoetError::Transient(format!(
            "Error occurred while waiting for the response: {}",
            error
        ))),
    });

    let mut runner = Runtime::new()
        .map_err(|error| PoetError::Transient(format!("Error creating runtime: {}", error)))?;
    runner.block_on(future_response)
}

/// Streams a ```hyper::Body``` and collects it into a String.
pub fn read_body_as_string(body: Body) -> Result<String, PoetError> {
    body.fold(Vec::new(), |mut vector, chunk| {
        vector.extend_from_slice(&chunk[..]);
        future::ok::<_, Error>(vector)
    })
    .then(move |body_as_byte_vector| match body_as_byte_vector {
        Ok(byte_vector) => String::from_utf8(byte_vector).map_err(|error| {
            PoetError::ValueError(format!("Response body is not UTF-8: {}", error))
        }),
        Err(error) => Err(PoetError::Transient(format!(
            "Error reading body as string: {}",
            error
        ))),
    })
    .wait()
}
