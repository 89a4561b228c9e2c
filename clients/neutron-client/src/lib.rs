// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface for the destination networking API's tagging endpoint
//!
//! The destination only offers a per-tag endpoint, so replaying an object's
//! tags means one request per tag.

use slog::Logger;
use slog::debug;
use slog::o;
use std::time::Duration;

mod progenitor_support {
    use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

    const PATH_SET: &AsciiSet = &CONTROLS
        .add(b' ')
        .add(b'"')
        .add(b'#')
        .add(b'<')
        .add(b'>')
        .add(b'?')
        .add(b'`')
        .add(b'{')
        .add(b'}')
        .add(b'/');

    pub(crate) fn encode_path(pc: &str) -> String {
        utf8_percent_encode(pc, PATH_SET).to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request to {url} failed: {message}")]
    Communication { url: String, message: String },
    #[error("{url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },
}

pub struct Client {
    baseurl: String,
    token: Option<String>,
    client: reqwest::Client,
    log: Logger,
}

impl Client {
    pub fn new(
        baseurl: &str,
        token: Option<String>,
        log: &Logger,
    ) -> Result<Client, Error> {
        let dur = Duration::from_secs(60);
        let client = reqwest::ClientBuilder::new()
            .connect_timeout(dur)
            .timeout(dur)
            .build()
            .map_err(|e| Error::Communication {
                url: baseurl.to_string(),
                message: e.to_string(),
            })?;
        Ok(Client::new_with_client(baseurl, token, client, log))
    }

    pub fn new_with_client(
        baseurl: &str,
        token: Option<String>,
        client: reqwest::Client,
        log: &Logger,
    ) -> Client {
        let baseurl = baseurl.trim_end_matches('/').to_string();
        let log = log.new(o!("neutron" => baseurl.clone()));
        Client { baseurl, token, client, log }
    }

    pub fn baseurl(&self) -> &str {
        &self.baseurl
    }

    /**
     * add_tag: PUT /v2.0/{collection}/{id}/tags/{tag}
     */
    pub async fn add_tag(
        &self,
        collection: &str,
        id: &str,
        tag: &str,
    ) -> Result<(), Error> {
        let url = format!(
            "{}/v2.0/{}/{}/tags/{}",
            self.baseurl,
            collection,
            progenitor_support::encode_path(id),
            progenitor_support::encode_path(tag),
        );

        let mut request = self.client.put(&url);
        if let Some(token) = &self.token {
            request = request.header("X-Auth-Token", token);
        }
        debug!(self.log, "client request"; "method" => "PUT", "uri" => &url);

        let response = request.send().await.map_err(|e| {
            Error::Communication { url: url.clone(), message: e.to_string() }
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status { url, status: status.as_u16(), body });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use httptest::Expectation;
    use httptest::Server;
    use httptest::matchers::*;
    use httptest::responders::*;

    #[tokio::test]
    async fn test_add_tag() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path(
                    "PUT",
                    "/v2.0/networks/n1/tags/blue%20team"
                ),
                request::headers(contains(key("x-auth-token"))),
            ])
            .respond_with(status_code(201)),
        );
        server.expect(
            Expectation::matching(request::method_path(
                "PUT",
                "/v2.0/networks/missing/tags/x",
            ))
            .respond_with(status_code(404).body("network not found")),
        );

        let log = Logger::root(slog::Discard, o!());
        let client = Client::new(
            &format!("http://{}/", server.addr()),
            Some(String::from("t0ken")),
            &log,
        )
        .unwrap();
        client.add_tag("networks", "n1", "blue team").await.unwrap();

        let error =
            client.add_tag("networks", "missing", "x").await.unwrap_err();
        match error {
            Error::Status { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, "network not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
