// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP implementation of [`Backend`]

use crate::Backend;
use crate::search::search_query;
use async_trait::async_trait;
use nsx_common::Api;
use nsx_common::Error;
use nsx_common::Resource;
use nsx_common::ResourceType;
use nsx_common::SearchResults;
use nsx_common::TagPredicate;
use serde::Deserialize;
use serde_json::Value;
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

/// Request timeout used when the caller does not pick one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// NSX error code reported when an object is still referenced
const RESOURCE_IN_USE_CODE: u64 = 500030;

/// Connection parameters for an NSX manager
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Address of the manager, with or without an `http(s)://` prefix
    pub host: String,
    pub username: String,
    pub password: String,
    /// Whether Manager API resource types may be used
    pub allow_passthrough: bool,
    /// Skip TLS certificate verification
    pub insecure: bool,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        }
    }
}

#[derive(Deserialize)]
struct ListPage {
    #[serde(default)]
    results: Vec<Resource>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<u64>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct NodeVersion {
    node_version: String,
}

pub struct Client {
    baseurl: String,
    username: String,
    password: String,
    allow_passthrough: bool,
    client: reqwest::Client,
    log: Logger,
}

impl Client {
    pub fn new(config: &ClientConfig, log: &Logger) -> Result<Client, Error> {
        let client = reqwest::ClientBuilder::new()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| {
                Error::Communication(format!("building HTTP client: {e}"))
            })?;
        Ok(Client::new_with_client(config, client, log))
    }

    pub fn new_with_client(
        config: &ClientConfig,
        client: reqwest::Client,
        log: &Logger,
    ) -> Client {
        let baseurl = config.base_url();
        let log = log.new(o!("nsx_manager" => baseurl.clone()));
        Client {
            baseurl,
            username: config.username.clone(),
            password: config.password.clone(),
            allow_passthrough: config.allow_passthrough,
            client,
            log,
        }
    }

    pub fn baseurl(&self) -> &str {
        &self.baseurl
    }

    fn check_api(&self, kind: ResourceType) -> Result<(), Error> {
        if kind.api() == Api::Manager && !self.allow_passthrough {
            return Err(Error::PassthroughDisabled(kind));
        }
        Ok(())
    }

    fn collection_url(
        &self,
        kind: ResourceType,
        parents: &[&str],
    ) -> Result<String, Error> {
        self.check_api(kind)?;
        let expected = kind.parent_count();
        if parents.len() != expected {
            return Err(Error::WrongParentCount {
                kind,
                expected,
                got: parents.len(),
            });
        }

        let mut path = String::new();
        let mut parents = parents.iter();
        for (i, piece) in kind.collection_template().split("{}").enumerate() {
            if i > 0 {
                if let Some(parent) = parents.next() {
                    path.push_str(&progenitor_support::encode_path(parent));
                }
            }
            path.push_str(piece);
        }
        Ok(format!("{}{}/{}", self.baseurl, kind.api().root(), path))
    }

    fn object_url(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
    ) -> Result<String, Error> {
        Ok(format!(
            "{}/{}",
            self.collection_url(kind, parents)?,
            progenitor_support::encode_path(id)
        ))
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, Error> {
        let request = request
            .basic_auth(&self.username, Some(&self.password))
            .build()
            .map_err(|e| Error::Communication(e.to_string()))?;
        debug!(self.log, "client request";
            "method" => %request.method(),
            "uri" => %request.url(),
        );
        let result = self.client.execute(request).await;
        debug!(self.log, "client response";
            "result" => ?result.as_ref().map(|r| r.status()),
        );
        result.map_err(|e| Error::Communication(e.to_string()))
    }

    async fn send(
        &self,
        kind: ResourceType,
        id: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, Error> {
        let response = self.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(kind, id, status.as_u16(), &body))
    }

    async fn get_pages(
        &self,
        kind: ResourceType,
        id: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<Resource>, Error> {
        let mut resources = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut request = self.client.get(url).query(query);
            if let Some(cursor) = &cursor {
                request = request.query(&[("cursor", cursor)]);
            }
            let page: ListPage = self
                .send(kind, id, request)
                .await?
                .json()
                .await
                .map_err(|e| Error::InvalidResponse(e.to_string()))?;
            let empty = page.results.is_empty();
            resources.extend(page.results);
            match page.cursor {
                Some(next)
                    if !empty
                        && !next.is_empty()
                        && Some(&next) != cursor.as_ref() =>
                {
                    cursor = Some(next);
                }
                _ => break,
            }
        }
        Ok(resources)
    }
}

/// Translate an unsuccessful response into an [`Error`].
fn error_from_response(
    kind: ResourceType,
    id: &str,
    status: u16,
    body: &str,
) -> Error {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let error_code = parsed.as_ref().and_then(|b| b.error_code);
    let message = parsed
        .and_then(|b| b.error_message)
        .unwrap_or_else(|| body.to_string());
    match status {
        404 => Error::not_found(kind, id),
        401 | 403 => Error::Unauthenticated(message),
        400 | 409 if error_code == Some(RESOURCE_IN_USE_CODE) => {
            Error::InUse { kind, id: id.to_string(), message }
        }
        _ => Error::Manager { kind, status: Some(status), error_code, message },
    }
}

#[async_trait]
impl Backend for Client {
    fn allows_passthrough(&self) -> bool {
        self.allow_passthrough
    }

    async fn version(&self) -> Result<String, Error> {
        let url = format!("{}/api/v1/node/version", self.baseurl);
        let response = self.execute(self.client.get(url)).await?;
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::Unauthenticated(format!(
                "version query returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(Error::Communication(format!(
                "version query returned {status}"
            )));
        }
        let version: NodeVersion = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        Ok(version.node_version)
    }

    async fn list(
        &self,
        kind: ResourceType,
        parents: &[&str],
    ) -> Result<Vec<Resource>, Error> {
        let url = self.collection_url(kind, parents)?;
        let mut resources =
            self.get_pages(kind, &parents.join("/"), &url, &[]).await?;
        if kind.shares_collection() {
            resources.retain(|r| {
                r.resource_type.as_deref() == Some(kind.backend_type())
            });
        }
        Ok(resources)
    }

    async fn get(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
    ) -> Result<Resource, Error> {
        let url = self.object_url(kind, parents, id)?;
        self.send(kind, id, self.client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    async fn delete(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
    ) -> Result<(), Error> {
        let url = self.object_url(kind, parents, id)?;
        let mut request = self.client.delete(url);
        if kind == ResourceType::LogicalPort {
            request = request.query(&[("detach", "true")]);
        }
        self.send(kind, id, request).await?;
        Ok(())
    }

    async fn patch(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
        body: &Value,
    ) -> Result<(), Error> {
        let url = self.object_url(kind, parents, id)?;
        match kind.api() {
            Api::Policy => {
                self.send(kind, id, self.client.patch(url).json(body)).await?;
            }
            Api::Manager => {
                // The Manager API only takes whole objects (including the
                // current `_revision`), so merge into what is there now.
                let mut current: Value = self
                    .send(kind, id, self.client.get(&url))
                    .await?
                    .json()
                    .await
                    .map_err(|e| Error::InvalidResponse(e.to_string()))?;
                merge_fields(&mut current, body);
                self.send(kind, id, self.client.put(url).json(&current))
                    .await?;
            }
        }
        Ok(())
    }

    async fn search_by_tags(
        &self,
        kind: ResourceType,
        tags: &[TagPredicate],
    ) -> Result<SearchResults, Error> {
        self.check_api(kind)?;
        let url =
            format!("{}{}/search/query", self.baseurl, kind.api().root());
        let query = search_query(kind, tags);
        let results =
            self.get_pages(kind, "", &url, &[("query", query.as_str())]).await?;
        Ok(SearchResults {
            result_count: Some(results.len() as u64),
            results,
            cursor: None,
        })
    }
}

fn merge_fields(current: &mut Value, changes: &Value) {
    let (Some(current), Some(changes)) =
        (current.as_object_mut(), changes.as_object())
    else {
        return;
    };
    for (key, value) in changes {
        if value.is_null() {
            current.remove(key);
        } else {
            current.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use httptest::Expectation;
    use httptest::Server;
    use httptest::matchers::*;
    use httptest::responders::*;
    use serde_json::json;

    fn test_client(server: &Server, allow_passthrough: bool) -> Client {
        let log = Logger::root(slog::Discard, o!());
        let config = ClientConfig {
            host: format!("http://{}", server.addr()),
            username: String::from("admin"),
            password: String::from("secret"),
            allow_passthrough,
            insecure: false,
            timeout: Duration::from_secs(5),
        };
        Client::new(&config, &log).unwrap()
    }

    fn tagged(id: &str, resource_type: &str) -> Value {
        json!({
            "id": id,
            "resource_type": resource_type,
            "tags": [{ "scope": "os-api-version", "tag": "19.0.0" }],
        })
    }

    #[test]
    fn test_base_url() {
        let mut config = ClientConfig {
            host: String::from("10.0.0.5"),
            username: String::new(),
            password: String::new(),
            allow_passthrough: true,
            insecure: true,
            timeout: DEFAULT_TIMEOUT,
        };
        assert_eq!(config.base_url(), "https://10.0.0.5");
        config.host = String::from("http://nsx.local:8080/");
        assert_eq!(config.base_url(), "http://nsx.local:8080");
    }

    #[tokio::test]
    async fn test_list_follows_cursor() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/policy/api/v1/infra/segments"),
                request::query(url_decoded(not(contains(key("cursor"))))),
            ])
            .respond_with(json_encoded(json!({
                "results": [tagged("s1", "Segment")],
                "cursor": "00001",
            }))),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/policy/api/v1/infra/segments"),
                request::query(url_decoded(contains(("cursor", "00001")))),
            ])
            .respond_with(json_encoded(json!({
                "results": [tagged("s2", "Segment")],
            }))),
        );

        let client = test_client(&server, true);
        let segments =
            client.list(ResourceType::Segment, &[]).await.unwrap();
        let ids: Vec<_> = segments.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_list_shared_collection_filters_by_type() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/policy/api/v1/infra/lb-app-profiles",
            ))
            .respond_with(json_encoded(json!({
                "results": [
                    tagged("http", "LBHttpProfile"),
                    tagged("tcp", "LBFastTcpProfile"),
                ],
            }))),
        );

        let client = test_client(&server, true);
        let profiles =
            client.list(ResourceType::LbFastTcpProfile, &[]).await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].id, "tcp");
    }

    #[tokio::test]
    async fn test_nested_paths() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "DELETE",
                "/policy/api/v1/infra/segments/seg-1/ports/p1/\
                 port-qos-profile-binding-maps/default",
            ))
            .respond_with(status_code(200)),
        );
        let client = test_client(&server, true);
        client
            .delete(
                ResourceType::SegmentPortQosBinding,
                &["seg-1", "p1"],
                "default",
            )
            .await
            .unwrap();

        let error = client
            .delete(ResourceType::SegmentPort, &[], "p1")
            .await
            .unwrap_err();
        assert_matches!(
            error,
            Error::WrongParentCount { expected: 1, got: 0, .. }
        );
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "DELETE",
                "/policy/api/v1/infra/tier-1s/gone",
            ))
            .respond_with(status_code(404)),
        );
        server.expect(
            Expectation::matching(request::method_path(
                "DELETE",
                "/policy/api/v1/infra/domains/default/groups/shared",
            ))
            .respond_with(status_code(400).body(
                json!({
                    "error_code": 500030,
                    "error_message": "Group is referenced by a rule",
                })
                .to_string(),
            )),
        );
        server.expect(
            Expectation::matching(request::method_path(
                "DELETE",
                "/policy/api/v1/infra/qos-profiles/q1",
            ))
            .respond_with(status_code(500).body("internal error")),
        );

        let client = test_client(&server, true);
        let error =
            client.delete(ResourceType::Tier1, &[], "gone").await.unwrap_err();
        assert!(error.is_not_found());

        let error = client
            .delete(ResourceType::Group, &["default"], "shared")
            .await
            .unwrap_err();
        assert_matches!(error, Error::InUse { ref message, .. } => {
            assert_eq!(message, "Group is referenced by a rule");
        });

        let error = client
            .delete(ResourceType::QosProfile, &[], "q1")
            .await
            .unwrap_err();
        assert_matches!(
            error,
            Error::Manager { status: Some(500), error_code: None, .. }
        );
        assert!(error.retryable());
    }

    #[tokio::test]
    async fn test_passthrough_disabled() {
        let server = Server::run();
        let client = test_client(&server, false);
        assert!(!client.allows_passthrough());
        let error = client
            .list(ResourceType::DhcpServer, &[])
            .await
            .unwrap_err();
        assert_eq!(error, Error::PassthroughDisabled(ResourceType::DhcpServer));
        let error = client
            .search_by_tags(
                ResourceType::LogicalPort,
                &[TagPredicate::exact("os-neutron-net-id", "n1")],
            )
            .await
            .unwrap_err();
        assert!(matches!(error, Error::PassthroughDisabled(_)));
    }

    #[tokio::test]
    async fn test_search_and_manager_patch() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/api/v1/search/query"),
                request::query(url_decoded(contains((
                    "query",
                    "resource_type:LogicalPort AND \
                     tags.scope:os\\-neutron\\-net\\-id AND tags.tag:n1"
                )))),
            ])
            .respond_with(json_encoded(json!({
                "results": [tagged("lp1", "LogicalPort")],
                "result_count": 1,
            }))),
        );
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/api/v1/logical-ports/lp1",
            ))
            .respond_with(json_encoded(json!({
                "id": "lp1",
                "_revision": 3,
                "attachment": { "attachment_type": "DHCP_SERVICE" },
            }))),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", "/api/v1/logical-ports/lp1"),
                request::body(json_decoded(eq(json!({
                    "id": "lp1",
                    "_revision": 3,
                })))),
            ])
            .respond_with(status_code(200)),
        );

        let client = test_client(&server, true);
        let found = client
            .search_by_tags(
                ResourceType::LogicalPort,
                &[TagPredicate::exact("os-neutron-net-id", "n1")],
            )
            .await
            .unwrap();
        assert_eq!(found.results.len(), 1);
        assert_eq!(found.result_count, Some(1));

        client
            .patch(
                ResourceType::LogicalPort,
                &[],
                "lp1",
                &json!({ "attachment": null }),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_version() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/api/v1/node/version",
            ))
            .respond_with(json_encoded(json!({
                "node_version": "4.1.2.0.0.22589037",
            }))),
        );
        let client = test_client(&server, true);
        assert_eq!(client.version().await.unwrap(), "4.1.2.0.0.22589037");
    }

    #[tokio::test]
    async fn test_version_bad_credentials() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/api/v1/node/version",
            ))
            .respond_with(status_code(403)),
        );
        let client = test_client(&server, true);
        assert_matches!(
            client.version().await,
            Err(Error::Unauthenticated(_))
        );
    }
}
