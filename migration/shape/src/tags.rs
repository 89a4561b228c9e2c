// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Copying an object's tags to its recreated counterpart
//!
//! Tags are dropped by [`Transformer::prepare()`](crate::Transformer) because
//! the destination does not accept them at creation time.  They are applied
//! afterwards, one request per tag, since the destination has no bulk
//! tagging call.

use crate::ResourceKind;
use async_trait::async_trait;
use serde_json::Value;
use slog::Logger;
use slog::debug;
use slog::warn;
use std::fmt;

/// Somewhere tags can be added to objects, one at a time
#[async_trait]
pub trait TagEndpoint: Send + Sync {
    type Error: fmt::Display + Send;

    async fn add_tag(
        &self,
        collection: &str,
        id: &str,
        tag: &str,
    ) -> Result<(), Self::Error>;
}

#[async_trait]
impl TagEndpoint for neutron_client::Client {
    type Error = neutron_client::Error;

    async fn add_tag(
        &self,
        collection: &str,
        id: &str,
        tag: &str,
    ) -> Result<(), Self::Error> {
        neutron_client::Client::add_tag(self, collection, id, tag).await
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TagReplayError {
    #[error("{0} objects cannot be tagged on the destination")]
    Unsupported(ResourceKind),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TagFailure {
    pub tag: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TagReplayReport {
    pub applied: Vec<String>,
    pub failures: Vec<TagFailure>,
}

/// The string tags of a source object, as found in its `tags` field
pub fn tags_of(raw: &Value) -> Vec<String> {
    raw.get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter().filter_map(Value::as_str).map(str::to_string).collect()
        })
        .unwrap_or_default()
}

/// Apply each of `tags` to the destination object `id` of type `kind`
///
/// A tag that cannot be applied is recorded in the report and the remaining
/// tags are still attempted.
pub async fn replay_tags<E>(
    endpoint: &E,
    kind: ResourceKind,
    id: &str,
    tags: &[String],
    log: &Logger,
) -> Result<TagReplayReport, TagReplayError>
where
    E: TagEndpoint + ?Sized,
{
    let collection =
        kind.tag_collection().ok_or(TagReplayError::Unsupported(kind))?;
    let mut report = TagReplayReport::default();
    for tag in tags {
        match endpoint.add_tag(collection, id, tag).await {
            Ok(()) => {
                debug!(log, "replayed tag";
                    "kind" => %kind,
                    "id" => id,
                    "tag" => tag,
                );
                report.applied.push(tag.clone());
            }
            Err(error) => {
                warn!(log, "failed to replay tag";
                    "kind" => %kind,
                    "id" => id,
                    "tag" => tag,
                    "error" => %error,
                );
                report.failures.push(TagFailure {
                    tag: tag.clone(),
                    message: error.to_string(),
                });
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod test {
    use super::*;
    use httptest::Expectation;
    use httptest::Server;
    use httptest::matchers::*;
    use httptest::responders::*;
    use serde_json::json;
    use slog::o;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEndpoint {
        calls: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl TagEndpoint for RecordingEndpoint {
        type Error = String;

        async fn add_tag(
            &self,
            collection: &str,
            id: &str,
            tag: &str,
        ) -> Result<(), String> {
            self.calls.lock().unwrap().push((
                collection.to_string(),
                id.to_string(),
                tag.to_string(),
            ));
            if tag == "bad tag" {
                return Err(String::from("invalid tag"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_replay_continues_after_failure() {
        let log = Logger::root(slog::Discard, o!());
        let endpoint = RecordingEndpoint::default();
        let raw = json!({ "id": "n1", "tags": ["red", "bad tag", "blue"] });
        let tags = tags_of(&raw);

        let report =
            replay_tags(&endpoint, ResourceKind::Network, "n1", &tags, &log)
                .await
                .unwrap();
        assert_eq!(report.applied, ["red", "blue"]);
        assert_eq!(
            report.failures,
            [TagFailure {
                tag: String::from("bad tag"),
                message: String::from("invalid tag"),
            }]
        );
        let calls = endpoint.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|(c, id, _)| c == "networks" && id == "n1"));
    }

    #[tokio::test]
    async fn test_unsupported_kind() {
        let log = Logger::root(slog::Discard, o!());
        let endpoint = RecordingEndpoint::default();
        let error = replay_tags(
            &endpoint,
            ResourceKind::LoadbalancerPool,
            "pool-1",
            &[String::from("x")],
            &log,
        )
        .await
        .unwrap_err();
        assert_eq!(
            error,
            TagReplayError::Unsupported(ResourceKind::LoadbalancerPool)
        );
        assert!(endpoint.calls.lock().unwrap().is_empty());
        assert!(tags_of(&json!({ "id": "no-tags" })).is_empty());
    }

    #[tokio::test]
    async fn test_replay_through_neutron() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "PUT",
                "/v2.0/qos/policies/q1/tags/gold",
            ))
            .respond_with(status_code(201)),
        );
        let log = Logger::root(slog::Discard, o!());
        let client = neutron_client::Client::new(
            &format!("http://{}", server.addr()),
            None,
            &log,
        )
        .unwrap();
        let report = replay_tags(
            &client,
            ResourceKind::QosPolicy,
            "q1",
            &[String::from("gold")],
            &log,
        )
        .await
        .unwrap();
        assert_eq!(report.applied, ["gold"]);
        assert!(report.failures.is_empty());
    }
}
