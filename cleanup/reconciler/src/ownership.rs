// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deciding which backend objects belong to the orchestrator

use nsx_cleanup_db::AuthorityIndex;
use nsx_cleanup_db::AuthorityModel;
use nsx_common::Resource;
use nsx_common::TagPredicate;

/// How a backend object is matched against the orchestrator's database
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Narrowing {
    /// The object's id is a row id of `model`.
    Id(AuthorityModel),
    /// The first `len` characters of the object's id are a row id of
    /// `model`.  Groups derived from security group rules are named this
    /// way.
    IdPrefix(AuthorityModel, usize),
    /// The object's `attachment.id` is a row id of `model`.
    AttachmentId(AuthorityModel),
}

/// Length of the UUID that prefixes ids derived from orchestrator rows
pub const UUID_LEN: usize = 36;

impl Narrowing {
    fn matches(&self, authority: &dyn AuthorityIndex, r: &Resource) -> bool {
        match self {
            Narrowing::Id(model) => authority.contains(*model, &r.id),
            Narrowing::IdPrefix(model, len) => r
                .id
                .get(..*len)
                .is_some_and(|prefix| authority.contains(*model, prefix)),
            Narrowing::AttachmentId(model) => r
                .attachment_id()
                .is_some_and(|id| authority.contains(*model, id)),
        }
    }
}

/// Returns the objects in `resources` that the orchestrator owns
///
/// An object is owned if one of its tags matches `marker`.  When an
/// `authority` is given, an owned object is kept only if at least one of the
/// `narrowing` rules finds it in the orchestrator's database.  Types with no
/// corresponding table pass an empty `narrowing` and are judged by their tags
/// alone.
pub fn filter_owned(
    resources: Vec<Resource>,
    marker: &TagPredicate,
    authority: Option<&dyn AuthorityIndex>,
    narrowing: &[Narrowing],
) -> Vec<Resource> {
    resources
        .into_iter()
        .filter(|r| r.has_tag(marker))
        .filter(|r| match authority {
            Some(authority) if !narrowing.is_empty() => {
                narrowing.iter().any(|n| n.matches(authority, r))
            }
            _ => true,
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use nsx_cleanup_db::LocalAuthority;
    use nsx_common::OS_API_VERSION_SCOPE;
    use nsx_common::Tag;
    use serde_json::json;

    fn marker() -> TagPredicate {
        TagPredicate::scope(OS_API_VERSION_SCOPE)
    }

    fn tagged(id: &str) -> Resource {
        Resource::new(id).with_tag(Tag::new(OS_API_VERSION_SCOPE, "19.0.0"))
    }

    fn ids(resources: &[Resource]) -> Vec<&str> {
        resources.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_tags_only() {
        let resources = vec![
            tagged("a"),
            Resource::new("b"),
            Resource::new("c").with_tag(Tag::new("os-project-id", "p1")),
            tagged("d"),
        ];
        let owned = filter_owned(resources, &marker(), None, &[]);
        assert_eq!(ids(&owned), ["a", "d"]);
    }

    #[test]
    fn test_narrowed_by_authority() {
        let authority = LocalAuthority::from_ids([
            (AuthorityModel::Networks, vec!["a", "b"]),
            (AuthorityModel::SecurityGroupRules, vec![
                "0b6e7a52-3bb6-4d4e-9a7b-27a3c1f0a001",
            ]),
        ]);
        let resources = vec![
            tagged("a"),
            // known, but not tagged
            Resource::new("b"),
            // tagged, but unknown
            tagged("c"),
        ];
        let owned = filter_owned(
            resources,
            &marker(),
            Some(&authority),
            &[Narrowing::Id(AuthorityModel::Networks)],
        );
        assert_eq!(ids(&owned), ["a"]);

        let rule_group = "0b6e7a52-3bb6-4d4e-9a7b-27a3c1f0a001-ingress";
        let owned = filter_owned(
            vec![tagged(rule_group), tagged("short")],
            &marker(),
            Some(&authority),
            &[
                Narrowing::Id(AuthorityModel::SecurityGroups),
                Narrowing::IdPrefix(
                    AuthorityModel::SecurityGroupRules,
                    UUID_LEN,
                ),
            ],
        );
        assert_eq!(ids(&owned), [rule_group]);
    }

    #[test]
    fn test_narrowed_by_attachment() {
        let authority = LocalAuthority::from_ids([(
            AuthorityModel::DhcpServiceBindings,
            vec!["dhcp-1"],
        )]);
        let attached = |id: &str, server: &str| {
            tagged(id).with_field(
                "attachment",
                json!({ "attachment_type": "DHCP_SERVICE", "id": server }),
            )
        };
        let owned = filter_owned(
            vec![
                attached("p1", "dhcp-1"),
                attached("p2", "dhcp-2"),
                tagged("p3"),
            ],
            &marker(),
            Some(&authority),
            &[Narrowing::AttachmentId(AuthorityModel::DhcpServiceBindings)],
        );
        assert_eq!(ids(&owned), ["p1"]);
    }

    #[test]
    fn test_no_table_means_tags_only() {
        let authority = LocalAuthority::default();
        let owned = filter_owned(
            vec![tagged("lb-1")],
            &marker(),
            Some(&authority),
            &[],
        );
        assert_eq!(ids(&owned), ["lb-1"]);
    }
}
