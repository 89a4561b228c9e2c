// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Construction of search API queries

use nsx_common::ResourceType;
use nsx_common::TagPredicate;

// Characters with meaning in the search query language.
const RESERVED: &[char] = &[
    '+', '-', '=', '&', '|', '>', '<', '!', '(', ')', '{', '}', '[', ']', '^',
    '"', '~', '*', '?', ':', '\\', '/', ' ',
];

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Builds the query string for finding objects of `kind` that carry every
/// one of `tags`.
pub fn search_query(kind: ResourceType, tags: &[TagPredicate]) -> String {
    let mut query = format!("resource_type:{}", kind.backend_type());
    for predicate in tags {
        query.push_str(" AND tags.scope:");
        query.push_str(&escape(&predicate.scope));
        if let Some(tag) = &predicate.tag {
            query.push_str(" AND tags.tag:");
            query.push_str(&escape(tag));
        }
    }
    query
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_search_query() {
        assert_eq!(
            search_query(
                ResourceType::Group,
                &[TagPredicate::exact("os-neutron-router-id", "r1")]
            ),
            "resource_type:Group AND tags.scope:os\\-neutron\\-router\\-id \
             AND tags.tag:r1"
        );
        assert_eq!(
            search_query(
                ResourceType::LogicalPort,
                &[TagPredicate::scope("os-api-version")]
            ),
            "resource_type:LogicalPort AND tags.scope:os\\-api\\-version"
        );
    }
}
