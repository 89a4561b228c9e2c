// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading ids from a JSON snapshot exported ahead of time
//!
//! The snapshot is an object keyed by model name:
//!
//! ```json
//! { "networks": ["3b0a..."], "routers": [] }
//! ```
//!
//! Models absent from the file are treated as having no ids.

use crate::AuthorityModel;
use crate::AuthoritySource;
use crate::LocalAuthority;
use anyhow::Context;
use async_trait::async_trait;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use std::collections::BTreeSet;

pub struct SnapshotSource {
    path: Utf8PathBuf,
    contents: LocalAuthority,
}

impl SnapshotSource {
    pub fn from_file(path: &Utf8Path) -> Result<SnapshotSource, anyhow::Error> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read {path:?}"))?;
        let contents: LocalAuthority = serde_json::from_str(&text)
            .with_context(|| format!("parse {path:?}"))?;
        Ok(SnapshotSource { path: path.to_owned(), contents })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

#[async_trait]
impl AuthoritySource for SnapshotSource {
    async fn get_ids(
        &self,
        model: AuthorityModel,
    ) -> Result<BTreeSet<String>, anyhow::Error> {
        Ok(self.contents.ids(model).clone())
    }
}
