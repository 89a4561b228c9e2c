// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utilities for testing the NSX cleanup and migration tooling

pub mod dev;
pub mod fake_backend;

pub use fake_backend::FakeBackend;
