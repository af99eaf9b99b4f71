// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{env, path::Path};

// Use the "built" crate to generate some useful build-time information,
// including the git hash and compiler version.
fn main() {
    built::write_built_file_with_opts(
        Some(Path::new(&env::var("CARGO_MANIFEST_DIR").unwrap())),
        &Path::new(&env::var("OUT_DIR").unwrap()).join("built.rs"),
    )
    .expect("Failed to acquire build-time information");
}
