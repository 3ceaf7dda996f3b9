//! Shared test utilities for the CLI end-to-end tests.
//!
//! Every test seeds a channel working tree with small repodata snapshots
//! and runs the binary with `--use-cache`, so no test touches the network.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let temp = TempDir::new().unwrap();
//!     fixtures::seed(&temp, "main", "linux-64", "repodata-clone.json", fixtures::main_linux64());
//!     // ... run the binary against temp
//! }
//! ```

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::fixtures;
}

/// Canned repodata snapshots and seeding helpers.
#[allow(dead_code)]
pub mod fixtures {
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use serde_json::{json, Value};

    /// Write a JSON document into the channel/subdir layout.
    pub fn seed(temp: &TempDir, channel: &str, subdir: &str, file_name: &str, document: Value) {
        let text = serde_json::to_string_pretty(&document).unwrap();
        temp.child(format!("{channel}/{subdir}/{file_name}"))
            .write_str(&text)
            .unwrap();
    }

    /// A small `main` channel linux-64 snapshot exercising revocations,
    /// runtime bounds, and the blas mutex rules.
    pub fn main_linux64() -> Value {
        json!({
            "info": {"subdir": "linux-64"},
            "packages": {
                "numpy-1.11.3-py36_2.tar.bz2": {
                    "name": "numpy",
                    "version": "1.11.3",
                    "build": "py36_2",
                    "build_number": 2,
                    "depends": ["numpy-base 1.11.3 py36_2", "python >=3.6,<3.7.0a0"],
                    "md5": "0f4b8c9a",
                    "size": 4200
                },
                "numexpr-2.6.8-py36_0.tar.bz2": {
                    "name": "numexpr",
                    "version": "2.6.8",
                    "build": "py36_0",
                    "build_number": 0,
                    "depends": ["mkl >=2019.0", "numpy >=1.11.3", "python >=3.6,<3.7.0a0"],
                    "md5": "77aa9e2b",
                    "size": 130000
                },
                "scipy-1.1.0-py36hd20e5f9_0.tar.bz2": {
                    "name": "scipy",
                    "version": "1.1.0",
                    "build": "py36hd20e5f9_0",
                    "build_number": 0,
                    "depends": [
                        "libgcc-ng 7.2.0.*",
                        "libgfortran-ng 7.2.0.*",
                        "numpy >=1.11.3",
                        "python >=3.6,<3.7.0a0"
                    ],
                    "md5": "aa51239d",
                    "size": 18000000
                },
                "tzdata-2023c-0.tar.bz2": {
                    "name": "tzdata",
                    "version": "2023c",
                    "build": "0",
                    "build_number": 0,
                    "depends": [],
                    "md5": "3c8ef1de",
                    "size": 115000
                }
            }
        })
    }

    /// A small `r` channel linux-64 snapshot with a `.conda` artifact.
    pub fn r_linux64() -> Value {
        json!({
            "info": {"subdir": "linux-64"},
            "packages": {
                "r-base-3.4.3-h2b45cf7_0.tar.bz2": {
                    "name": "r-base",
                    "version": "3.4.3",
                    "build": "h2b45cf7_0",
                    "build_number": 0,
                    "depends": ["libgcc-ng >=7.2.0"],
                    "md5": "931d2a29"
                },
                "r-jsonlite-1.5-r343h96ca727_0.tar.bz2": {
                    "name": "r-jsonlite",
                    "version": "1.5",
                    "build": "r343h96ca727_0",
                    "build_number": 0,
                    "depends": ["r-base"],
                    "md5": "8ab2e5f1"
                }
            },
            "packages.conda": {
                "r-curl-4.3.2-r343hcc429a5_0.conda": {
                    "name": "r-curl",
                    "version": "4.3.2",
                    "build": "r343hcc429a5_0",
                    "build_number": 0,
                    "depends": ["r-base 3.4.3"],
                    "md5": "54d8e41c"
                }
            }
        })
    }

    /// A `main` snapshot for the numpy2 pass: one capped build, one open.
    pub fn numpy2_linux64() -> Value {
        json!({
            "info": {"subdir": "linux-64"},
            "packages": {
                "foo-1.2.0-py39h06a4308_0.tar.bz2": {
                    "name": "foo",
                    "version": "1.2.0",
                    "build": "py39h06a4308_0",
                    "build_number": 0,
                    "depends": ["numpy >=1.21.5", "python >=3.9,<3.10.0a0"]
                },
                "bar-0.5.0-py39h06a4308_0.tar.bz2": {
                    "name": "bar",
                    "version": "0.5.0",
                    "build": "py39h06a4308_0",
                    "build_number": 0,
                    "depends": ["numpy >=1.21.5,<2.0a0", "python >=3.9,<3.10.0a0"]
                }
            }
        })
    }

    /// Live-style patch instructions matching [`main_linux64`].
    pub fn main_linux64_instructions() -> Value {
        json!({
            "patch_instructions_version": 1,
            "packages": {
                "numexpr-2.6.8-py36_0.tar.bz2": {
                    "depends": [
                        "mkl >=2019.0",
                        "numpy >=1.11.3",
                        "python >=3.6,<3.7.0a0",
                        "blas * mkl"
                    ]
                },
                "tzdata-2023c-0.tar.bz2": {
                    "depends": []
                }
            },
            "revoke": ["numpy-1.11.3-py36_2.tar.bz2"],
            "remove": ["ghost-0.1-0.tar.bz2"]
        })
    }
}
