use std::env;
use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

const SCHEMA_FILE: &str = "rpc.schema";

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let schema_path = manifest_dir.join(SCHEMA_FILE);
    println!("cargo:rerun-if-changed={SCHEMA_FILE}");

    let schema = fs::read_to_string(&schema_path)
        .unwrap_or_else(|e| panic!("failed to read {schema_path:?}: {e}"));

    // Comments and layout are not part of the interface; names and types are.
    let mut normalized = String::new();
    for line in schema.lines() {
        let line = line.split('#').next().unwrap_or_default();
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        normalized.push_str(&words.join(" "));
        normalized.push('\n');
    }

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest_hex = hex::encode(hasher.finalize());

    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::write(
        out_path.join("fingerprint.rs"),
        format!("pub const INTERFACE_FINGERPRINT: &str = \"{digest_hex}\";\n"),
    )
    .expect("Couldn't write fingerprint.rs");
}
