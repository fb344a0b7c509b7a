//! Build script that generates package_format_spec.rs from the JSON spec.
//!
//! Keeps the package writer, the reader and any external tooling on the same
//! header layout.

use std::env;
use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=../../shared/package_format.json");

    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let spec_path = Path::new(&manifest_dir)
        .join("..")
        .join("..")
        .join("shared")
        .join("package_format.json");

    let spec: serde_json::Value = match fs::read_to_string(&spec_path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                println!("cargo:warning=Could not parse package_format.json: {e}. Using defaults.");
                serde_json::Value::Null
            }
        },
        Err(e) => {
            println!("cargo:warning=Could not read package_format.json: {e}. Using defaults.");
            serde_json::Value::Null
        }
    };

    let magic_hex = spec["magic_hex"].as_str().unwrap_or("0x4B50544553504D4D");
    let header_size = spec["header_size"].as_u64().unwrap_or(64);
    let magic_offset = spec["offsets"]["magic"].as_u64().unwrap_or(0);
    let format_offset = spec["offsets"]["format"].as_u64().unwrap_or(8);
    let version_offset = spec["offsets"]["version"].as_u64().unwrap_or(16);
    let meta_len_offset = spec["offsets"]["meta_len"].as_u64().unwrap_or(24);
    let sections_len_offset = spec["offsets"]["sections_len"].as_u64().unwrap_or(32);
    let min_format = spec["formats"]["min_supported"].as_u64().unwrap_or(1);
    let current_format = spec["formats"]["current"].as_u64().unwrap_or(2);
    let alignment = spec["payload_alignment"].as_u64().unwrap_or(16);
    let endianness = spec["endianness"].as_str().unwrap_or("little");

    let generated = format!(
        r#"// Auto-generated from shared/package_format.json
// DO NOT EDIT MANUALLY - changes will be overwritten by build.rs

/// Magic bytes identifying a map package file ("MMPSETPK" in ASCII)
pub const PACKAGE_MAGIC: u64 = {magic_hex};

/// Total header size in bytes
pub const PACKAGE_HEADER_SIZE: usize = {header_size};

/// Byte offset of the magic field within the header
pub const PACKAGE_MAGIC_OFFSET: usize = {magic_offset};

/// Byte offset of the format version field within the header
pub const PACKAGE_FORMAT_OFFSET: usize = {format_offset};

/// Byte offset of the data version field within the header
pub const PACKAGE_VERSION_OFFSET: usize = {version_offset};

/// Byte offset of the metadata block length within the header
pub const PACKAGE_META_LEN_OFFSET: usize = {meta_len_offset};

/// Byte offset of the section table length within the header
pub const PACKAGE_SECTIONS_LEN_OFFSET: usize = {sections_len_offset};

/// Oldest package format this build can read
pub const PACKAGE_FORMAT_MIN: u64 = {min_format};

/// Package format written by this build
pub const PACKAGE_FORMAT_CURRENT: u64 = {current_format};

/// Alignment of every block following the header
pub const PACKAGE_BLOCK_ALIGNMENT: usize = {alignment};

/// Endianness of multi-byte fields
pub const PACKAGE_ENDIANNESS: &str = "{endianness}";
"#
    );

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("package_format_spec.rs");
    fs::write(&dest_path, generated).expect("Failed to write generated package_format_spec.rs");
}
