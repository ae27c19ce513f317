//! Build script for evebrain-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Bakes board identity from the environment

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

fn main() {
    setup_linker();
    board_identity();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Factory access point name and hardware generation
///
/// `EVEBRAIN_AP_NAME` defaults to "Evebrain-RP2040"; `EVEBRAIN_HW_VERSION`
/// (1, 2 or 3) defaults to 3.
fn board_identity() {
    println!("cargo:rerun-if-env-changed=EVEBRAIN_AP_NAME");
    println!("cargo:rerun-if-env-changed=EVEBRAIN_HW_VERSION");

    let ap_name = env::var("EVEBRAIN_AP_NAME").unwrap_or_else(|_| "Evebrain-RP2040".into());
    if ap_name.is_empty() || ap_name.len() > 32 {
        panic!("EVEBRAIN_AP_NAME must be 1-32 bytes, got {:?}", ap_name);
    }
    println!("cargo:rustc-env=EVEBRAIN_AP_NAME={}", ap_name);

    let hw = env::var("EVEBRAIN_HW_VERSION").unwrap_or_else(|_| "3".into());
    if !matches!(hw.as_str(), "1" | "2" | "3") {
        panic!("EVEBRAIN_HW_VERSION must be 1, 2 or 3, got {:?}", hw);
    }
    if hw != "3" {
        println!("cargo:warning=Building for hardware generation {}", hw);
    }
    println!("cargo:rustc-env=EVEBRAIN_HW_VERSION={}", hw);
}
