//! Build script for the dynffi test fixture
//!
//! Compiles test/fixtures/fixture.c into a shared library with the host C
//! compiler and exports its path as DYNFFI_FIXTURE_LIB. Tests that need
//! the fixture skip when the variable is missing.

use std::env;
use std::path::{Path, PathBuf};

const FIXTURE_SOURCE: &str = "test/fixtures/fixture.c";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed={}", FIXTURE_SOURCE);

    let Some(out_dir) = env::var_os("OUT_DIR").map(PathBuf::from) else {
        println!("cargo:warning=OUT_DIR not set, skipping test fixture");
        return;
    };
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let library = out_dir.join(fixture_filename(&target_os));

    match compile_fixture(Path::new(FIXTURE_SOURCE), &library) {
        Ok(()) => println!("cargo:rustc-env=DYNFFI_FIXTURE_LIB={}", library.display()),
        Err(message) => println!(
            "cargo:warning=Failed to build test fixture ({}), fixture tests will be skipped",
            message
        ),
    }
}

fn fixture_filename(target_os: &str) -> &'static str {
    match target_os {
        "windows" => "dynffi_fixture.dll",
        "macos" | "ios" => "libdynffi_fixture.dylib",
        _ => "libdynffi_fixture.so",
    }
}

/// Build `source` as a shared library at `output`
fn compile_fixture(source: &Path, output: &Path) -> Result<(), String> {
    let compiler = cc::Build::new()
        .cargo_metadata(false)
        .try_get_compiler()
        .map_err(|e| e.to_string())?;

    let mut command = compiler.to_command();
    if compiler.is_like_msvc() {
        command
            .arg("/LD")
            .arg(source)
            .arg(format!("/Fe{}", output.display()))
            .arg(format!(
                "/Fo{}\\",
                output.parent().unwrap_or(Path::new(".")).display()
            ));
    } else {
        command
            .args(["-shared", "-fPIC", "-O1", "-o"])
            .arg(output)
            .arg(source);
    }

    let status = command.status().map_err(|e| e.to_string())?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("compiler exited with {}", status))
    }
}
