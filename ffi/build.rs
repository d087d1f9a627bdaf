use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");

    let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let out_dir = env::var("OUT_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."));

    match cbindgen::Builder::new()
        .with_crate(crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("HTTPC_FFI_H")
        .with_sys_include("stddef.h")
        .with_sys_include("stdint.h")
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(out_dir.join("httpc.h"));
        }
        // Header generation is a convenience; never fail the library build on it.
        Err(e) => println!("cargo:warning=cbindgen could not generate httpc.h: {e}"),
    }
}
