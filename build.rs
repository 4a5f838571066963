use std::env;
use std::path::{Path, PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");
    println!("cargo:rerun-if-env-changed=VCPKG_ROOT");
    println!("cargo:rerun-if-env-changed=VCPKGRS_TRIPLET");

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }

    // ffmpeg-sys-next finds FFmpeg itself when the directory is explicit.
    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let Some(vcpkg_root) = env::var_os("VCPKG_ROOT") else {
        println!(
            "cargo:warning=loadvid links against FFmpeg; set FFMPEG_DIR (or VCPKG_ROOT with an ffmpeg install) before building on Windows."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let install = vcpkg_install(Path::new(&vcpkg_root), &triplet);

    if install.join("include").join("libavformat").exists() {
        println!(
            "cargo:warning=Found FFmpeg headers under {}; set FFMPEG_DIR to that path to pin it.",
            install.display(),
        );
    } else {
        println!(
            "cargo:warning=No FFmpeg headers under {}; run `vcpkg install ffmpeg:{triplet}`.",
            install.display(),
        );
    }
}

fn vcpkg_install(root: &Path, triplet: &str) -> PathBuf {
    root.join("installed").join(triplet)
}
