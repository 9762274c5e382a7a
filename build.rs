use std::env;
use std::path::PathBuf;

/// Environment variables that influence how `ffmpeg-sys-next` finds FFmpeg.
const WATCHED_VARIABLES: [&str; 4] = ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"];

fn warn(message: &str) {
    println!("cargo:warning={message}");
}

fn main() {
    for variable in WATCHED_VARIABLES {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    // Only Windows needs help locating the FFmpeg libraries.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows")
        || env::var_os("FFMPEG_DIR").is_some()
    {
        return;
    }

    let Some(vcpkg_root) = env::var_os("VCPKG_ROOT") else {
        warn("FFMPEG_DIR is not set. Install FFmpeg through vcpkg and point FFMPEG_DIR at it before building vidcompare on Windows.");
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let install = PathBuf::from(vcpkg_root).join("installed").join(triplet);

    if !install.exists() {
        warn(&format!("VCPKG_ROOT is set, but {} does not exist.", install.display()));
        return;
    }

    warn(&format!("Found FFmpeg under {0}; set FFMPEG_DIR={0} to use it explicitly.", install.display()));
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        warn("Set VCPKGRS_DYNAMIC=1 if that FFmpeg build links dynamically.");
    }
}
