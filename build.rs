use std::env;
use std::path::{Path, PathBuf};

// ffmpeg-sys-next does its own discovery; this only explains what it will
// find on Windows, where FFmpeg usually comes from vcpkg.
fn main() {
    for variable in ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }
    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let Some(vcpkg_root) = env::var_os("VCPKG_ROOT") else {
        println!(
            "cargo:warning=mvcapture needs FFmpeg headers and libraries. Set FFMPEG_DIR, or install ffmpeg[avcodec,avformat,swscale] with vcpkg and set VCPKG_ROOT."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| String::from("x64-windows"));
    let installed = PathBuf::from(vcpkg_root).join("installed").join(&triplet);
    report_vcpkg_install(&installed, &triplet);
}

fn report_vcpkg_install(installed: &Path, triplet: &str) {
    let has_avcodec = installed.join("include").join("libavcodec").is_dir();
    if !has_avcodec {
        println!(
            "cargo:warning=No vcpkg FFmpeg found for triplet {triplet} under {}.",
            installed.display()
        );
        return;
    }

    println!(
        "cargo:warning=Using vcpkg FFmpeg from {}; export FFMPEG_DIR to pin it.",
        installed.display()
    );
    if env::var_os("VCPKGRS_DYNAMIC").is_none() && !triplet.ends_with("-static") {
        println!("cargo:warning=Dynamic vcpkg triplet detected; set VCPKGRS_DYNAMIC=1.");
    }
}
