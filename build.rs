use std::process::Command;

fn head_sha() -> Option<String> {
    let output = Command::new("git").args(["rev-parse", "HEAD"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");

    let version = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();
    match head_sha() {
        Some(sha) => {
            println!("cargo:rustc-env=STRIDE_BUILD_GIT_SHA={sha}");
            println!("cargo:rustc-env=STRIDE_LONG_VERSION={version} ({})", &sha[..12.min(sha.len())]);
        }
        None => println!("cargo:rustc-env=STRIDE_LONG_VERSION={version}"),
    }
}
