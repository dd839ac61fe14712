/// Build-time git commit SHA stamped by build.rs when available.
pub fn git_sha() -> Option<&'static str> {
    option_env!("STRIDE_BUILD_GIT_SHA")
}

/// Version string shown by `stride --version`: the package version plus a
/// short commit SHA when the build ran inside a git checkout.
pub const fn long_version() -> &'static str {
    env!("STRIDE_LONG_VERSION")
}
