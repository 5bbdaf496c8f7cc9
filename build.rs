#![forbid(unsafe_code)]

// Build information logged at startup.  Builds outside a git checkout
// (source tarballs, vendored copies) record "unknown" instead of failing.
fn main() {
    set_env("GIT_BRANCH", build_data::get_git_branch());
    set_env("GIT_COMMIT_SHORT", build_data::get_git_commit_short());
    set_env("GIT_DIRTY", build_data::get_git_dirty().map(|d| d.to_string()));
    set_env("SOURCE_TIMESTAMP", build_data::get_source_time().map(build_data::format_timestamp));
    set_env("RUSTC_VERSION", build_data::get_rustc_version());

    // Tells cargo not to rebuild build.rs during debug builds when other files change.
    //build_data::no_debug_rebuilds();
}

fn set_env(name: &str, value: Result<String, String>) {
    let value = value.unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env={}={}", name, value);
}
