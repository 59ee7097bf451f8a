use std::env;

fn main() {
    let profile = env::var("PROFILE").unwrap_or_else(|_| "debug".to_string());
    let pkg_version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".to_string());

    let version = if profile == "release" {
        println!("cargo:rerun-if-changed=Cargo.toml");
        pkg_version
    } else {
        // Debug builds carry the build time so a stale agent binary is easy to spot in logs
        format!(
            "{}-dev.{}",
            pkg_version,
            chrono::Utc::now().format("%Y%m%d%H%M%S")
        )
    };

    println!("cargo:rustc-env=BUILD_VERSION={}", version);
}
