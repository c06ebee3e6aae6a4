//! Build script for NetBlocker
//!
//! Embeds build-time information (git commit, dirty status, build timestamp)
//! shown by `netblocker --version`.

fn main() {
    // Re-run build if the default backend override changes
    println!("cargo:rerun-if-env-changed=NETBLOCKER_BACKEND");

    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build info");
}
