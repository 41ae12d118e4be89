//! Browser-style `User-Agent` string for collector requests.
//!
//! Collectors classify traffic by user agent, so the string mimics a desktop
//! browser while naming this crate and its version as the product.

use std::env::consts::{ARCH, OS};

use once_cell::sync::Lazy;

const PRODUCT: &str = concat!("femtotrack/", env!("CARGO_PKG_VERSION"));

static USER_AGENT: Lazy<String> = Lazy::new(|| build_user_agent(OS, ARCH));

/// Return the user agent sent with every request.
pub fn user_agent() -> &'static str {
    USER_AGENT.as_str()
}

fn build_user_agent(os: &str, arch: &str) -> String {
    format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) {PRODUCT}",
        platform(os, arch)
    )
}

fn platform(os: &str, arch: &str) -> String {
    match os {
        "macos" => {
            let cpu = if arch == "aarch64" { "ARM" } else { "Intel" };
            format!("Macintosh; {cpu} Mac OS X")
        }
        "windows" => {
            let bits = if arch.contains("64") {
                "Win64; x64"
            } else {
                "Win32"
            };
            format!("Windows NT 10.0; {bits}")
        }
        "linux" => format!("X11; Linux {arch}"),
        other => format!("{other} {arch}"),
    }
}
