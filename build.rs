use std::process::Command;

fn git_short_sha() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

fn main() {
    let base = env!("CARGO_PKG_VERSION");

    let nightly = std::env::var("POWERSHOP_NIGHTLY")
        .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    // CI checkouts without git metadata can pass GIT_SHA instead
    let sha = git_short_sha().or_else(|| std::env::var("GIT_SHA").ok().filter(|s| !s.is_empty()));

    let version = match (nightly, sha) {
        (true, Some(sha)) => format!("{}-nightly+{}", base, sha),
        (true, None) => format!("{}-nightly", base),
        (false, _) => base.to_string(),
    };
    println!("cargo:rustc-env=APP_VERSION={}", version);

    for var in ["POWERSHOP_NIGHTLY", "GIT_SHA"] {
        println!("cargo:rerun-if-env-changed={}", var);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
}
