use std::path::Path;
use std::process::Command;

fn git(workspace: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new("git").arg("-C").arg(workspace).args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn main() {
    println!("cargo:rerun-if-env-changed=LEDGERDESK_BUILD_SHA");

    // Source tarballs have no .git; packagers pass the revision in instead.
    let version = match std::env::var("LEDGERDESK_BUILD_SHA") {
        Ok(sha) if !sha.trim().is_empty() => sha.trim().to_string(),
        _ => {
            let manifest = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
            let workspace = Path::new(&manifest).join("..");
            match git(&workspace, &["rev-parse", "--short", "HEAD"]) {
                Some(sha) => {
                    let dirty = git(&workspace, &["status", "--porcelain", "--untracked-files=no"]).is_some();
                    println!("cargo:rerun-if-changed={}", workspace.join(".git/HEAD").display());
                    if dirty { format!("{sha}-dirty") } else { sha }
                }
                None => "unknown".to_string(),
            }
        }
    };

    println!("cargo:rustc-env=LEDGERDESK_BUILD_SHA={version}");
}
