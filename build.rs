fn main() {
    // macOS: set minimum deployment target to 10.15 (Catalina).
    // Catalina is the first macOS version that requires explicit Accessibility
    // permission for posting synthetic CGEvents — which is what the dispatch
    // engine uses to replay shortcuts and system-control keys.
    #[cfg(target_os = "macos")]
    println!("cargo:rustc-env=MACOSX_DEPLOYMENT_TARGET=10.15");

    tauri_build::build()
}
