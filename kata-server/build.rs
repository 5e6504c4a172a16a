fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    // Release pipelines export the commit hash when the checkout has no .git
    println!("cargo:rerun-if-env-changed=KATA_GIT_HASH");
    if let Ok(hash) = std::env::var("KATA_GIT_HASH") {
        println!("cargo:rustc-env=KATA_GIT_HASH={}", hash);
    }
}
