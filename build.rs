use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=CUDA_PATH");
    println!("cargo:rerun-if-env-changed=CUDA_HOME");

    // The real backend is opt-in: host-only builds never touch libcudart
    if env::var_os("CARGO_FEATURE_CUDA").is_none() {
        return;
    }

    let cuda_root = env::var("CUDA_PATH")
        .or_else(|_| env::var("CUDA_HOME"))
        .unwrap_or_else(|_| "/usr/local/cuda".to_string());

    println!("cargo:rustc-link-search=native={}/lib64", cuda_root);
    println!("cargo:rustc-link-search=native={}/lib", cuda_root);
    println!("cargo:rustc-link-lib=dylib=cudart");
}
