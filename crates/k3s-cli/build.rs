use std::path::PathBuf;

fn main() {
    // The data bundle is produced by the release packaging step and handed to Cargo through
    // `K3S_DATA_BUNDLE`. Development builds embed an empty placeholder so the launcher still
    // compiles; staging then fails with a message naming the missing bundle.
    println!("cargo:rerun-if-env-changed=K3S_DATA_BUNDLE");

    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").expect("cargo sets OUT_DIR"));
    let (name, path) = match std::env::var_os("K3S_DATA_BUNDLE") {
        Some(path) => {
            let path = PathBuf::from(path);
            println!("cargo:rerun-if-changed={}", path.display());
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .expect("K3S_DATA_BUNDLE must name a file with a UTF-8 file name")
                .to_owned();
            (name, path)
        }
        None => {
            let path = out_dir.join("dev.tar");
            std::fs::write(&path, b"").expect("write placeholder bundle");
            ("dev.tar".to_owned(), path)
        }
    };

    let source = format!(
        "pub const BUNDLE_NAME: &str = {name:?};\n\
         pub static BUNDLE_BYTES: &[u8] = include_bytes!({path:?});\n"
    );
    std::fs::write(out_dir.join("bundle.rs"), source).expect("write bundle.rs");
}
