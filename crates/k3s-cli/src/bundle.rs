use k3s_data::EmbeddedBundle;

mod generated {
    include!(concat!(env!("OUT_DIR"), "/bundle.rs"));
}

/// The data bundle compiled into this binary (see `build.rs`).
pub fn embedded_bundle() -> EmbeddedBundle {
    EmbeddedBundle::new(generated::BUNDLE_NAME, generated::BUNDLE_BYTES)
}
