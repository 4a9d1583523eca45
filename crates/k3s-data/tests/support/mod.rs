#![allow(dead_code)]

use k3s_data::{AssetBundleSource, EmbeddedBundle, Result};
use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const TOOLS: &[&str] = &[
    "k3s-server",
    "k3s-agent",
    "kubectl",
    "crictl",
    "ctr",
    "check-config",
];

/// Builds a zstd-compressed tarball with an executable script per name under `bin/`.
pub fn bundle_bytes(executables: &[&str]) -> Vec<u8> {
    bundle_bytes_with_links(executables, &[])
}

/// Like [`bundle_bytes`], plus `bin/<name> -> <target>` symlinks.
pub fn bundle_bytes_with_links(executables: &[&str], links: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    let mut dir = tar::Header::new_gnu();
    dir.set_entry_type(tar::EntryType::Directory);
    dir.set_size(0);
    dir.set_mode(0o755);
    dir.set_cksum();
    builder
        .append_data(&mut dir, "bin/aux/", std::io::empty())
        .unwrap();

    for name in executables {
        let body = format!("#!/bin/sh\necho {name}\n");
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("bin/{name}"), body.as_bytes())
            .unwrap();
    }

    for (name, target) in links {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        header.set_link_name(target).unwrap();
        header.set_cksum();
        builder
            .append_data(&mut header, format!("bin/{name}"), std::io::empty())
            .unwrap();
    }

    let tar = builder.into_inner().unwrap();
    zstd::encode_all(&tar[..], 3).unwrap()
}

pub fn bundle(name: &str, executables: &[&str]) -> EmbeddedBundle {
    EmbeddedBundle::owned(name, bundle_bytes(executables))
}

/// Wraps a bundle and counts how many times its bytes were read.
pub struct CountingBundle {
    inner: EmbeddedBundle,
    reads: AtomicUsize,
}

impl CountingBundle {
    pub fn new(inner: EmbeddedBundle) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl AssetBundleSource for CountingBundle {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn read(&self) -> Result<Cow<'_, [u8]>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read()
    }
}
