#![allow(dead_code)]

use k3s_data::{DataDirContext, EmbeddedBundle, Environment};
use std::ffi::OsString;
use std::path::Path;

pub const TOOLS: &[&str] = &[
    "k3s-server",
    "k3s-agent",
    "kubectl",
    "crictl",
    "ctr",
    "check-config",
];

/// A zstd tarball with one executable script per name under `bin/`.
pub fn bundle(name: &str, executables: &[&str]) -> EmbeddedBundle {
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

    let tar = builder.into_inner().unwrap();
    EmbeddedBundle::owned(name, zstd::encode_all(&tar[..], 3).unwrap())
}

/// A non-root user whose home is `<tmp>/home`.
pub fn user(tmp: &Path) -> DataDirContext {
    DataDirContext {
        is_root: false,
        home: Some(tmp.join("home")),
        cwd: Some(tmp.to_path_buf()),
    }
}

pub fn env(path: &str) -> Environment {
    [("PATH", path), ("HOME", "/home/test")].into_iter().collect()
}

pub fn argv(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

/// Lays out `<server>` so a local etcd snapshot can succeed.
pub fn initialized_server(server: &Path) {
    let etcd = server.join("db/etcd/member");
    std::fs::create_dir_all(etcd.join("wal")).unwrap();
    std::fs::create_dir_all(etcd.join("snap")).unwrap();
    std::fs::write(etcd.join("snap/db"), b"bbolt-bytes").unwrap();

    let tls = server.join("tls/etcd");
    std::fs::create_dir_all(&tls).unwrap();
    for cert in ["server-ca.crt", "client.crt", "client.key"] {
        std::fs::write(tls.join(cert), b"-----BEGIN CERTIFICATE-----\n").unwrap();
    }
}
