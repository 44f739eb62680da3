//! Trust pool assembly from certificate directories

mod common;

use certbundle::{load_trust_pool, load_trust_pool_with_native_roots, native_trust_pool};
use common::{fixture_text, write_file};

#[test]
fn nonexistent_directory_is_an_empty_pool() {
    let pool = load_trust_pool("nonexistent-dir").expect("missing directory is not an error");
    assert!(pool.is_empty());
}

#[test]
fn empty_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = load_trust_pool(dir.path()).expect("empty pool");
    assert!(pool.is_empty());
}

#[test]
fn subdirectories_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("empty-dir")).expect("mkdir");

    let pool = load_trust_pool(dir.path()).expect("empty pool");
    assert!(pool.is_empty());
}

#[test]
fn empty_file_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "empty-file", "");

    let pool = load_trust_pool(dir.path()).expect("empty pool");
    assert!(pool.is_empty());
}

#[test]
fn only_valid_files_contribute() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "01-ca.crt", &fixture_text("ca.crt"));
    write_file(dir.path(), "02-bad-der.crt", &fixture_text("bad_der.crt"));
    write_file(dir.path(), "03-bad-pem.crt", &fixture_text("bad_pem.crt"));
    write_file(dir.path(), "04-key.pem", &fixture_text("rsa.key"));
    write_file(dir.path(), "05-empty", "");
    write_file(dir.path(), "06-readme.txt", "certificates live here\n");
    write_file(dir.path(), "07-server.crt", &fixture_text("rsa.crt"));

    let nested = dir.path().join("nested");
    std::fs::create_dir(&nested).expect("mkdir");
    write_file(&nested, "ec.crt", &fixture_text("ec.crt"));

    let pool = load_trust_pool(dir.path()).expect("pool");
    assert_eq!(pool.len(), 2);
    assert!(pool.certificates()[0].is_ca());
    assert!(pool.certificates()[1].subject().contains("CN=localhost"));
}

#[test]
fn bundle_files_contribute_every_certificate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bundle = format!("{}{}", fixture_text("ca.crt"), fixture_text("ec.crt"));
    write_file(dir.path(), "bundle.pem", &bundle);

    let pool = load_trust_pool(dir.path()).expect("pool");
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.root_cert_store().len(), 2);
}

#[cfg(unix)]
#[test]
fn dangling_symlink_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "ca.crt", &fixture_text("ca.crt"));
    std::os::unix::fs::symlink(dir.path().join("gone.crt"), dir.path().join("link.crt"))
        .expect("symlink");

    let pool = load_trust_pool(dir.path()).expect("pool");
    assert_eq!(pool.len(), 1);
}

#[test]
fn repeated_loads_agree() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "b.crt", &fixture_text("rsa.crt"));
    write_file(dir.path(), "a.crt", &fixture_text("ca.crt"));

    let first = load_trust_pool(dir.path()).expect("pool");
    let second = load_trust_pool(dir.path()).expect("pool");
    assert_eq!(first.certificates(), second.certificates());
}

#[test]
fn native_roots_come_before_the_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "ca.crt", &fixture_text("ca.crt"));

    let native = native_trust_pool();
    let pool = load_trust_pool_with_native_roots(dir.path()).expect("pool");
    assert!(pool.len() >= 1 + native.len());

    let last = pool.certificates().last().expect("directory certificate");
    assert!(last.subject().contains("CN=Certbundle Test Root"));
}

#[test]
fn native_roots_with_a_missing_directory() {
    let native = native_trust_pool();
    let pool = load_trust_pool_with_native_roots("nonexistent-dir").expect("pool");
    assert_eq!(pool.len(), native.len());
}
