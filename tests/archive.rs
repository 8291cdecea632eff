use std::{fs, io::Write, path::Path};

use flate2::{write::GzEncoder, Compression};
use pretty_assertions::assert_eq;
use prefix::{
    archive::{self, ArchiveError},
    model::{ArchiveSource, Source},
    workspace::{SourceEntry, Workspace},
};

fn write_tar<W: Write>(writer: W, files: &[(&str, &str)]) -> W {
    let mut builder = tar::Builder::new(writer);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap()
}

fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    write_tar(GzEncoder::new(Vec::new(), Compression::default()), files)
        .finish()
        .unwrap()
}

fn tar_bz2(files: &[(&str, &str)]) -> Vec<u8> {
    write_tar(
        bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default()),
        files,
    )
    .finish()
    .unwrap()
}

fn tar_xz(files: &[(&str, &str)]) -> Vec<u8> {
    write_tar(xz2::write::XzEncoder::new(Vec::new(), 6), files)
        .finish()
        .unwrap()
}

fn zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (path, content) in files {
        writer
            .start_file(*path, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn local_archive_is_used_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("hello-1.0.tar.gz");
    fs::write(&archive_path, tar_gz(&[("hello-1.0/README", "hello")])).unwrap();
    let cache_dir = dir.path().join("cache");

    let url = format!("file://{}", archive_path.display());
    assert_eq!(archive::resolve(&url, &cache_dir).unwrap(), archive_path);
    assert_eq!(
        archive::resolve(archive_path.to_str().unwrap(), &cache_dir).unwrap(),
        archive_path
    );
    assert!(!cache_dir.exists());

    let target = dir.path().join("src");
    assert!(archive::extract(&archive_path, &target, false).unwrap());
    assert_eq!(read(&target.join("hello-1.0/README")), "hello");
}

#[test]
fn populated_target_is_left_alone_unless_clean() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("hello.tgz");
    fs::write(&archive_path, tar_gz(&[("README", "from archive")])).unwrap();

    let target = dir.path().join("src");
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("README"), "edited").unwrap();

    assert!(!archive::extract(&archive_path, &target, false).unwrap());
    assert_eq!(read(&target.join("README")), "edited");

    assert!(archive::extract(&archive_path, &target, true).unwrap());
    assert_eq!(read(&target.join("README")), "from archive");
}

#[test]
fn zip_archives_are_unpacked() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("hello.zip");
    fs::write(&archive_path, zip(&[("hello/main.c", "int main() {}")])).unwrap();

    let target = dir.path().join("src");
    archive::extract(&archive_path, &target, false).unwrap();
    assert_eq!(read(&target.join("hello/main.c")), "int main() {}");
}

#[test]
fn bzip2_and_xz_tarballs_are_unpacked() {
    let dir = tempfile::tempdir().unwrap();
    let cases = [
        ("pcre-8.42.tar.bz2", tar_bz2(&[("pcre-8.42/configure", "bz2")])),
        ("glib-2.56.1.tar.xz", tar_xz(&[("glib-2.56.1/configure", "xz")])),
        ("download-bz2", tar_bz2(&[("configure", "bz2 by content")])),
        ("download-xz", tar_xz(&[("configure", "xz by content")])),
    ];

    for (name, bytes) in cases {
        let archive_path = dir.path().join(name);
        fs::write(&archive_path, bytes).unwrap();
        let target = dir.path().join(format!("{name}-src"));
        assert!(archive::extract(&archive_path, &target, false).unwrap());
    }

    assert_eq!(read(&dir.path().join("pcre-8.42.tar.bz2-src/pcre-8.42/configure")), "bz2");
    assert_eq!(read(&dir.path().join("glib-2.56.1.tar.xz-src/glib-2.56.1/configure")), "xz");
    assert_eq!(read(&dir.path().join("download-bz2-src/configure")), "bz2 by content");
    assert_eq!(read(&dir.path().join("download-xz-src/configure")), "xz by content");
}

#[test]
fn format_is_detected_from_content() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("download");
    fs::write(&archive_path, tar_gz(&[("README", "no extension")])).unwrap();

    let target = dir.path().join("src");
    archive::extract(&archive_path, &target, false).unwrap();
    assert_eq!(read(&target.join("README")), "no extension");
}

#[test]
fn unknown_format_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("notes.txt");
    fs::write(&archive_path, "just text").unwrap();

    let target = dir.path().join("src");
    let error = archive::extract(&archive_path, &target, false).unwrap_err();
    assert!(matches!(error, ArchiveError::UnsupportedArchiveFormat { .. }), "{error:?}");
}

#[test]
fn remote_archive_is_downloaded_once() {
    let mut server = mockito::Server::new();
    let body = tar_gz(&[("zlib-1.2.11/CMakeLists.txt", "project(zlib)")]);
    let mock = server
        .mock("GET", "/zlib-1.2.11.tar.gz")
        .with_status(200)
        .with_body(&body)
        .expect(1)
        .create();

    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");
    let url = format!("{}/zlib-1.2.11.tar.gz", server.url());

    let first = archive::resolve(&url, &cache_dir).unwrap();
    let second = archive::resolve(&url, &cache_dir).unwrap();
    mock.assert();

    assert_eq!(first, second);
    assert!(first.starts_with(&cache_dir));
    assert!(first
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with("zlib-1.2.11.tar.gz"));
    assert_eq!(fs::read(&first).unwrap(), body);
}

#[test]
fn failed_download_leaves_no_cache_entry() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/missing.tar.gz")
        .with_status(404)
        .create();

    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");
    let url = format!("{}/missing.tar.gz", server.url());

    let error = archive::resolve(&url, &cache_dir).unwrap_err();
    mock.assert();
    assert!(matches!(error, ArchiveError::Download { .. }), "{error:?}");
    assert!(!cache_dir.join(archive::cache_filename(&url)).exists());
}

#[test]
fn workspace_unpacks_downloaded_archive() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/hello.tar.gz")
        .with_status(200)
        .with_body(tar_gz(&[("hello/configure", "#!/bin/sh\n")]))
        .expect(1)
        .create();

    let dir = tempfile::tempdir().unwrap();
    let mut workspace = Workspace::new(dir.path());
    let source = ArchiveSource::new(
        workspace.src_dir_for("hello"),
        format!("{}/hello.tar.gz", server.url()),
    )
    .unwrap();
    workspace
        .add(SourceEntry::new("hello", Source::Archive(source)))
        .unwrap();

    workspace.update("hello", false).unwrap();
    workspace.update_all(false).unwrap();
    mock.assert();

    assert_eq!(
        read(&workspace.src_dir_for("hello").join("hello/configure")),
        "#!/bin/sh\n"
    );
    assert!(workspace.cache_dir().is_dir());
}
