mod common;

use std::fs::File;
use std::io::Write;
use std::path::Path;

use common::BundleSpec;
use egi2bids::resolve_source;

fn zip_dir(archive: &Path, root: &Path) {
    fn add(zipw: &mut zip::ZipWriter<File>, base: &Path, dir: &Path) {
        let opts = zip::write::SimpleFileOptions::default();
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            let rel = path.strip_prefix(base).unwrap().to_str().unwrap().to_string();
            if path.is_dir() {
                zipw.add_directory(rel, opts).unwrap();
                add(zipw, base, &path);
            } else {
                zipw.start_file(rel, opts).unwrap();
                zipw.write_all(&std::fs::read(&path).unwrap()).unwrap();
            }
        }
    }
    let mut zipw = zip::ZipWriter::new(File::create(archive).unwrap());
    add(&mut zipw, root.parent().unwrap(), root);
    zipw.finish().unwrap();
}

fn tar_dir(archive: &Path, root: &Path) {
    let mut builder = tar::Builder::new(File::create(archive).unwrap());
    builder
        .append_dir_all(root.file_name().unwrap().to_str().unwrap(), root)
        .unwrap();
    builder.finish().unwrap();
}

#[test]
fn zip_extraction_finds_contents_root() {
    let tmp = tempfile::tempdir().unwrap();
    let bundle = common::make_contents_bundle(tmp.path(), &BundleSpec::default());
    let archive = tmp.path().join("rec.zip");
    zip_dir(&archive, &bundle);

    let work = tempfile::tempdir().unwrap();
    let resolved = resolve_source(&archive, work.path()).unwrap();
    assert!(resolved.join("Contents").join("info.xml").is_file());
}

#[test]
fn tar_extraction_finds_contents_root() {
    let tmp = tempfile::tempdir().unwrap();
    let bundle = common::make_contents_bundle(tmp.path(), &BundleSpec::default());
    let archive = tmp.path().join("rec.tar");
    tar_dir(&archive, &bundle);

    let work = tempfile::tempdir().unwrap();
    let resolved = resolve_source(&archive, work.path()).unwrap();
    assert!(resolved.join("Contents").join("info.xml").is_file());
}

#[test]
fn archive_without_contents_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let plain = tmp.path().join("plain");
    std::fs::create_dir(&plain).unwrap();
    std::fs::write(plain.join("readme.txt"), b"not a bundle").unwrap();
    let archive = tmp.path().join("plain.tar");
    tar_dir(&archive, &plain);

    let work = tempfile::tempdir().unwrap();
    let err = resolve_source(&archive, work.path()).unwrap_err();
    assert!(err.to_string().contains("Contents"), "{err}");
}

#[test]
fn unsupported_extension_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("rec.fif");
    std::fs::write(&file, b"").unwrap();
    let work = tempfile::tempdir().unwrap();
    assert!(resolve_source(&file, work.path()).is_err());
}

#[test]
fn bare_mff_directory_passes_through() {
    let tmp = tempfile::tempdir().unwrap();
    let bundle = common::make_bundle(tmp.path(), &BundleSpec::default());
    let work = tempfile::tempdir().unwrap();
    let resolved = resolve_source(&bundle, work.path()).unwrap();
    assert_eq!(resolved, bundle);
}
