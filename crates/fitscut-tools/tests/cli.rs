use assert_cmd::Command;
use fitscut::{parse_fits, write_fits, Card, Hdu, HduKind, Header, ImageData, Value};
use predicates::prelude::*;
use tempfile::tempdir;

fn card(keyword: &str, value: Value) -> Card {
    Card::new(keyword, value)
}

/// Empty primary plus one 10 x 10 `SCI` image holding 0..100.
fn sample_fits() -> Vec<u8> {
    let primary = Hdu::new(
        HduKind::Primary,
        Header::from_cards(vec![
            card("SIMPLE", Value::Logical(true)),
            card("BITPIX", Value::Integer(8)),
            card("NAXIS", Value::Integer(0)),
        ]),
        None,
    );
    let image = Hdu::new(
        HduKind::Image,
        Header::from_cards(vec![
            card("XTENSION", Value::String("IMAGE".into())),
            card("BITPIX", Value::Integer(8)),
            card("NAXIS", Value::Integer(2)),
            card("NAXIS1", Value::Integer(10)),
            card("NAXIS2", Value::Integer(10)),
            card("PCOUNT", Value::Integer(0)),
            card("GCOUNT", Value::Integer(1)),
            card("EXTNAME", Value::String("SCI".into())),
            card("CTYPE1", Value::String("RA---TAN".into())),
            card("CTYPE2", Value::String("DEC--TAN".into())),
            card("CRPIX1", Value::Float(5.0)),
            card("CRPIX2", Value::Float(5.0)),
            card("CRVAL1", Value::Float(150.0)),
            card("CRVAL2", Value::Float(2.0)),
            card("CD1_1", Value::Float(-0.001)),
            card("CD2_2", Value::Float(0.001)),
        ]),
        Some(ImageData::U8((0..100).collect())),
    );
    write_fits(&[primary, image]).unwrap()
}

#[test]
fn outputs_tool_name() {
    let mut cmd = Command::cargo_bin("fitscut").unwrap();
    cmd.arg("-V");
    cmd.assert()
        .success()
        .stdout(predicates::str::starts_with("fitscut "));
}

#[test]
fn requires_a_cutout() {
    let mut cmd = Command::cargo_bin("fitscut").unwrap();
    cmd.assert().failure();
}

#[test]
fn pixel_cutout_between_files() {
    let dir = tempdir().unwrap();
    let infile = dir.path().join("in.fits");
    let outfile = dir.path().join("out.fits");
    std::fs::write(&infile, sample_fits()).unwrap();

    let mut cmd = Command::cargo_bin("fitscut").unwrap();
    cmd.arg("--infile").arg(&infile).arg("--outfile").arg(&outfile);
    cmd.arg("[SCI][2:4,3:4]");
    cmd.assert().success();

    let out = parse_fits(&std::fs::read(&outfile).unwrap()).unwrap();
    assert_eq!(out.hdus.len(), 1);
    let hdu = &out.hdus[0];
    assert_eq!(hdu.header.naxes().unwrap(), vec![3, 2]);
    assert_eq!(hdu.header.get_f64("CRPIX1").unwrap(), Some(4.0));
    assert_eq!(hdu.data, Some(ImageData::U8(vec![21, 22, 23, 31, 32, 33])));
}

#[test]
fn stdin_to_stdout() {
    let mut cmd = Command::cargo_bin("fitscut").unwrap();
    cmd.arg("[1][1:2,1:1]").write_stdin(sample_fits());
    let output = cmd.assert().success().get_output().stdout.clone();

    let out = parse_fits(&output).unwrap();
    assert_eq!(out.hdus[0].data, Some(ImageData::U8(vec![0, 1])));
}

#[test]
fn prefer_pc_from_environment() {
    let mut cmd = Command::cargo_bin("fitscut").unwrap();
    cmd.env("FITSCUT_PREFER_PC", "true")
        .arg("[1][*,*]")
        .write_stdin(sample_fits());
    let output = cmd.assert().success().get_output().stdout.clone();

    let header = &parse_fits(&output).unwrap().hdus[0].header;
    assert!(!header.contains("CD1_1"));
    assert_eq!(header.get_f64("PC1_1").unwrap(), Some(-0.001));
}

#[test]
fn no_overlap_fails() {
    let mut cmd = Command::cargo_bin("fitscut").unwrap();
    cmd.arg("[1][50:60,*]").write_stdin(sample_fits());
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicates::str::contains("no overlap"));
}

#[test]
fn malformed_specification_fails() {
    let mut cmd = Command::cargo_bin("fitscut").unwrap();
    cmd.arg("CIRCLE 1 2").write_stdin(sample_fits());
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("invalid cutout specification"));
}

#[test]
fn missing_input_file_fails() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("fitscut").unwrap();
    cmd.arg("--infile").arg(dir.path().join("absent.fits")).arg("[1]");
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("unusable source or target").and(predicates::str::contains("fitscut:")));
}
