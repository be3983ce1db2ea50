#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const WIDTH:  usize = 512;
pub const HEIGHT: usize = 256;

/// Sample value written at pixel `i` of a frame tagged `seed`.
pub fn sample(seed: u16, i: usize) -> u16 {
    seed.wrapping_mul(31).wrapping_add(i as u16)
}

/// One 16-bit frame in the imager's layout, with instrument-style metadata.
pub fn frame_bytes(seed: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(WIDTH * HEIGHT * 2 + 256);
    out.extend_from_slice(b"P5\n");
    out.extend_from_slice(b"#\"Site unique ID\" = \"rabb\"\n");
    out.extend_from_slice(b"#\"Imager unique ID\" = \"rainbow-08\"\n");
    out.extend_from_slice(format!("#\"Frame seed\" = \"{seed}\"\n").as_bytes());
    out.extend_from_slice(b"#Mode=full\n");
    out.extend_from_slice(format!("{WIDTH} {HEIGHT}\n65535\n").as_bytes());
    for i in 0..WIDTH * HEIGHT {
        out.extend_from_slice(&sample(seed, i).to_be_bytes());
    }
    out
}

/// One 8-bit frame; pixel `i` holds `i % 256`.
pub fn frame_bytes_8bit() -> Vec<u8> {
    let mut out = format!("P5\n#depth=8\n{WIDTH} {HEIGHT}\n255\n").into_bytes();
    out.extend((0..WIDTH * HEIGHT).map(|i| (i % 256) as u8));
    out
}

pub fn stream(seeds: impl IntoIterator<Item = u16>) -> Vec<u8> {
    seeds.into_iter().flat_map(frame_bytes).collect()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::fast());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    File::create(&path).unwrap().write_all(bytes).unwrap();
    path
}

/// Write a file of `frames` frames whose seeds are `base..base + frames`.
pub fn write_pgm(dir: &Path, name: &str, base: u16, frames: u16) -> PathBuf {
    let bytes = stream(base..base + frames);
    if name.ends_with(".gz") {
        write_file(dir, name, &gzip(&bytes))
    } else {
        write_file(dir, name, &bytes)
    }
}
