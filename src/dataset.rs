//! Reader for the MNIST IDX files (`*-idx3-ubyte` images, `*-idx1-ubyte`
//! labels), plain or gzip-compressed.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use ndarray::Array1;
use thiserror::Error;
use tracing::{debug, info};

use crate::{DataPoint, IMAGE_PIXELS, IMAGE_SIDE};

const IMAGES_MAGIC: u32 = 0x0000_0803;
const LABELS_MAGIC: u32 = 0x0000_0801;

/// Errors that can occur while loading an IDX data set.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Neither the compressed nor the plain file is present.
    #[error("none of {candidates:?} exist")]
    Missing { candidates: Vec<PathBuf> },
    #[error("bad magic number {found:#010x}, expected {expected:#010x}")]
    BadMagic { expected: u32, found: u32 },
    #[error("file truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    /// Header dimensions whose product does not fit in memory.
    #[error("header declares {count} images of {rows}x{cols}, too large to address")]
    Oversized { count: usize, rows: usize, cols: usize },
    #[error("images are {rows}x{cols}, expected {side}x{side}", side = IMAGE_SIDE)]
    ImageSize { rows: usize, cols: usize },
    #[error("{images} images but {labels} labels")]
    CountMismatch { images: usize, labels: usize },
}

/// Which half of MNIST to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    fn stems(self) -> (&'static str, &'static str) {
        match self {
            Split::Train => ("train-images-idx3-ubyte", "train-labels-idx1-ubyte"),
            Split::Test => ("t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte"),
        }
    }
}

/// Decoded image file: `count` images of `rows x cols` bytes, row-major.
#[derive(Debug, Clone)]
pub struct IdxImages {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
    pub pixels: Vec<u8>,
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, DatasetError> {
    let bytes = buf.get(offset..offset + 4).ok_or(DatasetError::Truncated {
        needed: offset + 4,
        available: buf.len(),
    })?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn check_magic(buf: &[u8], expected: u32) -> Result<(), DatasetError> {
    let found = read_u32(buf, 0)?;
    if found != expected {
        return Err(DatasetError::BadMagic { expected, found });
    }
    Ok(())
}

/// Parses an `idx3-ubyte` image file.
pub fn parse_images(buf: &[u8]) -> Result<IdxImages, DatasetError> {
    check_magic(buf, IMAGES_MAGIC)?;
    let count = read_u32(buf, 4)? as usize;
    let rows = read_u32(buf, 8)? as usize;
    let cols = read_u32(buf, 12)? as usize;
    let needed = count
        .checked_mul(rows)
        .and_then(|n| n.checked_mul(cols))
        .and_then(|n| n.checked_add(16))
        .ok_or(DatasetError::Oversized { count, rows, cols })?;
    if buf.len() < needed {
        return Err(DatasetError::Truncated {
            needed,
            available: buf.len(),
        });
    }
    Ok(IdxImages {
        count,
        rows,
        cols,
        pixels: buf[16..needed].to_vec(),
    })
}

/// Parses an `idx1-ubyte` label file.
pub fn parse_labels(buf: &[u8]) -> Result<Vec<u8>, DatasetError> {
    check_magic(buf, LABELS_MAGIC)?;
    let count = read_u32(buf, 4)? as usize;
    let needed = count.checked_add(8).ok_or(DatasetError::Truncated {
        needed: usize::MAX,
        available: buf.len(),
    })?;
    if buf.len() < needed {
        return Err(DatasetError::Truncated {
            needed,
            available: buf.len(),
        });
    }
    Ok(buf[8..needed].to_vec())
}

/// Pairs images with labels and scales pixels to [0, 1].
pub fn to_samples(
    images: &IdxImages,
    labels: &[u8],
) -> Result<Vec<DataPoint<usize, f32>>, DatasetError> {
    if images.rows != IMAGE_SIDE || images.cols != IMAGE_SIDE {
        return Err(DatasetError::ImageSize {
            rows: images.rows,
            cols: images.cols,
        });
    }
    if images.count != labels.len() {
        return Err(DatasetError::CountMismatch {
            images: images.count,
            labels: labels.len(),
        });
    }
    Ok(images
        .pixels
        .chunks_exact(IMAGE_PIXELS)
        .zip(labels)
        .map(|(pixels, &label)| {
            let features: Array1<f32> = pixels.iter().map(|&p| f32::from(p) / 255.0).collect();
            DataPoint::new(features, usize::from(label))
        })
        .collect())
}

fn locate(dir: &Path, stem: &str) -> Result<PathBuf, DatasetError> {
    let candidates = vec![dir.join(format!("{stem}.gz")), dir.join(stem)];
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or(DatasetError::Missing { candidates })
}

fn read_file(path: &Path) -> Result<Vec<u8>, DatasetError> {
    let io_err = |source: std::io::Error| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = BufReader::new(File::open(path).map_err(io_err)?);
    let mut reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).map_err(io_err)?;
    debug!(path = %path.display(), bytes = buf.len(), "read idx file");
    Ok(buf)
}

/// Loads one split from `dir`, preferring `.gz` files when both exist.
pub fn load_split(dir: &Path, split: Split) -> Result<Vec<DataPoint<usize, f32>>, DatasetError> {
    let (image_stem, label_stem) = split.stems();
    let images = parse_images(&read_file(&locate(dir, image_stem)?)?)?;
    let labels = parse_labels(&read_file(&locate(dir, label_stem)?)?)?;
    let samples = to_samples(&images, &labels)?;
    info!(?split, samples = samples.len(), "loaded mnist split");
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn image_file(images: &[[u8; IMAGE_PIXELS]]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&IMAGES_MAGIC.to_be_bytes());
        buf.extend_from_slice(&(images.len() as u32).to_be_bytes());
        buf.extend_from_slice(&(IMAGE_SIDE as u32).to_be_bytes());
        buf.extend_from_slice(&(IMAGE_SIDE as u32).to_be_bytes());
        for image in images {
            buf.extend_from_slice(image);
        }
        buf
    }

    fn label_file(labels: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&LABELS_MAGIC.to_be_bytes());
        buf.extend_from_slice(&(labels.len() as u32).to_be_bytes());
        buf.extend_from_slice(labels);
        buf
    }

    #[test]
    fn test_parse_and_normalise() {
        let mut image = [0u8; IMAGE_PIXELS];
        image[0] = 255;
        image[IMAGE_SIDE + 1] = 51;
        let images = parse_images(&image_file(&[image])).unwrap();
        let labels = parse_labels(&label_file(&[7])).unwrap();

        let samples = to_samples(&images, &labels).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label, 7);
        assert_abs_diff_eq!(samples[0].features[0], 1.0);
        assert_abs_diff_eq!(samples[0].features[IMAGE_SIDE + 1], 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(samples[0].features.sum(), 1.2, epsilon = 1e-6);
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let buf = label_file(&[1, 2]);
        assert!(matches!(
            parse_images(&buf),
            Err(DatasetError::BadMagic { expected: IMAGES_MAGIC, .. })
        ));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let mut buf = image_file(&[[0u8; IMAGE_PIXELS], [0u8; IMAGE_PIXELS]]);
        buf.truncate(buf.len() - 10);
        assert!(matches!(parse_images(&buf), Err(DatasetError::Truncated { .. })));
        assert!(matches!(parse_labels(&[0, 0]), Err(DatasetError::Truncated { .. })));
    }

    #[test]
    fn test_huge_header_dimensions_are_rejected() {
        let mut buf = IMAGES_MAGIC.to_be_bytes().to_vec();
        for _ in 0..3 {
            buf.extend_from_slice(&u32::MAX.to_be_bytes());
        }
        buf.extend_from_slice(&[0u8; 32]);
        assert!(matches!(
            parse_images(&buf),
            Err(DatasetError::Oversized { count, .. }) if count == u32::MAX as usize
        ));
    }

    #[test]
    fn test_count_mismatch_is_rejected() {
        let images = parse_images(&image_file(&[[0u8; IMAGE_PIXELS]])).unwrap();
        assert!(matches!(
            to_samples(&images, &[1, 2]),
            Err(DatasetError::CountMismatch { images: 1, labels: 2 })
        ));
    }

    #[test]
    fn test_load_split_reads_gzip_and_plain_files() {
        let dir = std::env::temp_dir().join(format!("mnist-idx-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&image_file(&[[10u8; IMAGE_PIXELS], [20u8; IMAGE_PIXELS]]))
            .unwrap();
        std::fs::write(dir.join("t10k-images-idx3-ubyte.gz"), encoder.finish().unwrap()).unwrap();
        std::fs::write(dir.join("t10k-labels-idx1-ubyte"), label_file(&[3, 9])).unwrap();

        let samples = load_split(&dir, Split::Test).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].label, 9);
        assert_abs_diff_eq!(samples[1].features[5], 20.0 / 255.0, epsilon = 1e-6);
        assert!(matches!(
            load_split(&dir, Split::Train),
            Err(DatasetError::Missing { .. })
        ));
    }
}
