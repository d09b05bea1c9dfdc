//! Dataset adapters for the chest X-ray corpora.
//!
//! Each adapter exposes the same contract: a length, indexed access that
//! decodes one image from disk into a normalised [`Example`], and the full
//! label matrix. Images that fail to decode are reported as errors and
//! excluded by the caller rather than forwarded with inconsistent shapes.

mod combined;
mod covid;
mod shenzhen;
pub mod transforms;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use rand::RngCore;

pub use combined::CombinedDataset;
pub use covid::CovidDataset;
pub use shenzhen::ShenzhenDataset;
pub use transforms::{Augmentation, XrayTransform};

/// The pathology label columns, in the order used by every label vector.
pub const PATHOLOGIES: [&str; 14] = [
    "ARDS",
    "Bacterial Pneumonia",
    "COVID-19",
    "Chlamydophila",
    "Fungal Pneumonia",
    "Klebsiella",
    "Legionella",
    "MERS",
    "No Finding",
    "Pneumocystis",
    "Pneumonia",
    "SARS",
    "Streptococcus",
    "Viral Pneumonia",
];

/// Column index of a pathology name, if it is one of [`PATHOLOGIES`].
pub fn pathology_index(name: &str) -> Option<usize> {
    PATHOLOGIES.iter().position(|&p| p == name)
}

/// One dataset element: a normalised single-channel image, its multi-hot
/// pathology vector and its index within the dataset.
#[derive(Debug, Clone)]
pub struct Example {
    pub image: Array2<f32>,
    pub label: Array1<f32>,
    pub index: usize,
}

/// Per-example metadata carried alongside the images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub patient_id: String,
    pub filename: String,
}

/// The adapter contract shared by all datasets.
pub trait Dataset {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads and transforms the example at `idx`. The rng drives the
    /// optional augmentation; unaugmented datasets ignore it.
    fn example(&self, idx: usize, rng: &mut dyn RngCore) -> Result<Example, DatasetError>;

    /// The full label matrix, one row per example.
    fn labels(&self) -> Array2<f32>;

    fn metadata(&self, idx: usize) -> Option<&Metadata>;
}

/// Errors raised while reading metadata tables or image files.
#[derive(Debug)]
pub enum DatasetError {
    Io { path: PathBuf, source: io::Error },
    Decode { path: PathBuf, source: image::ImageError },
    /// The decoded image has a degenerate shape (zero width or height).
    MalformedImage { path: PathBuf, width: u32, height: u32 },
    MissingColumn { path: PathBuf, column: &'static str },
    IndexOutOfRange { index: usize, len: usize },
}

impl Display for DatasetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            DatasetError::Decode { path, source } => {
                write!(f, "failed to decode image {}: {}", path.display(), source)
            }
            DatasetError::MalformedImage { path, width, height } => write!(
                f,
                "malformed image {} ({}x{})",
                path.display(),
                width,
                height
            ),
            DatasetError::MissingColumn { path, column } => {
                write!(f, "{} has no '{}' column", path.display(), column)
            }
            DatasetError::IndexOutOfRange { index, len } => {
                write!(f, "example index {} out of range for length {}", index, len)
            }
        }
    }
}

impl Error for DatasetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DatasetError::Io { source, .. } => Some(source),
            DatasetError::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A parsed metadata table: a header row plus string records.
#[derive(Debug, Clone)]
pub(crate) struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Reads a comma-separated table with a header line. Fields may be
    /// double-quoted; quoted fields un-escape `""` to `"`.
    pub(crate) fn read(path: &Path) -> Result<Self, DatasetError> {
        let text = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let headers = match lines.next() {
            Some(line) => split_record(line),
            None => Vec::new(),
        };
        let rows = lines.map(split_record).collect();
        Ok(Self { headers, rows })
    }

    pub(crate) fn column(&self, path: &Path, name: &'static str) -> Result<usize, DatasetError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| DatasetError::MissingColumn {
                path: path.to_path_buf(),
                column: name,
            })
    }

    pub(crate) fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// Splits one CSV record, honouring double quotes.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            '"' if field.is_empty() => quoted = true,
            ',' if !quoted => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields.iter_mut().for_each(|f| *f = f.trim().to_string());
    fields
}

/// Decodes, optionally augments, normalises and transforms one image file.
pub(crate) fn load_image(
    path: &Path,
    max_value: f32,
    augment: Option<&Augmentation>,
    transform: &XrayTransform,
    rng: &mut dyn RngCore,
) -> Result<Array2<f32>, DatasetError> {
    let decoded = image::open(path).map_err(|source| DatasetError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let decoded = match augment {
        Some(aug) => aug.apply(decoded, rng),
        None => decoded,
    };

    let gray = decoded.to_luma8();
    let (width, height) = (gray.width(), gray.height());
    if width == 0 || height == 0 {
        return Err(DatasetError::MalformedImage {
            path: path.to_path_buf(),
            width,
            height,
        });
    }

    let mut img = Array2::zeros((height as usize, width as usize));
    for (x, y, pixel) in gray.enumerate_pixels() {
        img[[y as usize, x as usize]] = f32::from(pixel.0[0]);
    }

    transforms::normalize(&mut img, max_value);
    Ok(transform.apply(img))
}

/// Builds the constant-label matrix used by single-finding corpora.
pub(crate) fn tiled_labels(label: &Array1<f32>, rows: usize) -> Array2<f32> {
    let mut labels = Array2::zeros((rows, label.len()));
    for mut row in labels.rows_mut() {
        row.assign(label);
    }
    labels
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pathology_order_is_stable() {
        assert_eq!(PATHOLOGIES.len(), 14);
        assert_eq!(pathology_index("No Finding"), Some(8));
        assert_eq!(pathology_index("COVID-19"), Some(2));
        assert_eq!(pathology_index("Emphysema"), None);
    }

    #[test]
    fn split_record_handles_quotes() {
        assert_eq!(split_record("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(
            split_record(r#"1,"COVID-19, SARS",x.png"#),
            vec!["1", "COVID-19, SARS", "x.png"]
        );
        assert_eq!(split_record(r#""say ""hi""",y"#), vec![r#"say "hi""#, "y"]);
    }

    #[test]
    fn csv_table_reports_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.csv");
        std::fs::write(&path, "filename\na.png\nb.png\n").unwrap();

        let table = CsvTable::read(&path).unwrap();
        assert_eq!(table.column(&path, "filename").unwrap(), 0);
        assert!(matches!(
            table.column(&path, "finding"),
            Err(DatasetError::MissingColumn { column: "finding", .. })
        ));
        assert_eq!(table.rows().len(), 2);
    }
}
