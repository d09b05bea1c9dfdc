//! The Shenzhen hospital corpus: healthy chest X-rays only, so every
//! example carries the constant one-hot label at "No Finding".

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use rand::RngCore;

use super::transforms::{Augmentation, XrayTransform};
use super::{
    load_image, pathology_index, tiled_labels, CsvTable, Dataset, DatasetError, Example, Metadata,
    PATHOLOGIES,
};

/// Synthesised patient ids start here, as in the original metadata dump.
const FIRST_PATIENT_ID: usize = 1000;

pub struct ShenzhenDataset {
    images_dir: PathBuf,
    metadata: Vec<Metadata>,
    label: Array1<f32>,
    transform: XrayTransform,
    augment: Option<Augmentation>,
}

impl ShenzhenDataset {
    /// Raw pixel values are 8-bit.
    pub const MAX_VALUE: f32 = 255.0;

    /// Opens the dataset rooted at `root`, expecting `labels.csv` with a
    /// `filename` column and the image files under `images/`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Io`] when the metadata file cannot be read
    /// and [`DatasetError::MissingColumn`] when it has no `filename`
    /// column.
    pub fn new(
        root: &Path,
        transform: XrayTransform,
        augment: Option<Augmentation>,
    ) -> Result<Self, DatasetError> {
        let labels_path = root.join("labels.csv");
        let table = CsvTable::read(&labels_path)?;
        let filename_col = table.column(&labels_path, "filename")?;

        let metadata = table
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| Metadata {
                patient_id: (FIRST_PATIENT_ID + i).to_string(),
                filename: row.get(filename_col).cloned().unwrap_or_default(),
            })
            .collect();

        let mut label = Array1::zeros(PATHOLOGIES.len());
        if let Some(idx) = pathology_index("No Finding") {
            label[idx] = 1.0;
        }

        Ok(Self {
            images_dir: root.join("images"),
            metadata,
            label,
            transform,
            augment,
        })
    }

    /// The constant per-example label vector.
    pub fn label(&self) -> &Array1<f32> {
        &self.label
    }
}

impl Dataset for ShenzhenDataset {
    fn len(&self) -> usize {
        self.metadata.len()
    }

    fn example(&self, idx: usize, rng: &mut dyn RngCore) -> Result<Example, DatasetError> {
        let meta = self
            .metadata
            .get(idx)
            .ok_or(DatasetError::IndexOutOfRange {
                index: idx,
                len: self.metadata.len(),
            })?;
        let image = load_image(
            &self.images_dir.join(&meta.filename),
            Self::MAX_VALUE,
            self.augment.as_ref(),
            &self.transform,
            rng,
        )?;
        Ok(Example {
            image,
            label: self.label.clone(),
            index: idx,
        })
    }

    fn labels(&self) -> Array2<f32> {
        tiled_labels(&self.label, self.metadata.len())
    }

    fn metadata(&self, idx: usize) -> Option<&Metadata> {
        self.metadata.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::test_support::write_gray_png;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn fixture(dir: &Path) {
        std::fs::create_dir_all(dir.join("images")).unwrap();
        std::fs::write(dir.join("labels.csv"), "filename\na.png\nb.png\nc.png\n").unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            write_gray_png(&dir.join("images").join(name), 32, 40);
        }
    }

    #[test]
    fn every_label_is_one_hot_at_no_finding() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let dataset =
            ShenzhenDataset::new(dir.path(), XrayTransform::default(), None).unwrap();

        assert_eq!(dataset.len(), 3);
        let labels = dataset.labels();
        for row in labels.rows() {
            let nonzero: Vec<usize> = row
                .iter()
                .enumerate()
                .filter(|&(_, &v)| v != 0.0)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(nonzero, vec![pathology_index("No Finding").unwrap()]);
        }
    }

    #[test]
    fn examples_come_out_square_and_normalised() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let dataset =
            ShenzhenDataset::new(dir.path(), XrayTransform::default(), None).unwrap();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(20);
        let example = dataset.example(1, &mut rng).unwrap();
        assert_eq!(example.image.dim(), (224, 224));
        assert_eq!(example.index, 1);
        assert!(example.image.iter().all(|&v| (-1024.0..=1024.0).contains(&v)));
    }

    #[test]
    fn patient_ids_start_at_one_thousand() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let dataset =
            ShenzhenDataset::new(dir.path(), XrayTransform::default(), None).unwrap();
        assert_eq!(dataset.metadata(0).unwrap().patient_id, "1000");
        assert_eq!(dataset.metadata(2).unwrap().patient_id, "1002");
    }

    #[test]
    fn missing_image_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("labels.csv"), "filename\nghost.png\n").unwrap();
        let dataset =
            ShenzhenDataset::new(dir.path(), XrayTransform::default(), None).unwrap();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        assert!(matches!(
            dataset.example(0, &mut rng),
            Err(DatasetError::Decode { .. })
        ));
    }
}
