//! The COVID-19 chest X-ray corpus. Labels come from the free-text
//! `finding` column: a pathology bit is set when the finding string
//! contains that pathology's name, which also covers slash-separated
//! findings such as "Pneumonia/Viral/COVID-19".

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use rand::RngCore;

use super::transforms::{Augmentation, XrayTransform};
use super::{load_image, CsvTable, Dataset, DatasetError, Example, Metadata, PATHOLOGIES};

/// Radiograph projections kept when filtering the metadata.
pub const ACCEPTED_VIEWS: [&str; 2] = ["PA", "AP"];

pub struct CovidDataset {
    images_dir: PathBuf,
    metadata: Vec<Metadata>,
    labels: Array2<f32>,
    transform: XrayTransform,
    augment: Option<Augmentation>,
}

impl CovidDataset {
    /// Raw pixel values are 8-bit.
    pub const MAX_VALUE: f32 = 255.0;

    /// Opens the dataset rooted at `root`, expecting `metadata.csv` with
    /// `patientid`, `finding`, `view` and `filename` columns and the image
    /// files under `images/`. Rows whose view is not in
    /// [`ACCEPTED_VIEWS`] are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Io`] when the metadata file cannot be read
    /// and [`DatasetError::MissingColumn`] for an incomplete header.
    pub fn new(
        root: &Path,
        transform: XrayTransform,
        augment: Option<Augmentation>,
    ) -> Result<Self, DatasetError> {
        let metadata_path = root.join("metadata.csv");
        let table = CsvTable::read(&metadata_path)?;
        let patient_col = table.column(&metadata_path, "patientid")?;
        let finding_col = table.column(&metadata_path, "finding")?;
        let view_col = table.column(&metadata_path, "view")?;
        let filename_col = table.column(&metadata_path, "filename")?;

        let mut metadata = Vec::new();
        let mut label_rows: Vec<Array1<f32>> = Vec::new();
        for row in table.rows() {
            let view = row.get(view_col).map(String::as_str).unwrap_or("");
            if !ACCEPTED_VIEWS.contains(&view) {
                continue;
            }
            let finding = row.get(finding_col).map(String::as_str).unwrap_or("");
            label_rows.push(finding_label(finding));
            metadata.push(Metadata {
                patient_id: row.get(patient_col).cloned().unwrap_or_default(),
                filename: row.get(filename_col).cloned().unwrap_or_default(),
            });
        }

        let mut labels = Array2::zeros((label_rows.len(), PATHOLOGIES.len()));
        for (i, row) in label_rows.iter().enumerate() {
            labels.row_mut(i).assign(row);
        }

        Ok(Self {
            images_dir: root.join("images"),
            metadata,
            labels,
            transform,
            augment,
        })
    }
}

/// Multi-hot label vector for one finding string.
fn finding_label(finding: &str) -> Array1<f32> {
    let mut label = Array1::zeros(PATHOLOGIES.len());
    for (i, pathology) in PATHOLOGIES.iter().enumerate() {
        if finding.contains(pathology) {
            label[i] = 1.0;
        }
    }
    label
}

impl Dataset for CovidDataset {
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
            label: self.labels.row(idx).to_owned(),
            index: idx,
        })
    }

    fn labels(&self) -> Array2<f32> {
        self.labels.clone()
    }

    fn metadata(&self, idx: usize) -> Option<&Metadata> {
        self.metadata.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::pathology_index;
    use crate::datasets::test_support::write_gray_png;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn fixture(dir: &Path) {
        std::fs::create_dir_all(dir.join("images")).unwrap();
        std::fs::write(
            dir.join("metadata.csv"),
            "patientid,finding,view,filename\n\
             2,COVID-19,PA,p2.png\n\
             3,Pneumonia/Viral/COVID-19,AP,p3.png\n\
             4,SARS,L,p4.png\n\
             5,No Finding,PA,p5.png\n",
        )
        .unwrap();
        for name in ["p2.png", "p3.png", "p5.png"] {
            write_gray_png(&dir.join("images").join(name), 24, 24);
        }
    }

    #[test]
    fn lateral_views_are_filtered_out() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let dataset = CovidDataset::new(dir.path(), XrayTransform::default(), None).unwrap();

        // Row with view "L" is dropped.
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.metadata(0).unwrap().patient_id, "2");
        assert_eq!(dataset.metadata(2).unwrap().filename, "p5.png");
    }

    #[test]
    fn findings_set_the_matching_pathology_bits() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let dataset = CovidDataset::new(dir.path(), XrayTransform::default(), None).unwrap();
        let labels = dataset.labels();

        let covid = pathology_index("COVID-19").unwrap();
        let pneumonia = pathology_index("Pneumonia").unwrap();
        let viral = pathology_index("Viral Pneumonia").unwrap();
        let no_finding = pathology_index("No Finding").unwrap();

        assert_eq!(labels[[0, covid]], 1.0);
        assert_eq!(labels[[0, pneumonia]], 0.0);

        // The slash-separated finding hits both Pneumonia and COVID-19.
        assert_eq!(labels[[1, covid]], 1.0);
        assert_eq!(labels[[1, pneumonia]], 1.0);
        assert_eq!(labels[[1, viral]], 0.0);

        assert_eq!(labels[[2, no_finding]], 1.0);
        assert_eq!(labels[[2, covid]], 0.0);
    }

    #[test]
    fn example_labels_match_the_matrix() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let dataset = CovidDataset::new(dir.path(), XrayTransform::default(), None).unwrap();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let example = dataset.example(1, &mut rng).unwrap();
        assert_eq!(example.label, dataset.labels().row(1).to_owned());
        assert_eq!(example.image.dim(), (224, 224));
    }

    #[test]
    fn missing_columns_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("metadata.csv"), "patientid,filename\n1,a.png\n")
            .unwrap();
        assert!(matches!(
            CovidDataset::new(dir.path(), XrayTransform::default(), None),
            Err(DatasetError::MissingColumn { column: "finding", .. })
        ));
    }
}
