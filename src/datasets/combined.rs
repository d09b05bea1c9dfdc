//! Concatenation of the COVID-19 and Shenzhen corpora. The combination is
//! used for evaluation because it balances the "No Finding" class far
//! better than the COVID-19 corpus alone.

use ndarray::Array2;
use rand::RngCore;

use super::{CovidDataset, Dataset, DatasetError, Example, Metadata, ShenzhenDataset};

/// COVID-19 examples first, Shenzhen examples after them. Indices are not
/// deduplicated; the length is simply the sum of the parts.
pub struct CombinedDataset {
    covid: CovidDataset,
    shenzhen: ShenzhenDataset,
}

impl CombinedDataset {
    pub fn new(covid: CovidDataset, shenzhen: ShenzhenDataset) -> Self {
        Self { covid, shenzhen }
    }

    pub fn covid(&self) -> &CovidDataset {
        &self.covid
    }

    pub fn shenzhen(&self) -> &ShenzhenDataset {
        &self.shenzhen
    }
}

impl Dataset for CombinedDataset {
    fn len(&self) -> usize {
        self.covid.len() + self.shenzhen.len()
    }

    fn example(&self, idx: usize, rng: &mut dyn RngCore) -> Result<Example, DatasetError> {
        if idx >= self.len() {
            return Err(DatasetError::IndexOutOfRange {
                index: idx,
                len: self.len(),
            });
        }
        let mut example = if idx < self.covid.len() {
            self.covid.example(idx, rng)?
        } else {
            self.shenzhen.example(idx - self.covid.len(), rng)?
        };
        // Re-index into the combined coordinate space.
        example.index = idx;
        Ok(example)
    }

    fn labels(&self) -> Array2<f32> {
        let covid = self.covid.labels();
        let shenzhen = self.shenzhen.labels();
        let mut labels = Array2::zeros((self.len(), covid.ncols()));
        labels
            .slice_mut(ndarray::s![..covid.nrows(), ..])
            .assign(&covid);
        labels
            .slice_mut(ndarray::s![covid.nrows().., ..])
            .assign(&shenzhen);
        labels
    }

    fn metadata(&self, idx: usize) -> Option<&Metadata> {
        if idx < self.covid.len() {
            self.covid.metadata(idx)
        } else {
            self.shenzhen.metadata(idx - self.covid.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::test_support::write_gray_png;
    use crate::datasets::transforms::XrayTransform;
    use crate::datasets::pathology_index;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::path::Path;

    fn covid_fixture(dir: &Path) -> CovidDataset {
        std::fs::create_dir_all(dir.join("images")).unwrap();
        std::fs::write(
            dir.join("metadata.csv"),
            "patientid,finding,view,filename\n10,COVID-19,PA,c0.png\n11,SARS,AP,c1.png\n",
        )
        .unwrap();
        write_gray_png(&dir.join("images/c0.png"), 16, 16);
        write_gray_png(&dir.join("images/c1.png"), 16, 16);
        CovidDataset::new(dir, XrayTransform::default(), None).unwrap()
    }

    fn shenzhen_fixture(dir: &Path) -> ShenzhenDataset {
        std::fs::create_dir_all(dir.join("images")).unwrap();
        std::fs::write(dir.join("labels.csv"), "filename\ns0.png\ns1.png\ns2.png\n").unwrap();
        for name in ["s0.png", "s1.png", "s2.png"] {
            write_gray_png(&dir.join("images").join(name), 16, 16);
        }
        ShenzhenDataset::new(dir, XrayTransform::default(), None).unwrap()
    }

    #[test]
    fn length_is_the_sum_of_the_parts() {
        let covid_dir = tempfile::tempdir().unwrap();
        let shenzhen_dir = tempfile::tempdir().unwrap();
        let combined = CombinedDataset::new(
            covid_fixture(covid_dir.path()),
            shenzhen_fixture(shenzhen_dir.path()),
        );
        assert_eq!(combined.len(), 2 + 3);
        assert_eq!(combined.labels().nrows(), 5);
    }

    #[test]
    fn indexing_dispatches_and_reindexes() {
        let covid_dir = tempfile::tempdir().unwrap();
        let shenzhen_dir = tempfile::tempdir().unwrap();
        let combined = CombinedDataset::new(
            covid_fixture(covid_dir.path()),
            shenzhen_fixture(shenzhen_dir.path()),
        );

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let covid_side = combined.example(1, &mut rng).unwrap();
        let shenzhen_side = combined.example(2, &mut rng).unwrap();

        assert_eq!(covid_side.index, 1);
        assert_eq!(shenzhen_side.index, 2);

        let sars = pathology_index("SARS").unwrap();
        let no_finding = pathology_index("No Finding").unwrap();
        assert_eq!(covid_side.label[sars], 1.0);
        assert_eq!(shenzhen_side.label[no_finding], 1.0);

        assert_eq!(combined.metadata(0).unwrap().patient_id, "10");
        assert_eq!(combined.metadata(2).unwrap().patient_id, "1000");
    }

    #[test]
    fn out_of_range_is_an_error() {
        let covid_dir = tempfile::tempdir().unwrap();
        let shenzhen_dir = tempfile::tempdir().unwrap();
        let combined = CombinedDataset::new(
            covid_fixture(covid_dir.path()),
            shenzhen_fixture(shenzhen_dir.path()),
        );
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        assert!(matches!(
            combined.example(5, &mut rng),
            Err(DatasetError::IndexOutOfRange { index: 5, len: 5 })
        ));
    }
}
