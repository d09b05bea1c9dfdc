use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use ndarray::ArrayView2;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use cxr::config::{ClassifierKind, Config};
use cxr::datasets::{
    Augmentation, CombinedDataset, CovidDataset, Dataset, ShenzhenDataset, XrayTransform,
    PATHOLOGIES,
};
use cxr::features::FeatureExtractor;
use cxr::models::build_classifier;
use cxr::pca::Pca;

#[derive(Parser)]
#[command(name = "cxr-pipeline")]
#[command(about = "Classical-feature chest X-ray classification pipeline")]
struct Cli {
    /// Random seed for augmentation and stochastic estimators
    #[arg(long, default_value = "20")]
    seed: u64,

    /// Classifier to train (baseline, logistic, linear-svm, k-nn,
    /// decision-tree, random-forest, adaboost, gaussian-nb)
    #[arg(long, default_value = "logistic")]
    classifier: ClassifierKind,

    /// Reduce features with PCA before classification
    #[arg(long)]
    pca: bool,

    /// Number of dimensions to keep after PCA
    #[arg(long, default_value = "1000")]
    pca_out_dim: usize,

    /// Enable the local-binary-pattern descriptor
    #[arg(long)]
    lbp: bool,

    /// Enable the histogram-of-oriented-gradients descriptor
    #[arg(long)]
    hog: bool,

    /// Enable the FFT magnitude-spectrum descriptor
    #[arg(long)]
    fft: bool,

    /// ONNX model whose pooled activations are appended as features
    #[arg(long)]
    nn_model: Option<PathBuf>,

    /// Component budget shared between the hog and fft descriptors
    #[arg(long, default_value = "10000")]
    feature_budget: usize,

    /// Apply random flips, rotations and jitter while loading images
    #[arg(long)]
    augment: bool,

    /// Root of the COVID-19 corpus (metadata.csv + images/)
    #[arg(long, default_value = "data/covid-chestxray")]
    covid_dir: PathBuf,

    /// Root of the Shenzhen corpus (labels.csv + images/)
    #[arg(long, default_value = "data/shenzhen")]
    shenzhen_dir: PathBuf,
}

impl Cli {
    fn into_config(self) -> (Config, PathBuf, PathBuf) {
        let config = Config {
            seed: self.seed,
            classifier: self.classifier,
            pca: self.pca,
            pca_out_dim: self.pca_out_dim,
            lbp: self.lbp,
            hog: self.hog,
            fft: self.fft,
            nn_model: self.nn_model,
            feature_budget: self.feature_budget,
            augment: self.augment,
        };
        (config, self.covid_dir, self.shenzhen_dir)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let (config, covid_dir, shenzhen_dir) = Cli::parse().into_config();

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
    let transform = XrayTransform::default();
    let augment = config.augment.then(Augmentation::default);

    info!("loading metadata from {} and {}", covid_dir.display(), shenzhen_dir.display());
    let covid = CovidDataset::new(&covid_dir, transform.clone(), augment.clone())
        .context("failed to open the COVID-19 dataset")?;
    let shenzhen = ShenzhenDataset::new(&shenzhen_dir, transform, augment)
        .context("failed to open the Shenzhen dataset")?;
    let dataset = CombinedDataset::new(covid, shenzhen);
    info!(
        "combined dataset: {} examples ({} covid, {} shenzhen)",
        dataset.len(),
        dataset.covid().len(),
        dataset.shenzhen().len()
    );

    let extractor = FeatureExtractor::from_config(&config)
        .context("failed to configure feature extraction")?;
    let extracted = extractor
        .extract(&dataset, &mut rng)
        .context("feature extraction failed")?;
    info!(
        "extracted {}x{} features ({} examples dropped)",
        extracted.features.nrows(),
        extracted.features.ncols(),
        extracted.dropped(dataset.len())
    );

    let features = if config.pca {
        let mut pca = Pca::new(config.pca_out_dim);
        let projected = pca
            .fit_transform(extracted.features.view())
            .context("pca failed")?;
        info!(
            "pca reduced {} -> {} dimensions",
            extracted.features.ncols(),
            pca.n_components_retained()
        );
        projected
    } else {
        extracted.features.clone()
    };

    info!("fitting {} classifier", config.classifier);
    let mut model = build_classifier(config.classifier, config.seed);
    model
        .fit(features.view(), extracted.labels.view())
        .context("training failed")?;

    let predictions = model.predict(features.view()).context("prediction failed")?;
    print_summary(
        &config,
        dataset.len(),
        extracted.dropped(dataset.len()),
        features.view(),
        predictions.view(),
        extracted.labels.view(),
        &model.degenerate_columns(),
    );
    Ok(())
}

/// Training-set agreement per pathology. Held-out evaluation lives in the
/// downstream analysis notebooks, not here.
fn print_summary(
    config: &Config,
    total: usize,
    dropped: usize,
    features: ArrayView2<f32>,
    predictions: ArrayView2<f32>,
    labels: ArrayView2<f32>,
    degenerate: &[usize],
) {
    let n = predictions.nrows();

    println!("{}", "=".repeat(64));
    println!(
        "RUN SUMMARY (classifier: {}, seed: {})",
        config.classifier, config.seed
    );
    println!("{}", "=".repeat(64));
    println!("  Examples:        {} total, {} dropped, {} used", total, dropped, n);
    println!("  Feature matrix:  {} x {}", n, features.ncols());
    println!("  Degenerate cols: {} of {}", degenerate.len(), PATHOLOGIES.len());

    println!("\n  Training agreement by pathology:");
    for (c, pathology) in PATHOLOGIES.iter().enumerate() {
        let agree = (0..n)
            .filter(|&r| predictions[[r, c]] == labels[[r, c]])
            .count();
        let marker = if degenerate.contains(&c) { " (degenerate)" } else { "" };
        println!(
            "    {:<22} {:>5.1}%{}",
            pathology,
            100.0 * agree as f64 / n as f64,
            marker
        );
    }

    let exact = (0..n)
        .filter(|&r| {
            (0..predictions.ncols()).all(|c| predictions[[r, c]] == labels[[r, c]])
        })
        .count();
    println!(
        "\n  Exact-match rows: {}/{} ({:.1}%)",
        exact,
        n,
        100.0 * exact as f64 / n as f64
    );
    println!("{}", "=".repeat(64));
}
