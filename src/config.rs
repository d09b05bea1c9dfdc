use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

/// Which estimator the one-vs-rest wrapper drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate", rename_all = "kebab-case")
)]
pub enum ClassifierKind {
    /// Predicts zero for every pathology; the floor every real model must beat.
    Baseline,
    Logistic,
    LinearSvm,
    KNearest,
    DecisionTree,
    RandomForest,
    AdaBoost,
    GaussianNb,
}

impl ClassifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierKind::Baseline => "baseline",
            ClassifierKind::Logistic => "logistic",
            ClassifierKind::LinearSvm => "linear-svm",
            ClassifierKind::KNearest => "k-nn",
            ClassifierKind::DecisionTree => "decision-tree",
            ClassifierKind::RandomForest => "random-forest",
            ClassifierKind::AdaBoost => "adaboost",
            ClassifierKind::GaussianNb => "gaussian-nb",
        }
    }
}

impl Display for ClassifierKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised classifier name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownClassifier(pub String);

impl Display for UnknownClassifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown classifier '{}'", self.0)
    }
}

impl std::error::Error for UnknownClassifier {}

impl FromStr for ClassifierKind {
    type Err = UnknownClassifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "baseline" => Ok(ClassifierKind::Baseline),
            "logistic" | "logisticregression" => Ok(ClassifierKind::Logistic),
            "linear-svm" | "svm" | "svc" => Ok(ClassifierKind::LinearSvm),
            "k-nn" | "knn" => Ok(ClassifierKind::KNearest),
            "decision-tree" | "decisiontree" => Ok(ClassifierKind::DecisionTree),
            "random-forest" | "randomforest" => Ok(ClassifierKind::RandomForest),
            "adaboost" => Ok(ClassifierKind::AdaBoost),
            "gaussian-nb" | "gaussiannb" => Ok(ClassifierKind::GaussianNb),
            other => Err(UnknownClassifier(other.to_string())),
        }
    }
}

/// Run configuration, built once at startup and immutable afterwards.
///
/// The seed feeds a single `Xoshiro256PlusPlus` generator that is threaded
/// through dataset augmentation; stochastic estimators (the SVM and the
/// forest) receive the same seed through the classifier registry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct Config {
    pub seed: u64,
    pub classifier: ClassifierKind,
    pub pca: bool,
    pub pca_out_dim: usize,
    pub lbp: bool,
    pub hog: bool,
    pub fft: bool,
    /// Enables deep embedding features when set.
    pub nn_model: Option<PathBuf>,
    /// Component budget shared between the hog and fft descriptors.
    pub feature_budget: usize,
    pub augment: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: 20,
            classifier: ClassifierKind::Logistic,
            pca: false,
            pca_out_dim: 1000,
            lbp: true,
            hog: false,
            fft: false,
            nn_model: None,
            feature_budget: 10_000,
            augment: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_run() {
        let cfg = Config::default();
        assert_eq!(cfg.seed, 20);
        assert_eq!(cfg.classifier, ClassifierKind::Logistic);
        assert!(!cfg.pca);
        assert_eq!(cfg.pca_out_dim, 1000);
        assert!(cfg.lbp);
        assert!(!cfg.hog);
        assert!(!cfg.fft);
        assert!(cfg.nn_model.is_none());
    }

    #[test]
    fn classifier_names_round_trip() {
        for kind in [
            ClassifierKind::Baseline,
            ClassifierKind::Logistic,
            ClassifierKind::LinearSvm,
            ClassifierKind::KNearest,
            ClassifierKind::DecisionTree,
            ClassifierKind::RandomForest,
            ClassifierKind::AdaBoost,
            ClassifierKind::GaussianNb,
        ] {
            assert_eq!(kind.as_str().parse::<ClassifierKind>().unwrap(), kind);
        }
    }

    #[test]
    fn accepts_sklearn_style_aliases() {
        assert_eq!(
            "LogisticRegression".parse::<ClassifierKind>().unwrap(),
            ClassifierKind::Logistic
        );
        assert_eq!("SVC".parse::<ClassifierKind>().unwrap(), ClassifierKind::LinearSvm);
    }

    #[test]
    fn rejects_unknown_names() {
        assert!("qda".parse::<ClassifierKind>().is_err());
    }
}
