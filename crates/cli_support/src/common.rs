use clap::Args;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Raw/processed dataset directories shared by dataset tooling.
#[derive(Debug, Clone, Args)]
pub struct DataDirArgs {
    /// Directory holding list_attr_celeba.csv and images_celeba/.
    #[arg(long, env = "FACE_DATASET_RAW_DIR", default_value = "data/raw")]
    pub raw_dir: PathBuf,
    /// Directory holding labels.csv and images/.
    #[arg(long, env = "FACE_DATASET_PROCESSED_DIR", default_value = "data/testing")]
    pub processed_dir: PathBuf,
}

/// Split and loader options for `setup`.
#[derive(Debug, Clone, Args)]
pub struct SetupArgs {
    /// Portion of the processed images to use, in (0, 1].
    #[arg(long, default_value_t = 1.0)]
    pub usage_fraction: f64,
    /// Train/val/test ratios, comma separated.
    #[arg(long, value_delimiter = ',', default_values_t = [0.6, 0.2, 0.2])]
    pub split: Vec<f64>,
    /// Keep only a short prefix of every split.
    #[arg(long, default_value_t = false)]
    pub light_weight: bool,
    /// Prefix length used with --light-weight.
    #[arg(long, default_value_t = 5)]
    pub light_weight_amount: usize,
    /// Fail when label rows and images differ in number.
    #[arg(long, default_value_t = false)]
    pub strict_alignment: bool,
    /// Samples per batch.
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,
    /// Shuffle each loader (seeded with --seed if given).
    #[arg(long, default_value_t = false)]
    pub shuffle: bool,
    #[arg(long)]
    pub seed: Option<u64>,
}

impl SetupArgs {
    /// Ratios as a fixed triple; `None` unless exactly three were given.
    pub fn split_triple(&self) -> Option<[f64; 3]> {
        <[f64; 3]>::try_from(self.split.as_slice()).ok()
    }
}

/// Listen address for HTTP services.
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Socket address to bind.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind: String,
}
