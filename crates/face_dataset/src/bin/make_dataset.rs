use clap::Parser;
use cli_support::{init_tracing, DataDirArgs, SetupArgs};
use face_dataset::{
    AlignmentPolicy, DataModule, DataPaths, LoaderConfig, SetupOptions, SplitKind, SplitRatios,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "make_dataset",
    about = "Process raw CelebA images/labels and check the resulting splits"
)]
struct Args {
    #[command(flatten)]
    dirs: DataDirArgs,
    #[command(flatten)]
    setup: SetupArgs,
    /// Only process the first 5000 raw images.
    #[arg(long, default_value_t = false)]
    reduced: bool,
    /// Skip raw processing and only load the processed directory.
    #[arg(long, default_value_t = false)]
    skip_process: bool,
    /// JSON file with setup options; replaces the split/light-weight/alignment flags.
    #[arg(long)]
    setup_config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let paths = DataPaths {
        raw_data_dir: args.dirs.raw_dir.clone(),
        processed_data_dir: args.dirs.processed_dir.clone(),
    };
    let mut module = DataModule::from_paths(paths, args.setup.batch_size).with_loader_config(
        LoaderConfig {
            shuffle: args.setup.shuffle,
            seed: args.setup.seed,
            drop_last: false,
        },
    );

    if !args.skip_process {
        let summary = module.process_raw_data(args.reduced)?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    let opts = match &args.setup_config {
        Some(path) => SetupOptions::from_json_path(path)?,
        None => SetupOptions {
            usage_fraction: args.setup.usage_fraction,
            split: SplitRatios::from(
                args.setup
                    .split_triple()
                    .ok_or_else(|| anyhow::anyhow!("--split takes exactly three ratios"))?,
            ),
            light_weight: args.setup.light_weight,
            light_weight_amount: args.setup.light_weight_amount,
            alignment: if args.setup.strict_alignment {
                AlignmentPolicy::Strict
            } else {
                AlignmentPolicy::Truncate
            },
        },
    };
    let state = module.setup(&opts)?;
    println!("split sizes: {:?}", state.boundaries.sizes());

    for split in [SplitKind::Train, SplitKind::Val, SplitKind::Test] {
        let loader = module.dataloader(split)?;
        println!(
            "{split}: {} samples in {} batches of {}",
            module.dataset(split)?.len(),
            loader.num_batches(),
            loader.batch_size()
        );
    }

    if !module.train_dataset()?.is_empty() {
        let example = module.show_example()?;
        println!(
            "example: pixel_values {:?}, labels {:?}",
            example.pixel_values.shape(),
            example.labels
        );
    }
    Ok(())
}
