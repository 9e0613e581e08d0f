use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use num_traits::cast::ToPrimitive;
use std::path::PathBuf;
use structopt::StructOpt;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;

mod camera;
mod dataset;
mod error;
mod evaluation;
mod features;
mod nearest_neighbor;
mod pipeline;
mod pose;
mod projection;
mod report;

fn progress_bar(show: bool, len: usize, prefix: &'static str) -> Option<ProgressBar> {
    if !show {
        return None;
    }
    let pb = ProgressBar::new(len.to_u64()?).with_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40}] {pos}/{len} {wide_msg}")
            .progress_chars("=> "),
    );
    pb.set_prefix(prefix);
    Some(pb)
}

#[derive(structopt::StructOpt)]
struct Opt {
    /// JSON dataset with `train` and `val` batch lists.
    #[structopt(required = true)]
    dataset: PathBuf,

    /// Nearest neighbor distance: l1 or l2.
    #[structopt(short, long, default_value = "l2")]
    distance: nearest_neighbor::Distance,

    /// Evaluate directional agreement at thresholds 0, 1, ..., N - 1.
    #[structopt(short = "-n", long, default_value = "40")]
    thresholds: u32,

    /// Width of the ground truth band used for the banded relative RMSE.
    #[structopt(short, long, default_value = "10")]
    band_width: f64,

    #[structopt(flatten)]
    camera: camera::CameraConfig,

    #[structopt(short, long, default_value = "info", env = "RUST_LOG")]
    log_level: tracing_subscriber::filter::EnvFilter,

    /// Write the report here instead of stdout.
    #[structopt(short, long)]
    output: Option<PathBuf>,

    /// Write predicted EMG, in original units, to this file.
    #[structopt(short, long)]
    predictions: Option<PathBuf>,

    #[structopt(short, long)]
    show_progress: bool,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    let dataset_path = &opt.dataset;

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(opt.log_level),
    )?;

    opt.camera
        .validate()
        .context("invalid camera configuration")?;

    let dataset = dataset::Dataset::load(dataset_path)
        .with_context(|| format!("failed loading dataset {:?}", dataset_path))?;
    info!(
        message = "loaded dataset",
        train_batches = dataset.train.len(),
        val_batches = dataset.val.len()
    );

    let pb_train = progress_bar(opt.show_progress, dataset.train.len(), "train");
    let train =
        pipeline::build_feature_set("train", &dataset.train, &opt.camera, pb_train.as_ref())
            .context("failed building training features")?;
    if let Some(pb) = pb_train {
        pb.finish_and_clear();
    }

    let pb_val = progress_bar(opt.show_progress, dataset.val.len(), "val");
    let val = pipeline::build_feature_set("val", &dataset.val, &opt.camera, pb_val.as_ref())
        .context("failed building validation features")?;
    if let Some(pb) = pb_val {
        pb.finish_and_clear();
    }

    info!(
        message = "built feature sets",
        train_samples = train.len(),
        val_samples = val.len(),
        dimension = train.dimension()
    );

    let train_samples = train.len();
    let feature_dimension = train.dimension();
    let mut model = nearest_neighbor::NearestNeighbor::default();
    model
        .fit(train.features, train.targets)
        .context("failed fitting nearest neighbor model")?;

    let pb_predict = progress_bar(opt.show_progress, val.len(), "predict");
    let predicted = model
        .predict(val.features.view(), opt.distance, pb_predict.as_ref())
        .context("failed predicting validation emg")?;
    if let Some(pb) = pb_predict {
        pb.finish_and_clear();
    }
    info!(
        message = "predicted validation emg",
        training_rows = model.len(),
        distance = %opt.distance
    );

    let truth = pipeline::rescale(val.targets.view());
    let predicted = pipeline::rescale(predicted.view());

    let thresholds = evaluation::integer_thresholds(opt.thresholds);
    let report = report::EvaluationReport {
        distance: opt.distance,
        train_samples,
        val_samples: val.len(),
        feature_dimension,
        mean_squared_error: evaluation::mean_squared_error(truth.view(), predicted.view())
            .context("failed computing mean squared error")?,
        thresholds: evaluation::threshold_sweep(
            truth.view(),
            predicted.view(),
            &thresholds,
            opt.band_width,
        )
        .context("failed evaluating predictions")?,
    };
    report.log();

    if let Some(path) = opt.predictions.as_deref() {
        report::save_predictions(path, &predicted)
            .with_context(|| format!("failed saving predictions to {:?}", path))?;
    }

    report
        .save(opt.output.as_deref())
        .context("failed saving evaluation report")?;

    Ok(())
}
