use crate::error::{check_len, Error};
use indicatif::ProgressBar;
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis, Zip};
use ordered_float::NotNan;
use std::{fmt, str::FromStr};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Distance {
    /// Sum of absolute differences.
    L1,
    /// Euclidean distance.
    L2,
}

impl Default for Distance {
    fn default() -> Self {
        Self::L2
    }
}

impl FromStr for Distance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l1" => Ok(Self::L1),
            "l2" => Ok(Self::L2),
            _ => Err(Error::ParseDistance(s.to_owned())),
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L1 => write!(f, "l1"),
            Self::L2 => write!(f, "l2"),
        }
    }
}

impl Distance {
    pub(crate) fn between(self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let zip = Zip::from(a).and(b);
        match self {
            Self::L1 => zip.fold(0.0_f64, |acc, &x, &y| acc + (x - y).abs()),
            Self::L2 => zip
                .fold(0.0_f64, |acc, &x, &y| acc + (x - y).powi(2))
                .sqrt(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Neighbor {
    pub(crate) index: usize,
    pub(crate) distance: f64,
}

#[derive(Debug)]
struct TrainingSet {
    /// `[N, D]`
    features: Array2<f64>,
    /// `[N, time, muscles]`
    targets: Array3<f64>,
}

/// Memorizes training rows and predicts the target of the closest one.
///
/// The search is a brute-force scan; ties go to the lowest training index.
#[derive(Debug, Default)]
pub(crate) struct NearestNeighbor {
    training: Option<TrainingSet>,
}

impl NearestNeighbor {
    pub(crate) fn fit(&mut self, features: Array2<f64>, targets: Array3<f64>) -> Result<(), Error> {
        check_len(
            "training target rows",
            features.nrows(),
            targets.len_of(Axis(0)),
        )?;
        self.training = Some(TrainingSet { features, targets });
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.training
            .as_ref()
            .map_or(0, |training| training.features.nrows())
    }

    fn training(&self) -> Result<&TrainingSet, Error> {
        self.training
            .as_ref()
            .filter(|training| training.features.nrows() > 0)
            .ok_or(Error::EmptyTrainingSet)
    }

    pub(crate) fn nearest(
        &self,
        query: ArrayView1<f64>,
        distance: Distance,
    ) -> Result<Neighbor, Error> {
        let training = self.training()?;
        check_len(
            "query feature dimension",
            training.features.ncols(),
            query.len(),
        )?;

        let distances = training
            .features
            .outer_iter()
            .enumerate()
            .map(|(index, row)| {
                let d = distance.between(row, query);
                NotNan::new(d)
                    .map(|d| (index, d))
                    .map_err(|e| Error::NanDistance(e, index))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // min_by_key keeps the first of equal minima
        let (index, distance) = distances
            .into_iter()
            .min_by_key(|&(_, d)| d)
            .ok_or(Error::EmptyTrainingSet)?;
        Ok(Neighbor {
            index,
            distance: distance.into_inner(),
        })
    }

    /// Predict a `[queries, time, muscles]` target for every `[queries, D]` row.
    pub(crate) fn predict(
        &self,
        queries: ArrayView2<f64>,
        distance: Distance,
        progress: Option<&ProgressBar>,
    ) -> Result<Array3<f64>, Error> {
        let training = self.training()?;
        let (_, time, muscles) = training.targets.dim();
        let mut predictions = Array3::zeros((queries.nrows(), time, muscles));

        for (i, (query, mut prediction)) in queries
            .outer_iter()
            .zip(predictions.outer_iter_mut())
            .enumerate()
        {
            let neighbor = self.nearest(query, distance)?;
            trace!(
                query = i,
                neighbor = neighbor.index,
                distance = neighbor.distance
            );
            prediction.assign(&training.targets.index_axis(Axis(0), neighbor.index));

            if let Some(progress) = progress {
                progress.inc(1);
            }
        }

        Ok(predictions)
    }
}
