//! Threshold sweeps over predicted and ground truth EMG.
//!
//! Both arrays are `[samples, time, muscles]` in original units. Each
//! sample's window is independent: the forward difference never spans the
//! last step of one sample and the first step of the next.

use crate::error::{check_len, Error};
use ndarray::{s, Array2, ArrayView2, ArrayView3, Axis, Zip};
use num_traits::ToPrimitive;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct DirectionalAgreement {
    pub(crate) threshold: f64,
    /// Entries above the threshold that have a forward neighbor.
    pub(crate) masked: usize,
    /// Masked entries whose ground truth derivative is nonzero.
    pub(crate) counted: usize,
    /// Counted entries whose predicted derivative has the same sign.
    pub(crate) agreeing: usize,
    /// `agreeing / counted`, undefined when nothing is counted.
    pub(crate) fraction: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct ThresholdMetrics {
    #[serde(flatten)]
    pub(crate) agreement: DirectionalAgreement,
    /// Relative RMSE over ground truth above the threshold.
    pub(crate) relative_rmse: Option<f64>,
    /// Relative RMSE over ground truth in `(threshold, threshold + band_width)`.
    pub(crate) band_relative_rmse: Option<f64>,
}

fn check_same_shape(truth: ArrayView3<f64>, prediction: ArrayView3<f64>) -> Result<(), Error> {
    let (samples, time, muscles) = truth.dim();
    let (p_samples, p_time, p_muscles) = prediction.dim();
    check_len("prediction samples", samples, p_samples)?;
    check_len("prediction time steps", time, p_time)?;
    check_len("prediction muscles", muscles, p_muscles)
}

fn ratio(numerator: usize, denominator: usize) -> Result<Option<f64>, Error> {
    if denominator == 0 {
        return Ok(None);
    }
    let numerator = numerator.to_f64().ok_or(Error::ConvertToF64)?;
    let denominator = denominator.to_f64().ok_or(Error::ConvertToF64)?;
    Ok(Some(numerator / denominator))
}

/// `value[t] - value[t + 1]` for every step that has a forward neighbor.
fn forward_difference(window: ArrayView2<f64>) -> Array2<f64> {
    &window.slice(s![..-1, ..]) - &window.slice(s![1.., ..])
}

/// Fraction of entries above `threshold` where the predicted and ground truth
/// first derivatives share a strict sign.
pub(crate) fn directional_agreement(
    truth: ArrayView3<f64>,
    prediction: ArrayView3<f64>,
    threshold: f64,
) -> Result<DirectionalAgreement, Error> {
    check_same_shape(truth, prediction)?;

    let mut masked = 0;
    let mut counted = 0;
    let mut agreeing = 0;

    if truth.len_of(Axis(1)) >= 2 {
        for (truth_window, predicted_window) in truth.outer_iter().zip(prediction.outer_iter()) {
            let truth_delta = forward_difference(truth_window);
            let predicted_delta = forward_difference(predicted_window);

            Zip::from(truth_window.slice(s![..-1, ..]))
                .and(&truth_delta)
                .and(&predicted_delta)
                .for_each(|&value, &truth_delta, &predicted_delta| {
                    if !(value > threshold) {
                        return;
                    }
                    masked += 1;
                    if truth_delta > 0.0 {
                        counted += 1;
                        agreeing += usize::from(predicted_delta > 0.0);
                    } else if truth_delta < 0.0 {
                        counted += 1;
                        agreeing += usize::from(predicted_delta < 0.0);
                    }
                });
        }
    }

    Ok(DirectionalAgreement {
        threshold,
        masked,
        counted,
        agreeing,
        fraction: ratio(agreeing, counted)?,
    })
}

/// Mean squared error over every entry, `None` for empty arrays.
pub(crate) fn mean_squared_error(
    truth: ArrayView3<f64>,
    prediction: ArrayView3<f64>,
) -> Result<Option<f64>, Error> {
    check_same_shape(truth, prediction)?;
    if truth.is_empty() {
        return Ok(None);
    }
    let n = truth.len().to_f64().ok_or(Error::ConvertToF64)?;
    let total = Zip::from(truth)
        .and(prediction)
        .fold(0.0_f64, |acc, &t, &p| acc + (t - p).powi(2));
    Ok(Some(total / n))
}

/// `sqrt(MSE) / mean(truth)` over entries with `truth > lower` and, when
/// given, `truth < upper`.
pub(crate) fn relative_rmse(
    truth: ArrayView3<f64>,
    prediction: ArrayView3<f64>,
    lower: f64,
    upper: Option<f64>,
) -> Result<Option<f64>, Error> {
    check_same_shape(truth, prediction)?;

    let (count, squared_error, total) = Zip::from(truth).and(prediction).fold(
        (0_usize, 0.0_f64, 0.0_f64),
        |(count, squared_error, total), &t, &p| {
            if t > lower && upper.map_or(true, |upper| t < upper) {
                (count + 1, squared_error + (t - p).powi(2), total + t)
            } else {
                (count, squared_error, total)
            }
        },
    );

    if count == 0 {
        return Ok(None);
    }
    let n = count.to_f64().ok_or(Error::ConvertToF64)?;
    Ok(Some((squared_error / n).sqrt() / (total / n)))
}

pub(crate) fn threshold_sweep(
    truth: ArrayView3<f64>,
    prediction: ArrayView3<f64>,
    thresholds: &[f64],
    band_width: f64,
) -> Result<Vec<ThresholdMetrics>, Error> {
    thresholds
        .iter()
        .map(|&threshold| -> Result<_, Error> {
            Ok(ThresholdMetrics {
                agreement: directional_agreement(truth, prediction, threshold)?,
                relative_rmse: relative_rmse(truth, prediction, threshold, None)?,
                band_relative_rmse: relative_rmse(
                    truth,
                    prediction,
                    threshold,
                    Some(threshold + band_width),
                )?,
            })
        })
        .collect()
}

/// Integer thresholds `0..count`.
pub(crate) fn integer_thresholds(count: u32) -> Vec<f64> {
    (0..count).map(f64::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use ndarray::{array, Array3};

    /// Two samples, four time steps, two muscles.
    fn truth() -> Array3<f64> {
        array![
            [[10.0, 50.0], [20.0, 40.0], [15.0, 40.0], [30.0, 35.0]],
            [[5.0, 60.0], [25.0, 70.0], [12.0, 65.0], [8.0, 66.0]],
        ]
    }

    mod directional_agreement_tests {
        use super::*;

        #[test]
        fn perfect_prediction_agrees_everywhere() {
            let truth = truth();
            for threshold in integer_thresholds(70) {
                let agreement =
                    directional_agreement(truth.view(), truth.view(), threshold).unwrap();
                if agreement.counted > 0 {
                    assert_eq!(agreement.fraction, Some(1.0));
                } else {
                    assert_eq!(agreement.fraction, None);
                }
            }
        }

        #[test]
        fn threshold_above_maximum_is_undefined() {
            let truth = truth();
            let agreement = directional_agreement(truth.view(), truth.view(), 100.0).unwrap();
            assert_eq!(agreement.masked, 0);
            assert_eq!(agreement.counted, 0);
            assert_eq!(agreement.fraction, None);
        }

        #[test]
        fn counts_sign_matches() {
            let truth = array![[[10.0], [20.0], [15.0], [15.0], [0.0]]];
            // deltas: truth -10, 5, 0, 15; prediction -1, -1, 3, 2
            let prediction = array![[[1.0], [2.0], [3.0], [0.0], [-2.0]]];
            let agreement =
                directional_agreement(truth.view(), prediction.view(), 0.0).unwrap();
            assert_eq!(agreement.masked, 4);
            // zero ground truth derivative is left out
            assert_eq!(agreement.counted, 3);
            assert_eq!(agreement.agreeing, 2);
            assert_approx_eq!(agreement.fraction.unwrap(), 2.0 / 3.0);
        }

        #[test]
        fn threshold_is_strict() {
            let truth = array![[[10.0], [20.0], [15.0]]];
            let agreement = directional_agreement(truth.view(), truth.view(), 10.0).unwrap();
            assert_eq!(agreement.masked, 1);
        }

        #[test]
        fn last_step_of_each_sample_is_excluded() {
            // a derivative across the sample boundary would be 9 - 1 > 0
            let truth = array![[[5.0], [9.0]], [[1.0], [7.0]]];
            let prediction = array![[[5.0], [9.0]], [[1.0], [7.0]]];
            let agreement =
                directional_agreement(truth.view(), prediction.view(), 0.0).unwrap();
            assert_eq!(agreement.masked, 2);
            assert_eq!(agreement.counted, 2);
        }

        #[test]
        fn single_step_windows() {
            let truth = array![[[5.0]], [[9.0]]];
            let agreement = directional_agreement(truth.view(), truth.view(), 0.0).unwrap();
            assert_eq!(agreement.masked, 0);
            assert_eq!(agreement.fraction, None);
        }

        #[test]
        fn shape_mismatch() {
            let truth = truth();
            let prediction = Array3::zeros((2, 3, 2));
            assert!(matches!(
                directional_agreement(truth.view(), prediction.view(), 0.0),
                Err(Error::ShapeMismatch(_, 4, 3))
            ));
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn mse() {
            let truth = array![[[1.0, 2.0], [3.0, 4.0]]];
            let prediction = array![[[1.0, 0.0], [3.0, 8.0]]];
            assert_approx_eq!(
                mean_squared_error(truth.view(), prediction.view())
                    .unwrap()
                    .unwrap(),
                5.0
            );
        }

        #[test]
        fn mse_of_empty_arrays() {
            let empty = Array3::<f64>::zeros((0, 3, 2));
            assert_eq!(
                mean_squared_error(empty.view(), empty.view()).unwrap(),
                None
            );
        }

        #[test]
        fn relative_rmse_above_threshold() {
            let truth = array![[[10.0], [20.0], [30.0]]];
            let prediction = array![[[0.0], [23.0], [26.0]]];
            // only 20 and 30 qualify: sqrt((9 + 16) / 2) / 25
            assert_approx_eq!(
                relative_rmse(truth.view(), prediction.view(), 15.0, None)
                    .unwrap()
                    .unwrap(),
                12.5_f64.sqrt() / 25.0
            );
        }

        #[test]
        fn relative_rmse_within_band() {
            let truth = array![[[10.0], [20.0], [30.0]]];
            let prediction = array![[[0.0], [23.0], [26.0]]];
            assert_approx_eq!(
                relative_rmse(truth.view(), prediction.view(), 15.0, Some(25.0))
                    .unwrap()
                    .unwrap(),
                3.0 / 20.0
            );
            assert_eq!(
                relative_rmse(truth.view(), prediction.view(), 40.0, None).unwrap(),
                None
            );
        }

        #[test]
        fn band_bounds_are_exclusive() {
            let truth = array![[[10.0], [20.0], [30.0]]];
            let prediction = array![[[0.0], [23.0], [26.0]]];
            assert_eq!(
                relative_rmse(truth.view(), prediction.view(), 20.0, Some(30.0)).unwrap(),
                None
            );
            assert_approx_eq!(
                relative_rmse(truth.view(), prediction.view(), 10.0, Some(30.0))
                    .unwrap()
                    .unwrap(),
                3.0 / 20.0
            );
        }
    }

    #[test]
    fn sweep_covers_every_threshold() {
        let truth = truth();
        let thresholds = integer_thresholds(40);
        let rows = threshold_sweep(truth.view(), truth.view(), &thresholds, 10.0).unwrap();
        assert_eq!(rows.len(), 40);
        assert_eq!(rows[0].agreement.threshold, 0.0);
        assert_eq!(rows[39].agreement.threshold, 39.0);
        for row in &rows {
            assert_eq!(row.relative_rmse, Some(0.0));
        }
    }
}
