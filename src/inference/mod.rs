//! Future-period inference
//!
//! Reapplies the cleaning and feature pipeline in inference mode to the
//! reserved year, predicts with the fitted best model and writes the
//! `Dato`/`Tid`/`Prediksjon` CSV.

mod future;

pub use future::{predict_future, predictions_to_dataframe, write_predictions, FuturePrediction};
