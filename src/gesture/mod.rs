/// # Gesture Classification Pipeline
///
/// Trains a CNN-LSTM classifier on fixed-length windows of 3-axis motion
/// sensor data and labels each window with one of the configured gesture
/// classes.
///
/// ## Module Structure:
///
/// 1. **step_1_dataset_loader**: Walks the labeled class folders and keeps full-length samples
/// 2. **step_2_sample_normalizer**: Per-sample, per-channel z-score normalization
/// 3. **step_3_stratified_split**: Seeded train/test split preserving class proportions
/// 4. **step_4_lstm_cell**: Recurrent layer summarizing the convolved sequence
/// 5. **step_5_model_arch**: Fixed conv -> pool -> dropout -> LSTM -> dense topology
/// 6. **step_6_train_model**: Mini-batch Adam training with early stopping
/// 7. **step_7_evaluation**: Classification report and confusion matrix
/// 8. **step_8_model_serialization**: Weights and metadata persistence
///
/// `pipeline` runs the steps end to end through the `ClassifierEngine` trait.
pub mod pipeline;
pub mod step_1_dataset_loader;
pub mod step_2_sample_normalizer;
pub mod step_3_stratified_split;
pub mod step_4_lstm_cell;
pub mod step_5_model_arch;
pub mod step_6_train_model;
pub mod step_7_evaluation;
pub mod step_8_model_serialization;
