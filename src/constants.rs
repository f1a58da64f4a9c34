// Gesture classes, in label order: Circular, Nodding, Swiping
pub const CLASS_NAMES: [&str; 3] = ["C", "N", "S"];

// Axis columns expected in every sample CSV
pub const AXIS_COLUMNS: [&str; 3] = ["x", "y", "z"];

// Sample geometry
pub const SAMPLE_LENGTH: usize = 101; // 1 second at 100Hz
pub const NUM_FEATURES: usize = 3;

// Data preprocessing
pub const NORMALIZATION_EPSILON: f64 = 1e-6;
pub const TEST_SPLIT_RATIO: f64 = 0.2; // 20% of samples held out for testing
pub const VALIDATION_SPLIT_RATIO: f64 = 0.2; // 20% of the train split for validation
pub const RANDOM_SEED: u64 = 42;

// Input files
pub const SAMPLE_FILE_EXTENSION: &str = "csv";
pub const DATA_PATH: &str = "data";

// Model topology
pub const CONV_FILTERS: usize = 32;
pub const CONV_KERNEL_SIZE: usize = 3;
pub const POOL_SIZE: usize = 2;
pub const DEFAULT_DROPOUT: f64 = 0.3;
pub const LSTM_HIDDEN_SIZE: usize = 64;
pub const DENSE_UNITS: usize = 32;

// Training
pub const DEFAULT_EPOCHS: usize = 30;
pub const DEFAULT_BATCH_SIZE: usize = 16;
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;
pub const EARLY_STOPPING_PATIENCE: usize = 5;

// Output paths
pub const MODEL_FILE_NAME: &str = "motion_model_cnn_lstm";
pub const CONFUSION_MATRIX_FILE_NAME: &str = "confusion_matrix.png";
pub const EXPERIMENT_DIR: &str = "experiments";

// Motion intensity bands (planar speed, sensor units)
pub const MODERATE_SPEED_THRESHOLD: f64 = 1.5;
pub const VIGOROUS_SPEED_THRESHOLD: f64 = 4.0;
