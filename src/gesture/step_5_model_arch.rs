// External imports
use burn::module::Module;
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::loss::CrossEntropyLossConfig;
use burn::nn::pool::{MaxPool1d, MaxPool1dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Int, Tensor};
use serde::{Deserialize, Serialize};

// Internal imports
use super::step_4_lstm_cell::GestureLstm;
use crate::constants;

/// Layer sizes of the gesture classifier
///
/// The defaults are the one architecture the pipeline trains. The struct
/// exists so a saved model can be rebuilt from its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTopology {
    pub sample_length: usize,
    pub num_features: usize,
    pub conv_filters: usize,
    pub kernel_size: usize,
    pub pool_size: usize,
    pub dropout: f64,
    pub lstm_hidden: usize,
    pub dense_units: usize,
    pub num_classes: usize,
}

impl ModelTopology {
    /// Default topology for the given input geometry and class count
    pub fn new(sample_length: usize, num_features: usize, num_classes: usize) -> Self {
        Self {
            sample_length,
            num_features,
            conv_filters: constants::CONV_FILTERS,
            kernel_size: constants::CONV_KERNEL_SIZE,
            pool_size: constants::POOL_SIZE,
            dropout: constants::DEFAULT_DROPOUT,
            lstm_hidden: constants::LSTM_HIDDEN_SIZE,
            dense_units: constants::DENSE_UNITS,
            num_classes,
        }
    }

    /// Sequence length seen by the LSTM after the valid convolution and pooling
    pub fn pooled_length(&self) -> usize {
        let conv_len = self.sample_length.saturating_sub(self.kernel_size - 1);
        conv_len / self.pool_size
    }

    /// Build a freshly initialized model on `device`
    pub fn init<B: Backend>(&self, device: &B::Device) -> GestureClassifier<B> {
        GestureClassifier::new(self, device)
    }
}

impl Default for ModelTopology {
    fn default() -> Self {
        Self::new(
            constants::SAMPLE_LENGTH,
            constants::NUM_FEATURES,
            constants::CLASS_NAMES.len(),
        )
    }
}

/// CNN-LSTM gesture classifier
///
/// conv1d(relu) -> max-pool -> dropout -> LSTM -> dense(relu) -> dense(num_classes)
///
/// `forward` returns logits; `predict_proba` applies the softmax.
#[derive(Module, Debug)]
pub struct GestureClassifier<B: Backend> {
    conv: Conv1d<B>,
    pool: MaxPool1d,
    dropout: Dropout,
    lstm: GestureLstm<B>,
    dense: Linear<B>,
    output: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> GestureClassifier<B> {
    pub fn new(topology: &ModelTopology, device: &B::Device) -> Self {
        let conv = Conv1dConfig::new(
            topology.num_features,
            topology.conv_filters,
            topology.kernel_size,
        )
        .init(device);
        let pool = MaxPool1dConfig::new(topology.pool_size)
            .with_stride(topology.pool_size)
            .init();
        let dropout = DropoutConfig::new(topology.dropout).init();
        let lstm = GestureLstm::new(topology.conv_filters, topology.lstm_hidden, device);
        let dense = LinearConfig::new(topology.lstm_hidden, topology.dense_units).init(device);
        let output = LinearConfig::new(topology.dense_units, topology.num_classes).init(device);

        Self {
            conv,
            pool,
            dropout,
            lstm,
            dense,
            output,
            num_classes: topology.num_classes,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Forward pass
    ///
    /// Input shape: [batch_size, sample_length, num_features]
    /// Output shape: [batch_size, num_classes] (logits)
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        // Conv1d expects [batch, channels, length]
        let x = x.swap_dims(1, 2);
        let x = activation::relu(self.conv.forward(x));
        let x = self.pool.forward(x);
        let x = self.dropout.forward(x);

        // Back to [batch, length, channels] for the LSTM
        let x = x.swap_dims(1, 2);
        let x = self.lstm.forward(x);

        let x = activation::relu(self.dense.forward(x));
        self.output.forward(x)
    }

    /// Sparse categorical cross-entropy of the logits against integer labels
    pub fn loss(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, targets)
    }

    /// Class probabilities, shape [batch_size, num_classes]
    pub fn predict_proba(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        activation::softmax(self.forward(x), 1)
    }

    /// Index of the most probable class per sample
    pub fn predict_labels(&self, x: Tensor<B, 3>) -> Vec<usize> {
        let [batch_size, _, _] = x.dims();
        self.forward(x)
            .argmax(1)
            .reshape([batch_size])
            .into_data()
            .iter::<i64>()
            .map(|v| v as usize)
            .collect()
    }
}
