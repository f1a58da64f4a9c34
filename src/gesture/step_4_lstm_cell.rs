// External imports
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Tensor};

/// Single-direction LSTM layer that summarizes a sequence into its final hidden state
#[derive(Module, Debug)]
pub struct GestureLstm<B: Backend> {
    hidden_size: usize,

    // All four gates (input, forget, cell, output) share one projection each
    input_weights: Linear<B>,
    hidden_weights: Linear<B>,
}

impl<B: Backend> GestureLstm<B> {
    /// Create a new LSTM layer
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let gate_size = 4 * hidden_size;

        let input_weights = LinearConfig::new(input_size, gate_size).init(device);
        let hidden_weights = LinearConfig::new(hidden_size, gate_size)
            .with_bias(false)
            .init(device);

        Self {
            hidden_size,
            input_weights,
            hidden_weights,
        }
    }

    /// Run the sequence and return the last hidden state
    ///
    /// Input shape: [batch_size, seq_len, input_size]
    /// Output shape: [batch_size, hidden_size]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let device = x.device();
        let [batch_size, seq_len, _] = x.dims();
        let hidden = self.hidden_size;

        // Project every time step at once; only the recurrent part is sequential
        let input_projection = self.input_weights.forward(x);

        let mut h = Tensor::zeros([batch_size, hidden], &device);
        let mut c = Tensor::zeros([batch_size, hidden], &device);

        for t in 0..seq_len {
            let x_t = input_projection
                .clone()
                .narrow(1, t, 1)
                .reshape([batch_size, 4 * hidden]);
            let gates = x_t + self.hidden_weights.forward(h);

            let i = activation::sigmoid(gates.clone().narrow(1, 0, hidden));
            let f = activation::sigmoid(gates.clone().narrow(1, hidden, hidden));
            let g = activation::tanh(gates.clone().narrow(1, 2 * hidden, hidden));
            let o = activation::sigmoid(gates.narrow(1, 3 * hidden, hidden));

            c = f * c + i * g;
            h = o * activation::tanh(c.clone());
        }

        h
    }
}
