use shared::TumorClass;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tch::{CModule, Device, Kind, Tensor};

use super::preprocess::{CHANNELS, IMAGE_SIZE, preprocess};
use super::{Classifier, InferenceError, argmax_class};

/// ResNet-50 tumor classifier exported as TorchScript.
#[derive(Clone)]
pub struct TorchClassifier {
    model: Arc<Mutex<CModule>>,
    device: Device,
}

impl TorchClassifier {
    pub fn load(model_path: &Path) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        log::info!("Loading model {} on {:?}", model_path.display(), device);
        let mut model = CModule::load_on_device(model_path, device)?;
        model.set_eval();
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            device,
        })
    }

    pub fn scores(&self, image: &[u8]) -> Result<Vec<f32>, InferenceError> {
        let pixels = preprocess(image)?;
        let pixels = pixels.as_standard_layout();
        let data = pixels.as_slice().ok_or_else(|| {
            InferenceError::PreprocessingError("non-contiguous pixel buffer".to_string())
        })?;
        let side = i64::from(IMAGE_SIZE);
        let input = Tensor::from_slice(data)
            .view([1, CHANNELS as i64, side, side])
            .to_device(self.device);

        let output = {
            let model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
            tch::no_grad(|| model.forward_ts(&[input]))?
        };

        let output_flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut output_vec, num_elements);
        Ok(output_vec)
    }
}

impl Classifier for TorchClassifier {
    fn classify(&self, image: &[u8]) -> Result<TumorClass, InferenceError> {
        let scores = self.scores(image)?;
        log::debug!("Model scores: {:?}", scores);
        argmax_class(&scores)
    }
}
